use linfa::Dataset;
use linfa::traits::{Fit, Predict};
use linfa_bayes::GaussianNb as LinfaGaussianNb;
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::classify::{
    Classifier, ClassifyError, ModelKind, check_dimension, check_training_set, label_targets,
    majority_class,
};

/// Gaussian Naive Bayes from `linfa-bayes`, with variance smoothing relative
/// to the largest feature variance.
///
/// When every feature is constant the smoothing term is zero and the class
/// likelihoods are undefined, so the majority class is predicted instead.
/// Exactly tied likelihoods resolve in `linfa`'s class order.
pub struct GaussianNb {
    var_smoothing: f64,
    n_features: usize,
    model: Option<LinfaGaussianNb<f64, usize>>,
    constant: Option<usize>,
}

impl GaussianNb {
    pub fn new(var_smoothing: f64) -> Self {
        Self {
            var_smoothing,
            n_features: 0,
            model: None,
            constant: None,
        }
    }

    fn predict_view(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, ClassifyError> {
        if let Some(c) = self.constant {
            return Ok(vec![c; x.nrows()]);
        }
        let model = self.model.as_ref().ok_or(ClassifyError::NotFitted)?;
        check_dimension(self.n_features, x.ncols())?;
        let classes: Array1<usize> = model.predict(&x);
        Ok(classes.to_vec())
    }
}

impl Classifier for GaussianNb {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), ClassifyError> {
        check_training_set(x, y)?;
        self.n_features = x.ncols();
        self.model = None;

        let max_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .fold(0f64, |acc, &v| acc.max(v));
        if !(max_var > 0.0) {
            self.constant = Some(majority_class(y));
            return Ok(());
        }
        self.constant = None;

        let dataset = Dataset::new(x.to_owned(), label_targets(y));
        let model = LinfaGaussianNb::<f64, usize>::params()
            .var_smoothing(self.var_smoothing)
            .fit(&dataset)?;
        self.model = Some(model);
        Ok(())
    }

    fn predict_one(&self, row: &[f64]) -> Result<usize, ClassifyError> {
        let x = ArrayView2::from_shape((1, row.len()), row)
            .map_err(|_| ClassifyError::WrongDimension {
                expected: self.n_features,
                found: row.len(),
            })?;
        let classes = self.predict_view(x)?;
        Ok(classes[0])
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ClassifyError> {
        self.predict_view(x.view())
    }

    fn kind(&self) -> ModelKind {
        ModelKind::NaiveBayes
    }
}
