//! Soft-margin SVM with an RBF kernel, fitted by `linfa-svm`.
//!
//! Class 1 is the positive target. The kernel width follows the
//! `1 / (n_features * Var(X))` scaling; `linfa` parameterises the Gaussian
//! kernel as `exp(-|a - b|^2 / eps)`, so `eps = 1 / gamma`.

use linfa::Dataset;
use linfa::traits::{Fit, Predict};
use linfa_svm::Svm;
use ndarray::{Array1, Array2, ArrayView1};

use crate::classify::{
    Classifier, ClassifyError, ModelKind, check_dimension, check_training_set,
};
use crate::stats::population_variance;

pub struct RbfSvm {
    c: f64,
    tol: f64,
    gamma: f64,
    n_features: usize,
    model: Option<Svm<f64, bool>>,
    constant: Option<usize>,
}

impl RbfSvm {
    pub fn new(c: f64, tol: f64) -> Self {
        Self {
            c,
            tol,
            gamma: 1.0,
            n_features: 0,
            model: None,
            constant: None,
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn n_support(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.nsupport())
    }

    /// Signed distance to the separating surface; positive means class 1.
    /// Zero when the training labels were all one class.
    pub fn decision_value(&self, row: &[f64]) -> f64 {
        match &self.model {
            Some(m) => {
                let row = ArrayView1::from(row);
                m.weighted_sum(&row) - m.rho
            }
            None => 0.0,
        }
    }
}

/// `1 / (n_features * Var(X))` over every entry of `x`, or 1 when the
/// matrix is constant.
pub fn scale_gamma(x: &Array2<f64>) -> f64 {
    let values: Vec<f64> = x.iter().copied().collect();
    let var = population_variance(&values);
    if var > 0.0 {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl Classifier for RbfSvm {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), ClassifyError> {
        check_training_set(x, y)?;
        self.n_features = x.ncols();
        self.model = None;

        let first = y[0];
        if y.iter().all(|&c| c == first) {
            self.constant = Some(first);
            return Ok(());
        }
        self.constant = None;
        self.gamma = scale_gamma(x);

        let targets: Array1<bool> = y.iter().map(|&c| c == 1).collect();
        let dataset = Dataset::new(x.to_owned(), targets);
        let model = Svm::<f64, bool>::params()
            .pos_neg_weights(self.c, self.c)
            .eps(self.tol)
            .gaussian_kernel(1.0 / self.gamma)
            .fit(&dataset)?;
        tracing::trace!(
            gamma = self.gamma,
            support_vectors = model.nsupport(),
            rho = model.rho,
            "SVM fitted"
        );
        self.model = Some(model);
        Ok(())
    }

    fn predict_one(&self, row: &[f64]) -> Result<usize, ClassifyError> {
        if let Some(c) = self.constant {
            return Ok(c);
        }
        let model = self.model.as_ref().ok_or(ClassifyError::NotFitted)?;
        check_dimension(self.n_features, row.len())?;
        let positive: bool = model.predict(ArrayView1::from(row));
        Ok(usize::from(positive))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ClassifyError> {
        if let Some(c) = self.constant {
            return Ok(vec![c; x.nrows()]);
        }
        let model = self.model.as_ref().ok_or(ClassifyError::NotFitted)?;
        check_dimension(self.n_features, x.ncols())?;
        let positive: Array1<bool> = model.predict(x);
        Ok(positive.iter().map(|&p| usize::from(p)).collect())
    }

    fn kind(&self) -> ModelKind {
        ModelKind::SvmRbf
    }
}
