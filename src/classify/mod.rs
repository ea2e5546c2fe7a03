//! Binary classifiers compared on the expression features.
//!
//! Labels are class indices in the canonical condition order
//! (`0 = Healthy`, `1 = LatentTb`). The estimators come from the `linfa`
//! family and sit behind [`Classifier`]; fitting the same rows in the same
//! order yields the same predictions.

pub mod folds;
pub mod knn;
pub mod naive_bayes;
pub mod surface;
pub mod svm;

use ndarray::{Array1, Array2};
use serde::Serialize;
use thiserror::Error;

use crate::model::AnalysisParams;

pub const N_CLASSES: usize = 2;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("{rows} feature rows but {labels} labels")]
    LabelMismatch { rows: usize, labels: usize },
    #[error("label {0} is outside the binary class range")]
    BadLabel(usize),
    #[error("k-NN needs at least k={k} training samples, found {n}")]
    TooFewNeighbors { k: usize, n: usize },
    #[error("invalid fold setup: {0}")]
    Folds(String),
    #[error("model used before fit")]
    NotFitted,
    #[error("model was fitted on {expected} features, got {found}")]
    WrongDimension { expected: usize, found: usize },
    #[error("SVM: {0}")]
    Svm(#[from] linfa_svm::SvmError),
    #[error("naive Bayes: {0}")]
    NaiveBayes(#[from] linfa_bayes::NaiveBayesError),
    #[error("neighbour index: {0}")]
    NeighbourIndex(#[from] linfa_nn::BuildError),
    #[error("neighbour query: {0}")]
    NeighbourQuery(#[from] linfa_nn::NnError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelKind {
    NaiveBayes,
    SvmRbf,
    Knn,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::NaiveBayes, ModelKind::SvmRbf, ModelKind::Knn];

    pub fn id(self) -> &'static str {
        match self {
            ModelKind::NaiveBayes => "naive_bayes",
            ModelKind::SvmRbf => "svm_rbf",
            ModelKind::Knn => "knn",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::NaiveBayes => "Naive Bayes",
            ModelKind::SvmRbf => "SVM (Radial)",
            ModelKind::Knn => "K-NN",
        }
    }

    /// File stem for the decision surface image.
    pub fn plot_stem(self) -> &'static str {
        match self {
            ModelKind::NaiveBayes => "nb_pca",
            ModelKind::SvmRbf => "svm_pca",
            ModelKind::Knn => "knn_pca",
        }
    }

    /// File stem for the per-fold accuracy chart.
    pub fn cv_plot_stem(self) -> &'static str {
        match self {
            ModelKind::NaiveBayes => "nb_cv",
            ModelKind::SvmRbf => "svm_cv",
            ModelKind::Knn => "knn_cv",
        }
    }
}

pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), ClassifyError>;

    fn predict_one(&self, row: &[f64]) -> Result<usize, ClassifyError>;

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ClassifyError> {
        let mut out = Vec::with_capacity(x.nrows());
        let mut buf = vec![0f64; x.ncols()];
        for row in x.outer_iter() {
            for (dst, &v) in buf.iter_mut().zip(row.iter()) {
                *dst = v;
            }
            out.push(self.predict_one(&buf)?);
        }
        Ok(out)
    }

    fn kind(&self) -> ModelKind;
}

pub fn build_classifier(kind: ModelKind, params: &AnalysisParams) -> Box<dyn Classifier> {
    match kind {
        ModelKind::NaiveBayes => Box::new(naive_bayes::GaussianNb::new(params.nb_var_smoothing)),
        ModelKind::SvmRbf => Box::new(svm::RbfSvm::new(params.svm_c, params.svm_tol)),
        ModelKind::Knn => Box::new(knn::Knn::new(params.knn_k)),
    }
}

pub fn check_training_set(x: &Array2<f64>, y: &[usize]) -> Result<(), ClassifyError> {
    if x.nrows() == 0 {
        return Err(ClassifyError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ClassifyError::LabelMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= N_CLASSES) {
        return Err(ClassifyError::BadLabel(bad));
    }
    Ok(())
}

pub fn check_dimension(expected: usize, found: usize) -> Result<(), ClassifyError> {
    if expected != found {
        return Err(ClassifyError::WrongDimension { expected, found });
    }
    Ok(())
}

/// Labels as a `linfa` target column.
pub fn label_targets(y: &[usize]) -> Array1<usize> {
    Array1::from(y.to_vec())
}

/// Majority class of `y`; the lower index wins a tied count.
pub fn majority_class(y: &[usize]) -> usize {
    let mut counts = [0f64; N_CLASSES];
    for &c in y {
        counts[c] += 1.0;
    }
    argmax_low_tie(&counts)
}

pub fn accuracy(predicted: &[usize], truth: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    correct as f64 / truth.len() as f64
}

/// Index of the largest score; the lower index wins ties.
pub fn argmax_low_tie(scores: &[f64]) -> usize {
    let mut best = 0usize;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
#[path = "../../tests/src_inline/classify/mod.rs"]
mod tests;
