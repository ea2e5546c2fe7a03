use ndarray::{Array2, Axis};

use crate::classify::folds::stratified_folds;
use crate::classify::surface::{DecisionSurface, GridSpec, decision_surface};
use crate::classify::{ClassifyError, ModelKind, accuracy, build_classifier};
use crate::model::{AnalysisParams, Condition};

#[derive(Debug, Clone, PartialEq)]
pub struct FoldScore {
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct ModelReport {
    pub kind: ModelKind,
    pub folds: Vec<FoldScore>,
    pub mean_train_accuracy: f64,
    pub mean_test_accuracy: f64,
    /// Accuracy of the PC1/PC2 model on the samples it was fitted on.
    pub plane_accuracy: Option<f64>,
    pub surface: Option<DecisionSurface>,
}

#[derive(Debug, Clone)]
pub struct Stage5Output {
    pub models: Vec<ModelReport>,
    pub n_folds: usize,
    pub n_features: usize,
}

impl Stage5Output {
    pub fn best(&self) -> Option<&ModelReport> {
        let mut best: Option<&ModelReport> = None;
        for m in &self.models {
            if best.is_none_or(|b| m.mean_test_accuracy > b.mean_test_accuracy) {
                best = Some(m);
            }
        }
        best
    }
}

#[derive(Debug, Clone)]
pub struct Stage5Inputs<'a> {
    /// Samples x genes, unscaled log2 features.
    pub features: &'a Array2<f64>,
    /// Samples x 2 component scores for the decision surfaces.
    pub plane: &'a Array2<f64>,
    pub conditions: &'a [Condition],
    pub params: &'a AnalysisParams,
    pub with_surfaces: bool,
}

pub fn run_stage5(inputs: &Stage5Inputs<'_>) -> Result<Stage5Output, ClassifyError> {
    let n = inputs.features.nrows();
    if inputs.conditions.len() != n {
        return Err(ClassifyError::LabelMismatch {
            rows: n,
            labels: inputs.conditions.len(),
        });
    }
    let params = inputs.params;
    let labels: Vec<usize> = inputs.conditions.iter().map(|c| c.class_index()).collect();
    let folds = stratified_folds(&labels, params.n_folds, params.shuffle_seed)?;
    tracing::debug!(
        sizes = ?folds.iter().map(|f| f.test.len()).collect::<Vec<_>>(),
        "stratified folds"
    );

    let mut models = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
        let mut scores = Vec::with_capacity(folds.len());
        for fold in &folds {
            let x_train = inputs.features.select(Axis(0), &fold.train);
            let x_test = inputs.features.select(Axis(0), &fold.test);
            let y_train: Vec<usize> = fold.train.iter().map(|&i| labels[i]).collect();
            let y_test: Vec<usize> = fold.test.iter().map(|&i| labels[i]).collect();

            let mut model = build_classifier(kind, params);
            model.fit(&x_train, &y_train)?;
            let train_accuracy = accuracy(&model.predict(&x_train)?, &y_train);
            let test_accuracy = accuracy(&model.predict(&x_test)?, &y_test);
            tracing::debug!(
                model = kind.id(),
                fold = fold.index,
                train_accuracy,
                test_accuracy,
                "fold scored"
            );
            scores.push(FoldScore {
                fold: fold.index,
                n_train: fold.train.len(),
                n_test: fold.test.len(),
                train_accuracy,
                test_accuracy,
            });
        }
        let k = scores.len() as f64;
        let mean_train_accuracy = scores.iter().map(|s| s.train_accuracy).sum::<f64>() / k;
        let mean_test_accuracy = scores.iter().map(|s| s.test_accuracy).sum::<f64>() / k;

        let (plane_accuracy, surface) = if inputs.with_surfaces {
            let (acc, surface) = fit_surface(kind, inputs.plane, &labels, params)?;
            (Some(acc), Some(surface))
        } else {
            (None, None)
        };

        tracing::info!(
            model = kind.display_name(),
            mean_test_accuracy,
            mean_train_accuracy,
            "stage5: cross-validated"
        );
        models.push(ModelReport {
            kind,
            folds: scores,
            mean_train_accuracy,
            mean_test_accuracy,
            plane_accuracy,
            surface,
        });
    }

    Ok(Stage5Output {
        models,
        n_folds: folds.len(),
        n_features: inputs.features.ncols(),
    })
}

fn fit_surface(
    kind: ModelKind,
    plane: &Array2<f64>,
    labels: &[usize],
    params: &AnalysisParams,
) -> Result<(f64, DecisionSurface), ClassifyError> {
    let mut model = build_classifier(kind, params);
    model.fit(plane, labels)?;
    let fitted = accuracy(&model.predict(plane)?, labels);
    let grid = GridSpec::covering(plane, params.grid_margin, params.grid_step, params.grid_max_cells);
    if grid.step > params.grid_step {
        tracing::debug!(
            requested = params.grid_step,
            used = grid.step,
            "grid step enlarged to cap the surface size"
        );
    }
    let surface = decision_surface(model.as_ref(), grid)?;
    tracing::debug!(
        model = kind.id(),
        fitted_accuracy = fitted,
        cells = surface.classes.len(),
        healthy_share = surface.share(0),
        "decision surface"
    );
    Ok((fitted, surface))
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_classify.rs"]
mod tests;
