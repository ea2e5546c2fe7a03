use serde::Serialize;

/// Gene set handed to PCA and the classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PcaGeneSet {
    Deg,
    All,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisParams {
    pub epsilon: f64,
    pub mean_floor: f64,
    pub sd_floor: f64,
    pub lfc_cutoff: f64,
    pub padj_cutoff: f64,
    pub pca_genes: PcaGeneSet,
    pub top_genes: usize,
    pub n_folds: usize,
    pub shuffle_seed: Option<u64>,
    pub knn_k: usize,
    pub svm_c: f64,
    pub svm_tol: f64,
    pub nb_var_smoothing: f64,
    pub grid_step: f64,
    pub grid_max_cells: usize,
    pub grid_margin: f64,
}

impl AnalysisParams {
    pub fn default_v1() -> Self {
        Self {
            epsilon: 0.5,
            mean_floor: 0.5,
            sd_floor: 0.0,
            lfc_cutoff: 1.0,
            padj_cutoff: 0.05,
            pca_genes: PcaGeneSet::Deg,
            top_genes: 5,
            n_folds: 5,
            shuffle_seed: None,
            knn_k: 2,
            svm_c: 1.0,
            svm_tol: 1e-3,
            nb_var_smoothing: 1e-9,
            grid_step: 0.02,
            grid_max_cells: 2000,
            grid_margin: 1.0,
        }
    }

    pub fn log2_floor(&self) -> f64 {
        self.epsilon.log2()
    }

    /// Clipped log2 transform shared by the filter, PCA and classifier inputs.
    pub fn log2_clipped(&self, value: f64) -> f64 {
        (value + self.epsilon).log2().max(self.log2_floor())
    }

    /// Rejects parameter combinations the stages cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.epsilon > 0.0) {
            return Err(format!("epsilon must be positive, got {}", self.epsilon));
        }
        if !self.mean_floor.is_finite() {
            return Err("mean floor must be finite".to_string());
        }
        if !(self.sd_floor >= 0.0) {
            return Err(format!("sd floor must be >= 0, got {}", self.sd_floor));
        }
        if !(self.lfc_cutoff >= 0.0) {
            return Err(format!("log2 fold change cutoff must be >= 0, got {}", self.lfc_cutoff));
        }
        if !(self.padj_cutoff > 0.0 && self.padj_cutoff <= 1.0) {
            return Err(format!("adjusted p cutoff must be in (0, 1], got {}", self.padj_cutoff));
        }
        if self.n_folds < 2 {
            return Err(format!("need at least 2 folds, got {}", self.n_folds));
        }
        if self.knn_k == 0 {
            return Err("k for k-NN must be at least 1".to_string());
        }
        if self.top_genes == 0 {
            return Err("top gene count must be at least 1".to_string());
        }
        if !(self.svm_c > 0.0 && self.svm_tol > 0.0) {
            return Err("SVM C and tolerance must be positive".to_string());
        }
        if !(self.grid_step > 0.0) || self.grid_max_cells == 0 {
            return Err(format!("grid step must be positive, got {}", self.grid_step));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/params.rs"]
mod tests;
