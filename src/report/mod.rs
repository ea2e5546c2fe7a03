use serde::Serialize;
use thiserror::Error;

use crate::model::{AnalysisParams, PcaGeneSet};

pub mod json;
pub mod plot;
pub mod text;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("table error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("plot error: {0}")]
    Plot(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct InputSummary {
    pub counts: String,
    pub meta: String,
    pub n_samples: usize,
    pub n_healthy: usize,
    pub n_latent_tb: usize,
    pub n_genes_raw: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterSummary {
    pub n_kept: usize,
    pub n_removed: usize,
    pub kept_fraction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationSummary {
    pub n_reference_genes: usize,
    pub size_factor_min: f64,
    pub size_factor_median: f64,
    pub size_factor_max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DegSummary {
    pub n_tested: usize,
    pub n_deg: usize,
    pub n_up: usize,
    pub n_down: usize,
    pub n_degenerate: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PcaSummary {
    pub gene_set: PcaGeneSet,
    pub n_genes: usize,
    pub explained_variance_ratio: Vec<f64>,
    pub top_genes_pc1: Vec<String>,
    pub top_genes_pc2: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub mean_test_accuracy: f64,
    pub mean_train_accuracy: f64,
    pub fold_test_accuracy: Vec<f64>,
    pub plane_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub tool: String,
    pub version: String,
    pub git_hash: Option<String>,
    pub simd_backend: String,
    pub input: InputSummary,
    pub params: AnalysisParams,
    pub filter: FilterSummary,
    pub normalization: NormalizationSummary,
    pub deg: DegSummary,
    pub pca: PcaSummary,
    pub models: Vec<ModelSummary>,
    pub best_model: Option<&'static str>,
    pub outputs: Vec<String>,
}

pub fn format_f64_6(v: f64) -> String {
    format!("{:.6}", v)
}

/// Fixed six decimals, switching to scientific notation for tiny p-values.
pub fn format_p(v: f64) -> String {
    if v != 0.0 && v.abs() < 1e-4 {
        format!("{:.6e}", v)
    } else {
        format_f64_6(v)
    }
}

pub fn bool_fraction(values: &[bool]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| v).count() as f64 / values.len() as f64
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
