use thiserror::Error;

use crate::classify::ClassifyError;
use crate::input::InputError;
use crate::report::ReportError;

pub mod stage1_filter;
pub mod stage2_normalize;
pub mod stage3_deg;
pub mod stage4_pca;
pub mod stage5_classify;
pub mod stage6_report;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("filter: {0}")]
    Filter(#[from] stage1_filter::FilterError),
    #[error("normalization: {0}")]
    Normalize(#[from] stage2_normalize::NormalizeError),
    #[error("differential expression: {0}")]
    Deg(#[from] stage3_deg::DegError),
    #[error("PCA: {0}")]
    Pca(#[from] stage4_pca::PcaError),
    #[error("classification: {0}")]
    Classify(#[from] ClassifyError),
    #[error("report: {0}")]
    Report(#[from] ReportError),
}
