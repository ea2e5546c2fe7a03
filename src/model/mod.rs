pub mod condition;
pub mod params;

pub use condition::Condition;
pub use params::{AnalysisParams, PcaGeneSet};
