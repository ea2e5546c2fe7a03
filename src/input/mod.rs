use std::path::Path;

use thiserror::Error;

pub mod counts;
pub mod meta;
pub mod reader;

pub use counts::{CountMatrix, parse_counts};
pub use meta::{MetaColumns, SampleSheet, load_sample_sheet};

use crate::model::condition::class_counts;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("table error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct InputBundle {
    pub counts: CountMatrix,
    pub sheet: SampleSheet,
}

pub fn load_input(
    counts_path: &Path,
    meta_path: &Path,
    columns: &MetaColumns,
) -> Result<InputBundle, InputError> {
    tracing::info!(
        counts = %counts_path.display(),
        meta = %meta_path.display(),
        "loading input tables"
    );

    let counts = parse_counts(counts_path)?;
    let sheet = load_sample_sheet(meta_path, columns, &counts.samples)?;

    let [healthy, tb] = class_counts(&sheet.conditions);
    let totals = counts.sample_totals();
    tracing::debug!(
        min_library = totals.iter().copied().fold(f64::INFINITY, f64::min),
        max_library = totals.iter().copied().fold(0.0, f64::max),
        "library sizes"
    );
    tracing::debug!(groups = ?sheet.distinct_groups(), "metadata groups");
    tracing::info!(
        id_column = %counts.gene_id_column,
        genes = counts.n_genes(),
        samples = sheet.len(),
        healthy,
        latent_tb = tb,
        "input loaded"
    );

    Ok(InputBundle { counts, sheet })
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
