use thiserror::Error;

use crate::input::CountMatrix;
use crate::model::AnalysisParams;
use crate::stats::{mean, sample_variance};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("count matrix has no samples")]
    NoSamples,
    #[error("no gene passes the filter (mean log2 > {mean_floor}, sd >= {sd_floor})")]
    NothingKept { mean_floor: f64, sd_floor: f64 },
}

#[derive(Debug, Clone)]
pub struct Stage1Output {
    /// Mean of the clipped log2 counts, one per input gene.
    pub mean_log2: Vec<f64>,
    /// Sample standard deviation of the clipped log2 counts.
    pub sd_log2: Vec<f64>,
    /// Indices of kept genes, in input order.
    pub kept: Vec<usize>,
}

impl Stage1Output {
    pub fn is_kept(&self) -> Vec<bool> {
        let mut flags = vec![false; self.mean_log2.len()];
        for &g in &self.kept {
            flags[g] = true;
        }
        flags
    }
}

pub fn run_stage1(counts: &CountMatrix, params: &AnalysisParams) -> Result<Stage1Output, FilterError> {
    let n_samples = counts.n_samples();
    if n_samples == 0 {
        return Err(FilterError::NoSamples);
    }

    let n_genes = counts.n_genes();
    let mut mean_log2 = Vec::with_capacity(n_genes);
    let mut sd_log2 = Vec::with_capacity(n_genes);
    let mut kept = Vec::new();
    let mut row_buf = vec![0f64; n_samples];

    for (g, row) in counts.counts.outer_iter().enumerate() {
        for (dst, &c) in row_buf.iter_mut().zip(row.iter()) {
            *dst = params.log2_clipped(c);
        }
        let m = mean(&row_buf);
        let sd = sample_variance(&row_buf).sqrt();
        if m > params.mean_floor && sd >= params.sd_floor {
            kept.push(g);
        }
        mean_log2.push(m);
        sd_log2.push(sd);
    }

    if kept.is_empty() {
        return Err(FilterError::NothingKept {
            mean_floor: params.mean_floor,
            sd_floor: params.sd_floor,
        });
    }

    tracing::info!(
        genes_in = n_genes,
        genes_kept = kept.len(),
        mean_floor = params.mean_floor,
        sd_floor = params.sd_floor,
        "stage1: low-expression filter"
    );

    Ok(Stage1Output {
        mean_log2,
        sd_log2,
        kept,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_filter.rs"]
mod tests;
