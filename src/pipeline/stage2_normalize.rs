use ndarray::{Array2, Axis};
use thiserror::Error;

use crate::input::CountMatrix;
use crate::stats::median;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("sample {sample} has zero total counts over the kept genes; size factor undefined")]
    ZeroTotal { sample: String },
    #[error("no gene is expressed in every sample; median-of-ratios reference is empty")]
    NoReferenceGenes,
    #[error("size factor for sample {sample} is not strictly positive ({value})")]
    InvalidSizeFactor { sample: String, value: f64 },
}

#[derive(Debug, Clone)]
pub struct Stage2Output {
    /// Input gene index for every row of `normalized`.
    pub genes: Vec<usize>,
    pub size_factors: Vec<f64>,
    /// Kept genes x samples, raw counts divided by the sample size factor.
    pub normalized: Array2<f64>,
    pub n_reference_genes: usize,
}

/// Median-of-ratios normalization over the kept genes.
pub fn run_stage2(counts: &CountMatrix, kept: &[usize]) -> Result<Stage2Output, NormalizeError> {
    let n_samples = counts.n_samples();
    let raw = counts.counts.select(Axis(0), kept);

    for s in 0..n_samples {
        if raw.column(s).sum() <= 0.0 {
            return Err(NormalizeError::ZeroTotal {
                sample: counts.samples[s].clone(),
            });
        }
    }

    let size_factors = size_factors(&raw)?;
    for (s, &sf) in size_factors.iter().enumerate() {
        if !(sf.is_finite() && sf > 0.0) {
            return Err(NormalizeError::InvalidSizeFactor {
                sample: counts.samples[s].clone(),
                value: sf,
            });
        }
    }

    let n_reference_genes = reference_log_means(&raw)
        .iter()
        .filter(|m| m.is_some())
        .count();

    let mut normalized = raw;
    for (s, mut col) in normalized.columns_mut().into_iter().enumerate() {
        let sf = size_factors[s];
        col.mapv_inplace(|c| c / sf);
    }

    tracing::info!(
        genes = kept.len(),
        reference_genes = n_reference_genes,
        min_size_factor = size_factors.iter().copied().fold(f64::INFINITY, f64::min),
        max_size_factor = size_factors.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "stage2: median-of-ratios normalization"
    );

    Ok(Stage2Output {
        genes: kept.to_vec(),
        size_factors,
        normalized,
        n_reference_genes,
    })
}

/// Per-gene log geometric mean; `None` for genes with a zero count in any sample.
fn reference_log_means(raw: &Array2<f64>) -> Vec<Option<f64>> {
    raw.outer_iter()
        .map(|row| {
            if row.iter().any(|&c| c <= 0.0) {
                None
            } else {
                Some(row.iter().map(|c| c.ln()).sum::<f64>() / row.len() as f64)
            }
        })
        .collect()
}

pub fn size_factors(raw: &Array2<f64>) -> Result<Vec<f64>, NormalizeError> {
    let log_means = reference_log_means(raw);
    let reference: Vec<(usize, f64)> = log_means
        .iter()
        .enumerate()
        .filter_map(|(g, m)| m.map(|m| (g, m)))
        .collect();
    if reference.is_empty() {
        return Err(NormalizeError::NoReferenceGenes);
    }

    let mut out = Vec::with_capacity(raw.ncols());
    let mut ratios = Vec::with_capacity(reference.len());
    for s in 0..raw.ncols() {
        ratios.clear();
        for &(g, log_mean) in &reference {
            ratios.push(raw[[g, s]].ln() - log_mean);
        }
        let med = median(&ratios).ok_or(NormalizeError::NoReferenceGenes)?;
        out.push(med.exp());
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_normalize.rs"]
mod tests;
