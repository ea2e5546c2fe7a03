use ndarray::Array2;
use thiserror::Error;

use crate::model::condition::class_counts;
use crate::model::{AnalysisParams, Condition};
use crate::stats::{StatsError, benjamini_hochberg, mean, welch_t_test};

#[derive(Debug, Error)]
pub enum DegError {
    #[error("need at least 2 samples per condition (healthy={healthy}, latent_tb={latent_tb})")]
    TooFewSamples { healthy: usize, latent_tb: usize },
    #[error("{n_labels} condition labels for {n_samples} samples")]
    LabelMismatch { n_labels: usize, n_samples: usize },
    #[error("gene {gene}: {source}")]
    Test {
        gene: String,
        #[source]
        source: StatsError,
    },
}

#[derive(Debug, Clone)]
pub struct DegRow {
    pub gene: String,
    pub base_mean: f64,
    pub mean_healthy: f64,
    pub mean_tb: f64,
    pub log2_fold_change: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub p_adj: f64,
    pub is_deg: bool,
}

#[derive(Debug, Clone)]
pub struct Stage3Output {
    /// One row per tested gene, in the row order of the normalized matrix.
    pub rows: Vec<DegRow>,
    pub n_degenerate: usize,
}

impl Stage3Output {
    /// Row positions of the genes flagged as differentially expressed.
    pub fn deg_positions(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_deg)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn deg_genes(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.is_deg)
            .map(|r| r.gene.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Stage3Inputs<'a> {
    pub genes: &'a [String],
    pub normalized: &'a Array2<f64>,
    pub conditions: &'a [Condition],
    pub params: &'a AnalysisParams,
}

pub fn is_deg(p_adj: f64, log2_fold_change: f64, params: &AnalysisParams) -> bool {
    p_adj < params.padj_cutoff && log2_fold_change.abs() > params.lfc_cutoff
}

pub fn run_stage3(inputs: &Stage3Inputs<'_>) -> Result<Stage3Output, DegError> {
    let n_samples = inputs.normalized.ncols();
    if inputs.conditions.len() != n_samples {
        return Err(DegError::LabelMismatch {
            n_labels: inputs.conditions.len(),
            n_samples,
        });
    }
    let [healthy, latent_tb] = class_counts(inputs.conditions);
    if healthy < 2 || latent_tb < 2 {
        return Err(DegError::TooFewSamples { healthy, latent_tb });
    }

    let params = inputs.params;
    let mut rows = Vec::with_capacity(inputs.genes.len());
    let mut p_values = Vec::with_capacity(inputs.genes.len());
    let mut n_degenerate = 0usize;

    let mut norm_h = Vec::with_capacity(healthy);
    let mut norm_t = Vec::with_capacity(latent_tb);
    let mut log_h = Vec::with_capacity(healthy);
    let mut log_t = Vec::with_capacity(latent_tb);

    for (g, row) in inputs.normalized.outer_iter().enumerate() {
        norm_h.clear();
        norm_t.clear();
        log_h.clear();
        log_t.clear();
        for (s, &v) in row.iter().enumerate() {
            let lv = (v + params.epsilon).log2();
            match inputs.conditions[s] {
                Condition::Healthy => {
                    norm_h.push(v);
                    log_h.push(lv);
                }
                Condition::LatentTb => {
                    norm_t.push(v);
                    log_t.push(lv);
                }
            }
        }

        let gene = &inputs.genes[g];
        let test = welch_t_test(&log_h, &log_t).map_err(|source| DegError::Test {
            gene: gene.clone(),
            source,
        })?;
        tracing::trace!(gene = %gene, t = test.t, df = test.df, p = test.p_value, "welch test");
        if test.degenerate {
            n_degenerate += 1;
            tracing::debug!(gene = %gene, "zero variance in both groups; p set to 1");
        }

        let mean_healthy = mean(&norm_h);
        let mean_tb = mean(&norm_t);
        let log2_fold_change =
            ((mean_tb + params.epsilon) / (mean_healthy + params.epsilon)).log2();

        p_values.push(test.p_value);
        rows.push(DegRow {
            gene: gene.clone(),
            base_mean: row.mean().unwrap_or(0.0),
            mean_healthy,
            mean_tb,
            log2_fold_change,
            t_statistic: test.t,
            p_value: test.p_value,
            p_adj: 1.0,
            is_deg: false,
        });
    }

    let adjusted = benjamini_hochberg(&p_values);
    for (row, q) in rows.iter_mut().zip(adjusted) {
        row.p_adj = q;
        row.is_deg = is_deg(q, row.log2_fold_change, params);
    }

    if n_degenerate > 0 {
        tracing::warn!(n_degenerate, "genes with zero variance in both conditions");
    }
    let n_deg = rows.iter().filter(|r| r.is_deg).count();
    tracing::info!(
        tested = rows.len(),
        deg = n_deg,
        padj_cutoff = params.padj_cutoff,
        lfc_cutoff = params.lfc_cutoff,
        "stage3: differential expression"
    );
    log_extremes(&rows);

    Ok(Stage3Output { rows, n_degenerate })
}

fn log_extremes(rows: &[DegRow]) {
    let mut degs: Vec<&DegRow> = rows.iter().filter(|r| r.is_deg).collect();
    if degs.is_empty() {
        return;
    }
    degs.sort_by(|a, b| b.log2_fold_change.total_cmp(&a.log2_fold_change));
    let up = degs.first().map(|r| (r.gene.as_str(), r.log2_fold_change));
    let down = degs.last().map(|r| (r.gene.as_str(), r.log2_fold_change));
    if let (Some((up_gene, up_lfc)), Some((down_gene, down_lfc))) = (up, down) {
        tracing::info!(
            up_gene,
            up_lfc,
            down_gene,
            down_lfc,
            "largest fold changes among DEGs"
        );
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_deg.rs"]
mod tests;
