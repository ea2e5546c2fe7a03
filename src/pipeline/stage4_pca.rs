use linfa_linalg::LinalgError;
use linfa_linalg::eigh::{EigSort, Eigh};
use ndarray::{Array2, Axis};
use thiserror::Error;

use crate::model::{AnalysisParams, PcaGeneSet};
use crate::stats::cluster::{ClusterTree, average_linkage};

const EIGEN_REL_TOL: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum PcaError {
    #[error("PCA needs at least 2 samples, found {0}")]
    TooFewSamples(usize),
    #[error("PCA input has no genes")]
    NoGenes,
    #[error("PCA input has zero total variance")]
    ZeroVariance,
    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

#[derive(Debug, Clone)]
pub struct TopGene {
    pub component: usize,
    pub rank: usize,
    pub gene: String,
    /// Loading on `component` multiplied by that component's explained variance.
    pub weighted_loading: f64,
    /// Biplot arrow tip: weighted PC1 and PC2 loadings of the gene.
    pub arrow: [f64; 2],
}

/// Average-linkage trees over the DEG log2 matrix.
#[derive(Debug, Clone)]
pub struct DegClusters {
    pub genes: Vec<String>,
    /// Samples x DEGs clipped log2 values.
    pub log2: Array2<f64>,
    pub gene_tree: ClusterTree,
    pub sample_tree: ClusterTree,
}

#[derive(Debug, Clone)]
pub struct Stage4Output {
    pub gene_set: PcaGeneSet,
    pub genes: Vec<String>,
    /// Samples x genes clipped log2 matrix the models are trained on.
    pub features: Array2<f64>,
    /// Samples x components.
    pub scores: Array2<f64>,
    /// Genes x components, unit-norm columns.
    pub loadings: Array2<f64>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    pub top_genes: Vec<TopGene>,
    /// Absent with fewer than two DEGs.
    pub deg_clusters: Option<DegClusters>,
}

impl Stage4Output {
    pub fn n_components(&self) -> usize {
        self.explained_variance.len()
    }

    /// First two component scores, padded with zeros when only one exists.
    pub fn plane(&self) -> Array2<f64> {
        let n = self.scores.nrows();
        let mut out = Array2::<f64>::zeros((n, 2));
        for c in 0..self.n_components().min(2) {
            out.column_mut(c).assign(&self.scores.column(c));
        }
        out
    }

    /// Scores on components `a` and `b`, zero where a component is missing.
    pub fn score_pair(&self, a: usize, b: usize) -> Array2<f64> {
        let n = self.scores.nrows();
        let mut out = Array2::<f64>::zeros((n, 2));
        for (slot, c) in [a, b].into_iter().enumerate() {
            if c < self.n_components() {
                out.column_mut(slot).assign(&self.scores.column(c));
            }
        }
        out
    }

    /// Running sum of the explained variance ratios.
    pub fn cumulative_variance_ratio(&self) -> Vec<f64> {
        self.explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Stage4Inputs<'a> {
    /// Gene ids for every row of `normalized`.
    pub genes: &'a [String],
    pub normalized: &'a Array2<f64>,
    /// Row positions of the DEGs within `normalized`.
    pub deg_positions: &'a [usize],
    pub params: &'a AnalysisParams,
}

/// Samples x genes matrix of clipped log2 values for the chosen rows.
pub fn log2_features(
    normalized: &Array2<f64>,
    positions: &[usize],
    params: &AnalysisParams,
) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((normalized.ncols(), positions.len()));
    for (j, &g) in positions.iter().enumerate() {
        for s in 0..normalized.ncols() {
            out[[s, j]] = params.log2_clipped(normalized[[g, s]]);
        }
    }
    out
}

/// Centers each column and divides by its population standard deviation.
/// Constant columns become all zero.
pub fn standardize(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut col in out.axis_iter_mut(Axis(1)) {
        let n = col.len() as f64;
        let m = col.sum() / n;
        let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
        let sd = var.sqrt();
        let scale = if sd > 0.0 { sd } else { 1.0 };
        col.mapv_inplace(|v| (v - m) / scale);
    }
    out
}

pub fn run_stage4(inputs: &Stage4Inputs<'_>) -> Result<Stage4Output, PcaError> {
    let params = inputs.params;
    let (gene_set, positions): (PcaGeneSet, Vec<usize>) = match params.pca_genes {
        PcaGeneSet::Deg if inputs.deg_positions.len() >= 2 => {
            (PcaGeneSet::Deg, inputs.deg_positions.to_vec())
        }
        PcaGeneSet::Deg => {
            tracing::warn!(
                deg = inputs.deg_positions.len(),
                "fewer than 2 DEGs; using all filtered genes for PCA and classifiers"
            );
            (PcaGeneSet::All, (0..inputs.genes.len()).collect())
        }
        PcaGeneSet::All => (PcaGeneSet::All, (0..inputs.genes.len()).collect()),
    };

    let n_samples = inputs.normalized.ncols();
    if n_samples < 2 {
        return Err(PcaError::TooFewSamples(n_samples));
    }
    if positions.is_empty() {
        return Err(PcaError::NoGenes);
    }

    let genes: Vec<String> = positions.iter().map(|&g| inputs.genes[g].clone()).collect();
    let features = log2_features(inputs.normalized, &positions, params);
    let x = standardize(&features);

    let (loadings, explained_variance, total) = fit_pca(&x)?;
    let scores = x.dot(&loadings);
    let explained_variance_ratio = explained_variance.iter().map(|v| v / total).collect();

    let top_genes = top_contributors(&genes, &loadings, &explained_variance, params.top_genes);
    let deg_clusters = cluster_degs(inputs);

    let out = Stage4Output {
        gene_set,
        genes,
        features,
        scores,
        loadings,
        explained_variance,
        explained_variance_ratio,
        top_genes,
        deg_clusters,
    };

    tracing::info!(
        genes = out.genes.len(),
        components = out.n_components(),
        pc1_ratio = out.explained_variance_ratio.first().copied().unwrap_or(0.0),
        pc2_ratio = out.explained_variance_ratio.get(1).copied().unwrap_or(0.0),
        clustered = out.deg_clusters.is_some(),
        "stage4: PCA"
    );
    Ok(out)
}

/// Clusters DEGs and samples on the DEG log2 matrix, independent of the
/// gene set chosen for PCA.
pub fn cluster_degs(inputs: &Stage4Inputs<'_>) -> Option<DegClusters> {
    if inputs.deg_positions.len() < 2 || inputs.normalized.ncols() < 2 {
        return None;
    }
    let log2 = log2_features(inputs.normalized, inputs.deg_positions, inputs.params);
    let genes = inputs
        .deg_positions
        .iter()
        .map(|&g| inputs.genes[g].clone())
        .collect();
    let sample_tree = average_linkage(log2.view());
    let gene_tree = average_linkage(log2.t());
    Some(DegClusters {
        genes,
        log2,
        gene_tree,
        sample_tree,
    })
}

/// Returns (genes x components loadings, explained variance, total variance).
fn fit_pca(x: &Array2<f64>) -> Result<(Array2<f64>, Vec<f64>, f64), PcaError> {
    let (n, p) = x.dim();
    let denom = (n - 1) as f64;
    let gram = x.dot(&x.t()) / denom;
    let total: f64 = (0..n).map(|i| gram[[i, i]]).sum();
    if total <= 0.0 {
        return Err(PcaError::ZeroVariance);
    }

    let (values, vectors) = gram.eigh()?.sort_eig_desc();
    let max_components = (n - 1).min(p);
    let cutoff = EIGEN_REL_TOL * values[0].max(0.0);

    let mut kept = Vec::new();
    for (k, &lambda) in values.iter().enumerate() {
        if kept.len() >= max_components {
            break;
        }
        if lambda > cutoff && lambda > 0.0 {
            kept.push(k);
        }
    }
    if kept.is_empty() {
        return Err(PcaError::ZeroVariance);
    }

    let mut loadings = Array2::<f64>::zeros((p, kept.len()));
    let mut explained = Vec::with_capacity(kept.len());
    for (c, &k) in kept.iter().enumerate() {
        let lambda = values[k];
        let u = vectors.column(k);
        let mut v = x.t().dot(&u) / (denom * lambda).sqrt();
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        flip_sign(&mut v);
        loadings.column_mut(c).assign(&v);
        explained.push(lambda);
    }
    Ok((loadings, explained, total))
}

/// Makes the largest-magnitude entry positive.
fn flip_sign(v: &mut ndarray::Array1<f64>) {
    let mut best = 0usize;
    for (i, x) in v.iter().enumerate() {
        if x.abs() > v[best].abs() {
            best = i;
        }
    }
    if !v.is_empty() && v[best] < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

fn top_contributors(
    genes: &[String],
    loadings: &Array2<f64>,
    explained: &[f64],
    top_n: usize,
) -> Vec<TopGene> {
    let n_comp = explained.len();
    let arrow = |g: usize| -> [f64; 2] {
        let x = loadings[[g, 0]] * explained[0];
        let y = if n_comp > 1 {
            loadings[[g, 1]] * explained[1]
        } else {
            0.0
        };
        [x, y]
    };

    let mut out = Vec::new();
    for component in 0..n_comp.min(2) {
        let mut order: Vec<usize> = (0..genes.len()).collect();
        let weight = |g: usize| loadings[[g, component]] * explained[component];
        order.sort_by(|&a, &b| weight(b).abs().total_cmp(&weight(a).abs()).then(a.cmp(&b)));
        for (rank, &g) in order.iter().take(top_n).enumerate() {
            out.push(TopGene {
                component,
                rank: rank + 1,
                gene: genes[g].clone(),
                weighted_loading: weight(g),
                arrow: arrow(g),
            });
        }
    }
    for t in &out {
        tracing::debug!(
            pc = t.component + 1,
            rank = t.rank,
            gene = %t.gene,
            weighted_loading = t.weighted_loading,
            "top contributing gene"
        );
    }
    out
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_pca.rs"]
mod tests;
