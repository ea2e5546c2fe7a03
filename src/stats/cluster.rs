//! Average-linkage hierarchical clustering on Euclidean distances.

use kodama::{Method, linkage};
use ndarray::ArrayView2;

use crate::simd;

/// One agglomeration step. Labels below the observation count are leaves;
/// step `i` creates label `n + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTree {
    pub merges: Vec<Merge>,
    /// Observation indices in dendrogram leaf order.
    pub leaf_order: Vec<usize>,
}

impl ClusterTree {
    pub fn n_leaves(&self) -> usize {
        self.leaf_order.len()
    }
}

/// Clusters the rows of `x`.
pub fn average_linkage(x: ArrayView2<'_, f64>) -> ClusterTree {
    let n = x.nrows();
    if n < 2 {
        return ClusterTree {
            merges: Vec::new(),
            leaf_order: (0..n).collect(),
        };
    }
    let rows: Vec<Vec<f64>> = x.outer_iter().map(|r| r.to_vec()).collect();
    let mut condensed = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            condensed.push(simd::squared_distance_f64(&rows[i], &rows[j]).sqrt());
        }
    }

    let dendrogram = linkage(&mut condensed, n, Method::Average);
    let merges: Vec<Merge> = dendrogram
        .steps()
        .iter()
        .map(|s| Merge {
            left: s.cluster1,
            right: s.cluster2,
            height: s.dissimilarity,
            size: s.size,
        })
        .collect();

    let mut leaf_order = Vec::with_capacity(n);
    let mut stack = vec![n + merges.len() - 1];
    while let Some(node) = stack.pop() {
        if node < n {
            leaf_order.push(node);
        } else {
            let m = &merges[node - n];
            stack.push(m.right);
            stack.push(m.left);
        }
    }
    tracing::trace!(
        leaves = n,
        root_height = merges.last().map_or(0.0, |m| m.height),
        "average linkage"
    );
    ClusterTree { merges, leaf_order }
}

#[cfg(test)]
#[path = "../../tests/src_inline/stats/cluster.rs"]
mod tests;
