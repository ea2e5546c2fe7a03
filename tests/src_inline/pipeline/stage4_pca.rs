use super::*;
use ndarray::array;

fn genes(n: usize) -> Vec<String> {
    (0..n).map(|g| format!("G{}", g + 1)).collect()
}

/// Genes x samples matrix with a dominant two-group signal and some noise.
fn sample_matrix() -> Array2<f64> {
    array![
        [10.0, 12.0, 11.0, 9.0, 80.0, 85.0, 90.0, 70.0],
        [100.0, 95.0, 105.0, 98.0, 10.0, 12.0, 9.0, 14.0],
        [50.0, 20.0, 48.0, 30.0, 51.0, 25.0, 50.0, 33.0],
        [5.0, 7.0, 3.0, 9.0, 6.0, 4.0, 8.0, 2.0],
        [30.0, 31.0, 29.0, 30.0, 60.0, 62.0, 58.0, 61.0],
    ]
}

fn run(normalized: &Array2<f64>, deg: &[usize], params: &AnalysisParams) -> Stage4Output {
    let genes = genes(normalized.nrows());
    run_stage4(&Stage4Inputs {
        genes: &genes,
        normalized,
        deg_positions: deg,
        params,
    })
    .unwrap()
}

#[test]
fn test_components_orthogonal_and_ordered() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let out = run(&normalized, &[0, 1, 2, 3, 4], &params);

    assert!(out.n_components() >= 2);
    assert!(out.n_components() <= 5);
    for w in out.explained_variance.windows(2) {
        assert!(w[0] >= w[1]);
    }
    let gram = out.loadings.t().dot(&out.loadings);
    for i in 0..out.n_components() {
        for j in 0..out.n_components() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((gram[[i, j]] - expected).abs() < 1e-8, "({i},{j}) = {}", gram[[i, j]]);
        }
    }
    let ratio_sum: f64 = out.explained_variance_ratio.iter().sum();
    assert!(ratio_sum <= 1.0 + 1e-9);
    assert!((ratio_sum - 1.0).abs() < 1e-8);
}

#[test]
fn test_scores_have_component_variance() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let out = run(&normalized, &[0, 1, 2, 3, 4], &params);
    let n = out.scores.nrows() as f64;
    for c in 0..out.n_components() {
        let col = out.scores.column(c);
        let mean = col.sum() / n;
        assert!(mean.abs() < 1e-9);
        let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
        assert!((var - out.explained_variance[c]).abs() < 1e-8);
    }
}

#[test]
fn test_pc1_separates_groups() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let out = run(&normalized, &[0, 1, 4], &params);
    let pc1 = out.scores.column(0);
    let first = pc1[0].signum();
    for s in 0..4 {
        assert_eq!(pc1[s].signum(), first);
        assert_eq!(pc1[s + 4].signum(), -first);
    }
    assert_eq!(out.gene_set, PcaGeneSet::Deg);
    assert_eq!(out.genes, vec!["G1", "G2", "G5"]);
    assert_eq!(out.features.dim(), (8, 3));
}

#[test]
fn test_deterministic_sign_and_values() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let a = run(&normalized, &[0, 1, 2, 3, 4], &params);
    let b = run(&normalized, &[0, 1, 2, 3, 4], &params);
    assert_eq!(a.scores, b.scores);
    for c in 0..a.n_components() {
        let col = a.loadings.column(c);
        let max = col.iter().copied().fold(0.0f64, |m, v| if v.abs() > m.abs() { v } else { m });
        assert!(max > 0.0);
    }
}

#[test]
fn test_top_genes_per_component() {
    let normalized = sample_matrix();
    let mut params = AnalysisParams::default_v1();
    params.top_genes = 2;
    let out = run(&normalized, &[0, 1, 2, 3, 4], &params);
    assert_eq!(out.top_genes.len(), 4);
    let pc1: Vec<&TopGene> = out.top_genes.iter().filter(|t| t.component == 0).collect();
    assert_eq!(pc1.len(), 2);
    assert!(pc1[0].weighted_loading.abs() >= pc1[1].weighted_loading.abs());
    assert_eq!(pc1[0].rank, 1);
    assert_eq!(pc1[0].arrow[0], pc1[0].weighted_loading);
}

#[test]
fn test_too_few_degs_falls_back_to_all_genes() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let out = run(&normalized, &[0], &params);
    assert_eq!(out.gene_set, PcaGeneSet::All);
    assert_eq!(out.genes.len(), 5);
}

#[test]
fn test_standardize_population_sd() {
    let x = array![[1.0, 5.0], [3.0, 5.0]];
    let z = standardize(&x);
    assert_eq!(z[[0, 0]], -1.0);
    assert_eq!(z[[1, 0]], 1.0);
    assert_eq!(z[[0, 1]], 0.0);
}

#[test]
fn test_single_sample_is_error() {
    let normalized = array![[1.0], [2.0]];
    let params = AnalysisParams::default_v1();
    let genes = genes(2);
    let err = run_stage4(&Stage4Inputs {
        genes: &genes,
        normalized: &normalized,
        deg_positions: &[0, 1],
        params: &params,
    })
    .unwrap_err();
    assert!(matches!(err, PcaError::TooFewSamples(1)));
}

#[test]
fn test_deg_clusters_split_conditions() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let out = run(&normalized, &[0, 1, 4], &params);
    let clusters = out.deg_clusters.as_ref().unwrap();

    assert_eq!(clusters.genes, vec!["G1", "G2", "G5"]);
    assert_eq!(clusters.log2.dim(), (8, 3));
    assert_eq!(clusters.gene_tree.n_leaves(), 3);
    assert_eq!(clusters.sample_tree.n_leaves(), 8);

    // the first four samples form one side of the sample tree
    let order = &clusters.sample_tree.leaf_order;
    let first: Vec<usize> = order.iter().take(4).copied().collect();
    let mut side = first.clone();
    side.sort();
    assert!(side == vec![0, 1, 2, 3] || side == vec![4, 5, 6, 7], "{order:?}");

    // G1 and G5 rise together and merge before G2 joins them
    let first_merge = &clusters.gene_tree.merges[0];
    let mut pair = [first_merge.left, first_merge.right];
    pair.sort();
    assert_eq!(pair, [0, 2]);
}

#[test]
fn test_deg_clusters_need_two_degs() {
    let normalized = sample_matrix();
    let params = AnalysisParams {
        pca_genes: PcaGeneSet::All,
        ..AnalysisParams::default_v1()
    };
    let out = run(&normalized, &[0], &params);
    assert!(out.deg_clusters.is_none());
}

#[test]
fn test_score_pairs_and_cumulative_variance() {
    let normalized = sample_matrix();
    let params = AnalysisParams::default_v1();
    let out = run(&normalized, &[0, 1, 2, 3, 4], &params);

    let pair = out.score_pair(1, 2);
    for s in 0..pair.nrows() {
        assert_eq!(pair[[s, 0]], out.scores[[s, 1]]);
        assert_eq!(pair[[s, 1]], out.scores[[s, 2]]);
    }
    let missing = out.score_pair(2, 40);
    assert!(missing.column(1).iter().all(|&v| v == 0.0));

    let cumulative = out.cumulative_variance_ratio();
    assert_eq!(cumulative.len(), out.n_components());
    for w in cumulative.windows(2) {
        assert!(w[1] >= w[0]);
    }
    assert!((cumulative.last().unwrap() - 1.0).abs() < 1e-8);
}
