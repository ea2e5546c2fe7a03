use super::json::render_summary_json;
use super::text::render_report_text;
use super::*;

fn summary() -> SummaryData {
    SummaryData {
        tool: "kira-ltbiseq".to_string(),
        version: "0.0.0".to_string(),
        git_hash: None,
        simd_backend: "scalar".to_string(),
        input: InputSummary {
            counts: "counts.csv".to_string(),
            meta: "meta.csv".to_string(),
            n_samples: 12,
            n_healthy: 8,
            n_latent_tb: 4,
            n_genes_raw: 1000,
        },
        params: AnalysisParams::default_v1(),
        filter: FilterSummary {
            n_kept: 600,
            n_removed: 400,
            kept_fraction: 0.6,
        },
        normalization: NormalizationSummary {
            n_reference_genes: 550,
            size_factor_min: 0.8,
            size_factor_median: 1.0,
            size_factor_max: 1.3,
        },
        deg: DegSummary {
            n_tested: 600,
            n_deg: 1,
            n_up: 1,
            n_down: 0,
            n_degenerate: 0,
        },
        pca: PcaSummary {
            gene_set: PcaGeneSet::All,
            n_genes: 600,
            explained_variance_ratio: vec![0.5, 0.25],
            top_genes_pc1: vec!["MARCH1".to_string()],
            top_genes_pc2: vec![],
        },
        models: vec![ModelSummary {
            id: "knn",
            name: "K-NN",
            mean_test_accuracy: 0.5,
            mean_train_accuracy: 0.9,
            fold_test_accuracy: vec![0.5, 0.5],
            plane_accuracy: None,
        }],
        best_model: Some("K-NN"),
        outputs: vec!["summary.json".to_string()],
    }
}

#[test]
fn test_bool_fraction() {
    assert_eq!(bool_fraction(&[true, false, true, true]), 0.75);
    assert_eq!(bool_fraction(&[]), 0.0);
}

#[test]
fn test_number_formats() {
    assert_eq!(format_f64_6(1.5), "1.500000");
    assert_eq!(format_p(0.25), "0.250000");
    assert_eq!(format_p(0.0), "0.000000");
    assert_eq!(format_p(1.5e-7), "1.500000e-7");
}

#[test]
fn test_summary_json_fields() {
    let json = render_summary_json(&summary()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["tool"], "kira-ltbiseq");
    assert_eq!(value["input"]["n_latent_tb"], 4);
    assert_eq!(value["params"]["pca_genes"], "deg");
    assert_eq!(value["params"]["knn_k"], 2);
    assert_eq!(value["pca"]["gene_set"], "all");
    assert_eq!(value["models"][0]["id"], "knn");
    assert!(value["git_hash"].is_null());
    assert!(json.ends_with('\n'));
}

#[test]
fn test_report_text_sections_and_notes() {
    let text = render_report_text(&summary());
    assert!(text.contains("1. Input"));
    assert!(text.contains("Samples: 12 (Healthy 8, LatentTB 4)"));
    assert!(text.contains("DEGs (padj < 0.05, |log2FC| > 1): 1"));
    assert!(text.contains("PC2: 0.250000 (cumulative 0.750000)"));
    assert!(text.contains("K-NN: mean test 0.500000"));
    assert!(text.contains("Only 1 DEGs found"));
    assert!(text.contains("fewer than 5 folds"));
    assert!(text.contains("Train accuracy exceeds test accuracy"));
}
