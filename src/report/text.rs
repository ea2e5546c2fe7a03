use crate::model::PcaGeneSet;
use crate::report::{ModelSummary, SummaryData, format_f64_6};

pub fn render_report_text(data: &SummaryData) -> String {
    let mut out = String::new();

    out.push_str("Latent TB vs Healthy Transcriptome Report\n");
    out.push_str("=========================================\n\n");

    out.push_str("1. Input\n");
    out.push_str(&format!("Counts: {}\n", data.input.counts));
    out.push_str(&format!("Metadata: {}\n", data.input.meta));
    out.push_str(&format!(
        "Samples: {} (Healthy {}, LatentTB {})\n",
        data.input.n_samples, data.input.n_healthy, data.input.n_latent_tb
    ));
    out.push_str(&format!("Genes: {}\n\n", data.input.n_genes_raw));

    out.push_str("2. Filtering and normalization\n");
    out.push_str(&format!(
        "Kept genes: {} of {} (fraction {})\n",
        data.filter.n_kept,
        data.input.n_genes_raw,
        format_f64_6(data.filter.kept_fraction)
    ));
    out.push_str(&format!(
        "Reference genes for size factors: {}\n",
        data.normalization.n_reference_genes
    ));
    out.push_str(&format!(
        "Size factors: min {}, median {}, max {}\n\n",
        format_f64_6(data.normalization.size_factor_min),
        format_f64_6(data.normalization.size_factor_median),
        format_f64_6(data.normalization.size_factor_max)
    ));

    out.push_str("3. Differential expression\n");
    out.push_str(&format!(
        "Tested genes: {}\nDEGs (padj < {}, |log2FC| > {}): {}\n",
        data.deg.n_tested,
        data.params.padj_cutoff,
        data.params.lfc_cutoff,
        data.deg.n_deg
    ));
    out.push_str(&format!(
        "Up in LatentTB: {}\nDown in LatentTB: {}\n",
        data.deg.n_up, data.deg.n_down
    ));
    if data.deg.n_degenerate > 0 {
        out.push_str(&format!(
            "Genes without variance in either group: {}\n",
            data.deg.n_degenerate
        ));
    }
    out.push('\n');

    out.push_str("4. Principal components\n");
    out.push_str(&format!(
        "Gene set: {} ({} genes)\n",
        gene_set_label(data.pca.gene_set),
        data.pca.n_genes
    ));
    let mut cumulative = 0.0;
    for (i, r) in data.pca.explained_variance_ratio.iter().enumerate() {
        cumulative += r;
        out.push_str(&format!(
            "PC{}: {} (cumulative {})\n",
            i + 1,
            format_f64_6(*r),
            format_f64_6(cumulative)
        ));
    }
    if !data.pca.top_genes_pc1.is_empty() {
        out.push_str(&format!("Top PC1 genes: {}\n", data.pca.top_genes_pc1.join(", ")));
    }
    if !data.pca.top_genes_pc2.is_empty() {
        out.push_str(&format!("Top PC2 genes: {}\n", data.pca.top_genes_pc2.join(", ")));
    }
    out.push('\n');

    out.push_str("5. Classifier comparison\n");
    out.push_str(&format!(
        "Stratified {}-fold cross-validation\n",
        data.params.n_folds
    ));
    for m in &data.models {
        out.push_str(&model_line(m));
    }
    if let Some(best) = data.best_model {
        out.push_str(&format!("Best mean test accuracy: {}\n", best));
    }
    out.push('\n');

    out.push_str("6. Notes\n");
    let notes = notes(data);
    if notes.is_empty() {
        out.push_str("None\n");
    }
    for note in notes {
        out.push_str(&format!("- {}\n", note));
    }

    out
}

fn model_line(m: &ModelSummary) -> String {
    let folds = m
        .fold_test_accuracy
        .iter()
        .map(|&a| format!("{:.3}", a))
        .collect::<Vec<_>>()
        .join(" ");
    let mut line = format!(
        "{}: mean test {} (train {}) folds [{}]",
        m.name,
        format_f64_6(m.mean_test_accuracy),
        format_f64_6(m.mean_train_accuracy),
        folds
    );
    if let Some(acc) = m.plane_accuracy {
        line.push_str(&format!(", PC1/PC2 fit {}", format_f64_6(acc)));
    }
    line.push('\n');
    line
}

fn gene_set_label(set: PcaGeneSet) -> &'static str {
    match set {
        PcaGeneSet::Deg => "differentially expressed genes",
        PcaGeneSet::All => "all filtered genes",
    }
}

fn notes(data: &SummaryData) -> Vec<String> {
    let mut notes = Vec::new();
    if data.params.pca_genes == PcaGeneSet::Deg && data.pca.gene_set == PcaGeneSet::All {
        notes.push(format!(
            "Only {} DEGs found; PCA and classifiers used all filtered genes.",
            data.deg.n_deg
        ));
    }
    let smallest = data.input.n_healthy.min(data.input.n_latent_tb);
    if smallest < data.params.n_folds {
        notes.push(format!(
            "Smallest group has {} samples, fewer than {} folds.",
            smallest, data.params.n_folds
        ));
    }
    if data
        .models
        .iter()
        .any(|m| m.mean_train_accuracy - m.mean_test_accuracy > 0.2)
    {
        notes.push("Train accuracy exceeds test accuracy by more than 0.2 for at least one model.".to_string());
    }
    notes
}
