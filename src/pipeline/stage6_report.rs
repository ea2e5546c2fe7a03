use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::input::{CountMatrix, SampleSheet};
use crate::model::AnalysisParams;
use crate::model::condition::class_counts;
use crate::pipeline::stage1_filter::Stage1Output;
use crate::pipeline::stage2_normalize::Stage2Output;
use crate::pipeline::stage3_deg::Stage3Output;
use crate::pipeline::stage4_pca::{DegClusters, Stage4Output};
use crate::pipeline::stage5_classify::Stage5Output;
use crate::report::json::render_summary_json;
use crate::report::plot::{
    Arrow, ClustermapSpec, ScatterSpec, render_clustermap, render_cumulative_variance,
    render_cv_bars, render_mean_variance, render_model_boxplot, render_scatter, render_surface,
    save_png,
};
use crate::report::text::render_report_text;
use crate::report::{
    DegSummary, FilterSummary, InputSummary, ModelSummary, NormalizationSummary, PcaSummary,
    ReportError, SummaryData, bool_fraction, format_f64_6, format_p,
};
use crate::stats::cluster::ClusterTree;
use crate::stats::median;

pub const DEG_LIST_FILE: &str = "LatentTB_DEG.csv";
const SCORE_COMPONENTS: usize = 4;
const VARIANCE_COMPONENTS: usize = 10;

#[derive(Debug, Clone)]
pub struct RunInfo {
    pub tool_name: String,
    pub tool_version: String,
    pub git_hash: Option<String>,
    pub simd_backend: String,
    pub counts_path: String,
    pub meta_path: String,
}

#[derive(Debug, Clone)]
pub struct Stage6Input<'a> {
    pub info: &'a RunInfo,
    pub params: &'a AnalysisParams,
    pub counts: &'a CountMatrix,
    pub sheet: &'a SampleSheet,
    pub filter: &'a Stage1Output,
    pub normalized: &'a Stage2Output,
    pub deg: &'a Stage3Output,
    pub pca: &'a Stage4Output,
    pub classify: &'a Stage5Output,
    pub write_plots: bool,
}

pub fn write_reports(input: &Stage6Input<'_>, out_dir: &Path) -> Result<SummaryData, ReportError> {
    fs::create_dir_all(out_dir)?;
    let mut outputs = Vec::new();
    let mut record = |name: &str| outputs.push(name.to_string());

    write_gene_filter(input, &out_dir.join("gene_filter.tsv"))?;
    record("gene_filter.tsv");
    write_size_factors(input, &out_dir.join("size_factors.tsv"))?;
    record("size_factors.tsv");
    write_deg_table(input, &out_dir.join("deg_results.tsv"))?;
    record("deg_results.tsv");
    write_deg_list(input.deg, &out_dir.join(DEG_LIST_FILE))?;
    record(DEG_LIST_FILE);
    write_pca_scores(input, &out_dir.join("pca_scores.tsv"))?;
    record("pca_scores.tsv");
    write_pca_variance(input.pca, &out_dir.join("pca_variance.tsv"))?;
    record("pca_variance.tsv");
    write_pca_top_genes(input.pca, &out_dir.join("pca_top_genes.tsv"))?;
    record("pca_top_genes.tsv");
    write_cv_scores(input.classify, &out_dir.join("cv_scores.tsv"))?;
    record("cv_scores.tsv");

    if let Some(clusters) = &input.pca.deg_clusters {
        write_deg_clusters(clusters, &input.sheet.samples, &out_dir.join("deg_clusters.tsv"))?;
        record("deg_clusters.tsv");
        write_deg_linkage(clusters, &out_dir.join("deg_linkage.tsv"))?;
        record("deg_linkage.tsv");
    }

    if input.write_plots {
        for name in write_plots(input, out_dir)? {
            record(&name);
        }
    }

    record("summary.json");
    record("report.txt");
    let summary = build_summary(input, outputs);

    let json = render_summary_json(&summary)?;
    write_text(&out_dir.join("summary.json"), &json)?;
    let report = render_report_text(&summary);
    write_text(&out_dir.join("report.txt"), &report)?;

    tracing::info!(
        out = %out_dir.display(),
        files = summary.outputs.len(),
        "stage6: reports written"
    );
    Ok(summary)
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<File>, ReportError> {
    Ok(WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

fn flag(v: bool) -> String {
    String::from(if v { "1" } else { "0" })
}

fn write_text(path: &Path, text: &str) -> Result<(), ReportError> {
    let mut f = File::create(path)?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

fn write_gene_filter(input: &Stage6Input<'_>, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record(["gene", "mean_log2", "sd_log2", "kept"])?;
    let kept = input.filter.is_kept();
    for (g, gene) in input.counts.genes.iter().enumerate() {
        w.write_record([
            gene.clone(),
            format_f64_6(input.filter.mean_log2[g]),
            format_f64_6(input.filter.sd_log2[g]),
            flag(kept[g]),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_size_factors(input: &Stage6Input<'_>, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record(["sample", "condition", "size_factor"])?;
    for (s, sample) in input.counts.samples.iter().enumerate() {
        w.write_record([
            sample.clone(),
            input.sheet.conditions[s].label().to_string(),
            format_f64_6(input.normalized.size_factors[s]),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_deg_table(input: &Stage6Input<'_>, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record([
        "gene",
        "base_mean",
        "mean_healthy",
        "mean_latent_tb",
        "log2_fold_change",
        "t_statistic",
        "p_value",
        "p_adj",
        "is_deg",
    ])?;
    for row in &input.deg.rows {
        w.write_record([
            row.gene.clone(),
            format_f64_6(row.base_mean),
            format_f64_6(row.mean_healthy),
            format_f64_6(row.mean_tb),
            format_f64_6(row.log2_fold_change),
            format_f64_6(row.t_statistic),
            format_p(row.p_value),
            format_p(row.p_adj),
            flag(row.is_deg),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_deg_list(deg: &Stage3Output, path: &Path) -> Result<(), ReportError> {
    let mut w = WriterBuilder::new().has_headers(false).from_path(path)?;
    for gene in deg.deg_genes() {
        w.write_record([gene])?;
    }
    w.flush()?;
    Ok(())
}

fn write_pca_scores(input: &Stage6Input<'_>, path: &Path) -> Result<(), ReportError> {
    let n_comp = input.pca.n_components().min(SCORE_COMPONENTS);
    let mut w = tsv_writer(path)?;
    let mut header = vec!["sample".to_string(), "condition".to_string()];
    header.extend((1..=n_comp).map(|c| format!("PC{c}")));
    w.write_record(&header)?;
    for (s, sample) in input.counts.samples.iter().enumerate() {
        let mut row = vec![
            sample.clone(),
            input.sheet.conditions[s].label().to_string(),
        ];
        row.extend((0..n_comp).map(|c| format_f64_6(input.pca.scores[[s, c]])));
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

fn write_pca_variance(pca: &Stage4Output, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record(["component", "explained_variance", "ratio", "cumulative"])?;
    let mut cumulative = 0.0;
    for (c, (v, r)) in pca
        .explained_variance
        .iter()
        .zip(&pca.explained_variance_ratio)
        .enumerate()
    {
        cumulative += r;
        w.write_record([
            format!("PC{}", c + 1),
            format_f64_6(*v),
            format_f64_6(*r),
            format_f64_6(cumulative),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_pca_top_genes(pca: &Stage4Output, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record([
        "component",
        "rank",
        "gene",
        "weighted_loading",
        "arrow_pc1",
        "arrow_pc2",
    ])?;
    for t in &pca.top_genes {
        w.write_record([
            format!("PC{}", t.component + 1),
            t.rank.to_string(),
            t.gene.clone(),
            format_f64_6(t.weighted_loading),
            format_f64_6(t.arrow[0]),
            format_f64_6(t.arrow[1]),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_cv_scores(classify: &Stage5Output, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record([
        "model",
        "fold",
        "n_train",
        "n_test",
        "train_accuracy",
        "test_accuracy",
    ])?;
    for m in &classify.models {
        for f in &m.folds {
            w.write_record([
                m.kind.id().to_string(),
                (f.fold + 1).to_string(),
                f.n_train.to_string(),
                f.n_test.to_string(),
                format_f64_6(f.train_accuracy),
                format_f64_6(f.test_accuracy),
            ])?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Renders every figure and returns the file names written.
fn write_plots(input: &Stage6Input<'_>, out_dir: &Path) -> Result<Vec<String>, ReportError> {
    let mut written = Vec::new();
    let mut save = |img: image::RgbImage, name: String| -> Result<(), ReportError> {
        save_png(&img, &out_dir.join(&name))?;
        written.push(name);
        Ok(())
    };
    let conditions = input.sheet.conditions.as_slice();
    let pca = input.pca;

    save(
        render_mean_variance(
            &input.filter.mean_log2,
            &input.filter.sd_log2,
            input.params.mean_floor,
        )?,
        "mean_variance.png".to_string(),
    )?;

    if let Some(clusters) = &pca.deg_clusters {
        save(
            render_clustermap(&ClustermapSpec {
                values: &clusters.log2,
                genes: &clusters.genes,
                conditions,
                gene_tree: &clusters.gene_tree,
                sample_tree: &clusters.sample_tree,
            })?,
            "deg_clustermap.png".to_string(),
        )?;
    }

    let cumulative = pca.cumulative_variance_ratio();
    save(
        render_cumulative_variance(&cumulative[..cumulative.len().min(VARIANCE_COMPONENTS)])?,
        "pca_cumulative_variance.png".to_string(),
    )?;

    let arrows: Vec<Arrow> = pca
        .top_genes
        .iter()
        .map(|t| Arrow {
            label: t.gene.clone(),
            tip: t.arrow,
            component: t.component,
        })
        .collect();
    let axis = |c: usize| match pca.explained_variance_ratio.get(c) {
        Some(r) => format!("PC{} ({:.2}%)", c + 1, r * 100.0),
        None => format!("PC{}", c + 1),
    };

    let plane = pca.plane();
    let (pc1, pc2) = (axis(0), axis(1));
    save(
        render_scatter(&ScatterSpec {
            title: "Latent TB (PC1 vs PC2)",
            x_label: &pc1,
            y_label: &pc2,
            points: &plane,
            conditions,
            arrows: &arrows,
        })?,
        "pc1_vs_pc2.png".to_string(),
    )?;
    for (a, b) in [(1usize, 2usize), (2, 3)] {
        if b >= pca.n_components() {
            break;
        }
        let points = pca.score_pair(a, b);
        let (x_label, y_label) = (axis(a), axis(b));
        let title = format!("PC{} vs PC{} Plot", a + 1, b + 1);
        save(
            render_scatter(&ScatterSpec {
                title: &title,
                x_label: &x_label,
                y_label: &y_label,
                points: &points,
                conditions,
                arrows: &[],
            })?,
            format!("pc{}_vs_pc{}.png", a + 1, b + 1),
        )?;
    }

    for model in &input.classify.models {
        let train: Vec<f64> = model.folds.iter().map(|f| f.train_accuracy).collect();
        let test: Vec<f64> = model.folds.iter().map(|f| f.test_accuracy).collect();
        save(
            render_cv_bars(model.kind.display_name(), &train, &test)?,
            format!("{}.png", model.kind.cv_plot_stem()),
        )?;
    }
    let comparison: Vec<(&str, Vec<f64>)> = input
        .classify
        .models
        .iter()
        .map(|m| {
            let test = m.folds.iter().map(|f| f.test_accuracy).collect();
            (m.kind.display_name(), test)
        })
        .collect();
    save(
        render_model_boxplot(&comparison)?,
        "model_comparison.png".to_string(),
    )?;

    for model in &input.classify.models {
        if let Some(surface) = &model.surface {
            let title = format!("Latent TB Predictive {} Model (PCA)", model.kind.display_name());
            save(
                render_surface(
                    surface,
                    &ScatterSpec {
                        title: &title,
                        x_label: &pc1,
                        y_label: &pc2,
                        points: &plane,
                        conditions,
                        arrows: &arrows,
                    },
                )?,
                format!("{}.png", model.kind.plot_stem()),
            )?;
        }
    }
    Ok(written)
}

/// Dendrogram leaf order of the clustermap rows and columns.
fn write_deg_clusters(
    clusters: &DegClusters,
    samples: &[String],
    path: &Path,
) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record(["axis", "position", "label"])?;
    for (pos, &s) in clusters.sample_tree.leaf_order.iter().enumerate() {
        w.write_record(["sample".to_string(), (pos + 1).to_string(), samples[s].clone()])?;
    }
    for (pos, &g) in clusters.gene_tree.leaf_order.iter().enumerate() {
        w.write_record(["gene".to_string(), (pos + 1).to_string(), clusters.genes[g].clone()])?;
    }
    w.flush()?;
    Ok(())
}

fn write_deg_linkage(clusters: &DegClusters, path: &Path) -> Result<(), ReportError> {
    let mut w = tsv_writer(path)?;
    w.write_record(["tree", "step", "left", "right", "height", "size"])?;
    let trees: [(&str, &ClusterTree); 2] = [
        ("sample", &clusters.sample_tree),
        ("gene", &clusters.gene_tree),
    ];
    for (name, tree) in trees {
        for (step, m) in tree.merges.iter().enumerate() {
            w.write_record([
                name.to_string(),
                (step + 1).to_string(),
                m.left.to_string(),
                m.right.to_string(),
                format_f64_6(m.height),
                m.size.to_string(),
            ])?;
        }
    }
    w.flush()?;
    Ok(())
}

fn build_summary(input: &Stage6Input<'_>, outputs: Vec<String>) -> SummaryData {
    let [n_healthy, n_latent_tb] = class_counts(&input.sheet.conditions);
    let n_genes_raw = input.counts.n_genes();
    let n_kept = input.filter.kept.len();

    let sf = &input.normalized.size_factors;
    let sf_min = sf.iter().copied().fold(f64::INFINITY, f64::min);
    let sf_max = sf.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let degs: Vec<_> = input.deg.rows.iter().filter(|r| r.is_deg).collect();
    let n_up = degs.iter().filter(|r| r.log2_fold_change > 0.0).count();

    let top = |component: usize| -> Vec<String> {
        input
            .pca
            .top_genes
            .iter()
            .filter(|t| t.component == component)
            .map(|t| t.gene.clone())
            .collect()
    };

    let models = input
        .classify
        .models
        .iter()
        .map(|m| ModelSummary {
            id: m.kind.id(),
            name: m.kind.display_name(),
            mean_test_accuracy: m.mean_test_accuracy,
            mean_train_accuracy: m.mean_train_accuracy,
            fold_test_accuracy: m.folds.iter().map(|f| f.test_accuracy).collect(),
            plane_accuracy: m.plane_accuracy,
        })
        .collect();

    SummaryData {
        tool: input.info.tool_name.clone(),
        version: input.info.tool_version.clone(),
        git_hash: input.info.git_hash.clone(),
        simd_backend: input.info.simd_backend.clone(),
        input: InputSummary {
            counts: input.info.counts_path.clone(),
            meta: input.info.meta_path.clone(),
            n_samples: input.counts.n_samples(),
            n_healthy,
            n_latent_tb,
            n_genes_raw,
        },
        params: input.params.clone(),
        filter: FilterSummary {
            n_kept,
            n_removed: n_genes_raw - n_kept,
            kept_fraction: bool_fraction(&input.filter.is_kept()),
        },
        normalization: NormalizationSummary {
            n_reference_genes: input.normalized.n_reference_genes,
            size_factor_min: sf_min,
            size_factor_median: median(sf).unwrap_or(0.0),
            size_factor_max: sf_max,
        },
        deg: DegSummary {
            n_tested: input.deg.rows.len(),
            n_deg: degs.len(),
            n_up,
            n_down: degs.len() - n_up,
            n_degenerate: input.deg.n_degenerate,
        },
        pca: PcaSummary {
            gene_set: input.pca.gene_set,
            n_genes: input.pca.genes.len(),
            explained_variance_ratio: input.pca.explained_variance_ratio.clone(),
            top_genes_pc1: top(0),
            top_genes_pc2: top(1),
        },
        models,
        best_model: input.classify.best().map(|m| m.kind.display_name()),
        outputs,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_report.rs"]
mod tests;
