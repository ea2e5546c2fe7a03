mod classify;
mod input;
mod logging;
mod model;
mod pipeline;
mod report;
mod simd;
mod stats;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::input::{MetaColumns, load_input};
use crate::model::{AnalysisParams, PcaGeneSet};
use crate::pipeline::PipelineError;
use crate::pipeline::stage1_filter::run_stage1;
use crate::pipeline::stage2_normalize::run_stage2;
use crate::pipeline::stage3_deg::{Stage3Inputs, run_stage3};
use crate::pipeline::stage4_pca::{Stage4Inputs, run_stage4};
use crate::pipeline::stage5_classify::{Stage5Inputs, run_stage5};
use crate::pipeline::stage6_report::{RunInfo, Stage6Input, write_reports};
use crate::report::SummaryData;

const TOOL_NAME: &str = "kira-ltbiseq";

#[derive(Debug, Parser)]
#[command(
    name = "kira-ltbiseq",
    author,
    version,
    about = "Latent TB vs healthy RNA-seq: DEGs, PCA and classifier comparison",
    long_about = None
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every stage and write tables, summary and plots into --out.
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PcaGenesArg {
    Deg,
    All,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Gene x sample count table (.csv, .tsv or .txt, optionally .gz).
    #[arg(long)]
    counts: PathBuf,
    /// Sample metadata table with one row per sample.
    #[arg(long)]
    meta: PathBuf,
    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    sample_column: Option<String>,
    #[arg(long)]
    group_column: Option<String>,
    #[arg(long)]
    healthy_label: Option<String>,

    #[arg(long)]
    mean_floor: Option<f64>,
    #[arg(long)]
    sd_floor: Option<f64>,
    #[arg(long)]
    lfc_cutoff: Option<f64>,
    #[arg(long)]
    padj_cutoff: Option<f64>,
    #[arg(long)]
    folds: Option<usize>,
    #[arg(long)]
    knn_k: Option<usize>,
    /// Shuffle fold assignment within each class with this seed.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    pca_genes: Option<PcaGenesArg>,
    #[arg(long)]
    grid_step: Option<f64>,
    #[arg(long)]
    no_plots: bool,
}

#[derive(Debug, Clone)]
struct RunConfig {
    counts_path: PathBuf,
    meta_path: PathBuf,
    out_dir: PathBuf,
    columns: MetaColumns,
    params: AnalysisParams,
    write_plots: bool,
}

impl RunConfig {
    fn from_cli(cli: Cli) -> Result<Self, PipelineError> {
        let Command::Run(args) = cli.command;

        let mut columns = MetaColumns::default();
        if let Some(v) = args.sample_column {
            columns.sample = v;
        }
        if let Some(v) = args.group_column {
            columns.group = v;
        }
        if let Some(v) = args.healthy_label {
            columns.healthy_label = v;
        }

        let mut params = AnalysisParams::default_v1();
        if let Some(v) = args.mean_floor {
            params.mean_floor = v;
        }
        if let Some(v) = args.sd_floor {
            params.sd_floor = v;
        }
        if let Some(v) = args.lfc_cutoff {
            params.lfc_cutoff = v;
        }
        if let Some(v) = args.padj_cutoff {
            params.padj_cutoff = v;
        }
        if let Some(v) = args.folds {
            params.n_folds = v;
        }
        if let Some(v) = args.knn_k {
            params.knn_k = v;
        }
        if let Some(v) = args.grid_step {
            params.grid_step = v;
        }
        params.shuffle_seed = args.seed;
        if let Some(v) = args.pca_genes {
            params.pca_genes = match v {
                PcaGenesArg::Deg => PcaGeneSet::Deg,
                PcaGenesArg::All => PcaGeneSet::All,
            };
        }
        params.validate().map_err(PipelineError::Config)?;

        Ok(Self {
            counts_path: args.counts,
            meta_path: args.meta,
            out_dir: args.out,
            columns,
            params,
            write_plots: !args.no_plots,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        simd = simd::backend_name(),
        "{TOOL_NAME} starting"
    );
    let config = RunConfig::from_cli(cli)?;
    let summary = run_pipeline(&config)?;
    tracing::info!(
        deg = summary.deg.n_deg,
        best_model = summary.best_model.unwrap_or("none"),
        out = %config.out_dir.display(),
        "done"
    );
    Ok(())
}

fn run_pipeline(config: &RunConfig) -> Result<SummaryData, PipelineError> {
    let params = &config.params;
    let bundle = load_input(&config.counts_path, &config.meta_path, &config.columns)?;
    let conditions = &bundle.sheet.conditions;

    let filter = run_stage1(&bundle.counts, params)?;
    let normalized = run_stage2(&bundle.counts, &filter.kept)?;
    let kept_genes: Vec<String> = normalized
        .genes
        .iter()
        .map(|&g| bundle.counts.genes[g].clone())
        .collect();

    let deg = run_stage3(&Stage3Inputs {
        genes: &kept_genes,
        normalized: &normalized.normalized,
        conditions,
        params,
    })?;
    let deg_positions = deg.deg_positions();

    let pca = run_stage4(&Stage4Inputs {
        genes: &kept_genes,
        normalized: &normalized.normalized,
        deg_positions: &deg_positions,
        params,
    })?;
    let plane = pca.plane();

    let classify = run_stage5(&Stage5Inputs {
        features: &pca.features,
        plane: &plane,
        conditions,
        params,
        with_surfaces: config.write_plots,
    })?;

    let info = RunInfo {
        tool_name: TOOL_NAME.to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: read_git_hash(Path::new(".")),
        simd_backend: simd::backend_name().to_string(),
        counts_path: config.counts_path.display().to_string(),
        meta_path: config.meta_path.display().to_string(),
    };
    let summary = write_reports(
        &Stage6Input {
            info: &info,
            params,
            counts: &bundle.counts,
            sheet: &bundle.sheet,
            filter: &filter,
            normalized: &normalized,
            deg: &deg,
            pca: &pca,
            classify: &classify,
            write_plots: config.write_plots,
        },
        &config.out_dir,
    )?;
    Ok(summary)
}

fn read_git_hash(repo_root: &Path) -> Option<String> {
    let head = repo_root.join(".git/HEAD");
    let content = std::fs::read_to_string(head).ok()?;
    if let Some(ref_line) = content.strip_prefix("ref: ") {
        let ref_path = repo_root.join(".git").join(ref_line.trim());
        return std::fs::read_to_string(ref_path)
            .ok()
            .map(|s| s.trim().to_string());
    }
    Some(content.trim().to_string())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
