//! chat-density — Binary Entrypoint
//! Reads every chat dataset in the input directory, computes comment counts
//! per window and writes counts + chart payloads to the output directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat_density::aggregate::BucketMode;
use chat_density::config::AnalysisConfig;
use chat_density::ingest::csv_source::CsvChatSource;
use chat_density::ingest::discover_datasets;
use chat_density::metrics::Metrics;
use chat_density::pipeline::run_batch;
use chat_density::present::ChartKind;
use chat_density::sink::FileSink;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Dataset names (CSV file stems) to process; all `*.csv` in the input dir when empty.
    datasets: Vec<String>,

    /// Config file (TOML or JSON); overrides $CHAT_DENSITY_CONFIG_PATH lookup.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `<dataset>.csv` chat exports.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory for aggregated CSVs and chart payloads.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Bucket width in seconds; repeat for several chart sets.
    #[arg(long = "width")]
    widths: Vec<f64>,

    /// Gaussian smoothing sigma (in buckets).
    #[arg(long)]
    sigma: Option<f64>,

    /// bar | line
    #[arg(long)]
    chart_kind: Option<ChartKind>,

    /// message-anchored | aligned
    #[arg(long)]
    mode: Option<BucketMode>,

    /// Present raw counts on line charts.
    #[arg(long)]
    no_smooth: bool,

    /// Datasets processed at the same time.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the Prometheus exposition of this run here.
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

/// Compact logs by default, JSON when CHAT_DENSITY_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chat_density=info,warn"));

    let json = std::env::var("CHAT_DENSITY_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn resolve_config(args: &Args) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(p) => AnalysisConfig::load_from(p)?,
        None => AnalysisConfig::load_default()?,
    };

    if let Some(d) = &args.input_dir {
        cfg.input_dir = d.clone();
    }
    if let Some(d) = &args.output_dir {
        cfg.output_dir = d.clone();
    }
    if !args.widths.is_empty() {
        cfg.widths_seconds = args.widths.clone();
    }
    if let Some(s) = args.sigma {
        cfg.sigma = s;
    }
    if let Some(k) = args.chart_kind {
        cfg.chart_kind = k;
    }
    if let Some(m) = args.mode {
        cfg.mode = m;
    }
    if args.no_smooth {
        cfg.smooth = false;
    }
    if let Some(c) = args.concurrency {
        cfg.concurrency = c;
    }
    cfg.validated().context("invalid settings")
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let metrics = Metrics::init()?;
    let cfg = resolve_config(&args)?;

    let datasets = if args.datasets.is_empty() {
        discover_datasets(&cfg.input_dir)?
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    } else {
        args.datasets.clone()
    };
    if datasets.is_empty() {
        tracing::warn!(dir = %cfg.input_dir.display(), "no chat datasets found");
    }

    info!(
        input = %cfg.input_dir.display(),
        output = %cfg.output_dir.display(),
        widths = ?cfg.widths_seconds,
        kind = %cfg.chart_kind,
        mode = ?cfg.mode,
        "starting"
    );

    let source = Arc::new(CsvChatSource::new(&cfg.input_dir));
    let sink = Arc::new(FileSink::new(&cfg.output_dir));
    let summary = run_batch(cfg, datasets, source, sink).await;

    if let Some(path) = &args.metrics_out {
        std::fs::write(path, metrics.render())
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    for (dataset, err) in &summary.failed {
        tracing::error!(dataset = %dataset, "{err}");
    }
    if !summary.is_clean() {
        bail!(
            "{} of {} dataset(s) failed",
            summary.failed.len(),
            summary.failed.len() + summary.processed.len()
        );
    }
    Ok(())
}
