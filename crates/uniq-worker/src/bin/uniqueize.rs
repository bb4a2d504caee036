//! Offline uniqueizer: one unique copy of every video in a file or directory.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use uniq_media::TokioProcessRunner;
use uniq_worker::offline::{DEFAULT_ERROR_LOG, DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_DIR};
use uniq_worker::{init_tracing, metrics, run_offline, OfflineOptions, Pipeline, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "uniqueize", version, about = "Local GPU video uniqueization")]
struct Args {
    /// Video file or directory (defaults to `input/`)
    input_path: Option<PathBuf>,

    /// Output file, used only when a single video is processed
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output directory when several videos are processed
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// File that collects per-video failures
    #[arg(long, default_value = DEFAULT_ERROR_LOG)]
    error_log: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    metrics::init_metrics_from_env()?;
    let config = WorkerConfig::from_env()?;
    let pipeline = Pipeline::initialize(Arc::new(TokioProcessRunner::new()), config).await?;
    info!("Using {} ({})", pipeline.backend(), pipeline.backend().encoder());

    let options = OfflineOptions {
        create_input: args.input_path.is_none(),
        input: args
            .input_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
        output: args.output,
        output_dir: args.output_dir,
        error_log: args.error_log,
    };

    let summary = run_offline(&pipeline, &options).await?;

    info!(
        "Done: {} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    if !summary.failed.is_empty() {
        info!("Failure details in {}", options.error_log.display());
    }
    Ok(())
}
