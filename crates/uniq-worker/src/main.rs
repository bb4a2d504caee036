//! Produce-N worker binary.
//!
//! Uploads `--count` unique copies of one source video and prints the
//! outcome as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use uniq_media::TokioProcessRunner;
use uniq_storage::S3Store;
use uniq_worker::{init_tracing, metrics, Pipeline, WorkerConfig};

#[derive(Debug, Parser)]
#[command(name = "uniq-worker", version, about = "Produce N unique copies of a video")]
struct Args {
    /// Source video
    source: PathBuf,

    /// Number of copies to upload
    #[arg(short = 'n', long)]
    count: usize,

    /// Discard uploaded copies and exit 1 unless all of them were produced
    #[arg(long)]
    require_complete: bool,

    /// Empty the work directory after the job
    #[arg(long)]
    clean_work_dir: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = metrics::init_metrics_from_env() {
        error!("Failed to start metrics exporter: {}", e);
        std::process::exit(1);
    }

    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    let store = match S3Store::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::initialize(Arc::new(TokioProcessRunner::new()), config).await {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let producer = pipeline.producer(Arc::new(store));
    let outcome = match producer.produce_unique(&args.source, args.count).await {
        Ok(o) => o,
        Err(e) => {
            error!("Job failed: {}", e);
            std::process::exit(1);
        }
    };

    if args.clean_work_dir {
        if let Err(e) = producer.clear_work_dir().await {
            warn!("Failed to clean work dir: {}", e);
        }
    }

    let complete = outcome.is_complete();
    if !complete && args.require_complete {
        producer.discard(&outcome).await;
        error!(
            "Produced {} of {} copies; uploaded copies discarded",
            outcome.produced(),
            outcome.target_count
        );
        std::process::exit(1);
    }

    let report = serde_json::json!({
        "job_id": outcome.job_id,
        "status": outcome.status.as_str(),
        "target_count": outcome.target_count,
        "rounds": outcome.rounds,
        "urls": outcome.urls(),
    });
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize outcome: {}", e);
            std::process::exit(1);
        }
    }

    if !complete {
        warn!(
            "Partial result: {} of {} copies",
            outcome.produced(),
            outcome.target_count
        );
    }
}
