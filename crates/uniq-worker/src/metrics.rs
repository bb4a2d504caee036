//! Prometheus metrics for production jobs.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Start the Prometheus scrape endpoint when `METRICS_ADDR` is set.
///
/// Without it, the `metrics` macros stay no-ops.
pub fn init_metrics_from_env() -> WorkerResult<()> {
    let Some(addr) = std::env::var("METRICS_ADDR").ok().filter(|v| !v.is_empty()) else {
        return Ok(());
    };

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| WorkerError::config_error(format!("METRICS_ADDR {:?}: {}", addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))?;

    info!("Serving metrics on http://{}/metrics", addr);
    Ok(())
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "uniq_jobs_started_total";
    pub const JOBS_FINISHED_TOTAL: &str = "uniq_jobs_finished_total";
    pub const ROUNDS_TOTAL: &str = "uniq_rounds_total";
    pub const BATCH_RETRIES_TOTAL: &str = "uniq_batch_retries_total";
    pub const SEED_FALLBACKS_TOTAL: &str = "uniq_seed_fallbacks_total";
    pub const COPIES_ENCODED_TOTAL: &str = "uniq_copies_encoded_total";
    pub const UPLOADS_TOTAL: &str = "uniq_uploads_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "uniq_upload_duration_seconds";
    pub const JOB_PROGRESS: &str = "uniq_job_progress_ratio";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

/// Record job end with its status (`done` or `aborted`).
pub fn record_job_finished(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::JOBS_FINISHED_TOTAL, &labels).increment(1);
}

pub fn record_round(copies: usize) {
    counter!(names::ROUNDS_TOTAL).increment(1);
    counter!(names::COPIES_ENCODED_TOTAL).increment(copies as u64);
}

pub fn record_batch_retry() {
    counter!(names::BATCH_RETRIES_TOTAL).increment(1);
}

pub fn record_seed_fallback() {
    counter!(names::SEED_FALLBACKS_TOTAL).increment(1);
}

/// Record one upload attempt.
pub fn record_upload(success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn set_job_progress(produced: usize, target: usize) {
    if target > 0 {
        gauge!(names::JOB_PROGRESS).set(produced as f64 / target as f64);
    }
}
