//! Produce-N driver.
//!
//! Chains batch rounds until exactly `target_count` copies are uploaded or
//! the job gives up. One [`ProductionJob`] owns all per-request state,
//! including the carried-forward seed file, and the driver loop moves it
//! through explicit phases: seeding, batching, uploading, then continue,
//! done or aborted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use uniq_media::fs_utils::{clear_dir, copy_aside, ensure_dir, remove_if_exists};
use uniq_media::open_source;
use uniq_models::{artifact_key, extension_of, Artifact, SourceVideo};
use uniq_storage::ArtifactStore;

use crate::batch::{BatchDriver, BatchRequest};
use crate::config::{BitrateBasis, SeedPolicy, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async_if, RetryConfig, RetryResult};

/// Prefix for carried-forward seed copies inside the work dir.
pub const SEED_PREFIX: &str = "seed";

/// How a production job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Done,
    Aborted { reason: String },
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Done => "done",
            JobStatus::Aborted { .. } => "aborted",
        }
    }
}

/// Result of one `produce_unique` call.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionOutcome {
    pub job_id: Uuid,
    pub target_count: usize,
    /// Uploaded copies in completion order, never more than `target_count`
    pub artifacts: Vec<Artifact>,
    pub rounds: u32,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl ProductionOutcome {
    pub fn urls(&self) -> Vec<String> {
        self.artifacts.iter().map(|a| a.url.clone()).collect()
    }

    pub fn produced(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Done
    }

    /// Treat anything short of the full count as an error.
    pub fn into_complete(self) -> WorkerResult<Vec<String>> {
        let urls = self.urls();
        match self.status {
            JobStatus::Done => Ok(urls),
            JobStatus::Aborted { .. } => Err(WorkerError::ExhaustedRetries {
                produced: urls.len(),
                target: self.target_count,
                urls,
            }),
        }
    }
}

/// State of one "produce N copies" request.
#[derive(Debug)]
pub struct ProductionJob {
    pub id: Uuid,
    pub original: SourceVideo,
    pub target_count: usize,
    pub artifacts: Vec<Artifact>,
    /// Copy set aside from the previous round, owned (and deleted) by the job
    pub carried_seed: Option<SourceVideo>,
    pub round: u32,
    pub empty_rounds: u32,
}

impl ProductionJob {
    pub fn new(original: SourceVideo, target_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            original,
            target_count,
            artifacts: Vec::with_capacity(target_count),
            carried_seed: None,
            round: 0,
            empty_rounds: 0,
        }
    }

    pub fn produced(&self) -> usize {
        self.artifacts.len()
    }

    pub fn needed(&self) -> usize {
        self.target_count.saturating_sub(self.produced())
    }

    pub fn is_complete(&self) -> bool {
        self.produced() >= self.target_count
    }

    /// Delete the carried-forward seed file, if any.
    pub async fn release_seed(&mut self) {
        if let Some(seed) = self.carried_seed.take() {
            remove_if_exists(&seed.path).await;
        }
    }
}

/// Where the driver loop is.
#[derive(Debug)]
enum Phase {
    Seeding,
    Batching { seed: SourceVideo, from_original: bool },
    Uploading { outputs: Vec<PathBuf> },
    Continue,
    Done,
    Aborted { reason: String },
}

/// Turns one source into N uploaded unique copies.
#[derive(Clone)]
pub struct UniqueProducer {
    driver: Arc<dyn BatchDriver>,
    store: Arc<dyn ArtifactStore>,
    config: WorkerConfig,
}

impl UniqueProducer {
    pub fn new(
        driver: Arc<dyn BatchDriver>,
        store: Arc<dyn ArtifactStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            driver,
            store,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn copies_per_call(&self) -> usize {
        self.config
            .max_copies_per_call
            .min(self.driver.max_copies_per_call())
            .max(1)
    }

    /// Produce exactly `target_count` uploaded copies of `source`.
    ///
    /// Upload and encode failures only shrink a round. The job itself ends as
    /// [`JobStatus::Done`] or [`JobStatus::Aborted`] with whatever was
    /// collected; use [`ProductionOutcome::into_complete`] to demand the
    /// full count.
    pub async fn produce_unique(
        &self,
        source: impl AsRef<Path>,
        target_count: usize,
    ) -> WorkerResult<ProductionOutcome> {
        let source = source.as_ref();
        if target_count == 0 {
            return Err(WorkerError::invalid_request("target count must be at least 1"));
        }

        let original = open_source(source).await.map_err(|e| {
            WorkerError::source_unavailable(format!("{}: {}", source.display(), e))
        })?;
        ensure_dir(&self.config.work_dir).await?;

        let mut job = ProductionJob::new(original, target_count);
        let logger = JobLogger::new(job.id, "produce_unique");
        logger.log_start(&format!(
            "{} copies of {} ({} bytes)",
            target_count,
            source.display(),
            job.original.size_bytes
        ));
        metrics::record_job_started();

        let status = self
            .drive(&mut job, &logger)
            .instrument(logger.create_span())
            .await;
        job.release_seed().await;

        match &status {
            JobStatus::Done => logger.log_completion(&format!(
                "{} copies in {} rounds",
                job.produced(),
                job.round
            )),
            JobStatus::Aborted { reason } => logger.log_error(&format!(
                "aborted with {}/{} copies: {}",
                job.produced(),
                job.target_count,
                reason
            )),
        }
        metrics::record_job_finished(status.as_str());

        Ok(ProductionOutcome {
            job_id: job.id,
            target_count,
            artifacts: job.artifacts,
            rounds: job.round,
            status,
        })
    }

    async fn drive(&self, job: &mut ProductionJob, logger: &JobLogger) -> JobStatus {
        let mut phase = Phase::Seeding;
        loop {
            phase = match phase {
                Phase::Seeding => self.seed(job),
                Phase::Batching {
                    seed,
                    from_original,
                } => self.batch(job, seed, from_original).await,
                Phase::Uploading { outputs } => self.upload(job, outputs).await,
                Phase::Continue => self.advance(job, logger),
                Phase::Done => return JobStatus::Done,
                Phase::Aborted { reason } => return JobStatus::Aborted { reason },
            };
        }
    }

    /// Pick this round's seed.
    fn seed(&self, job: &mut ProductionJob) -> Phase {
        job.round += 1;

        let carried = match self.config.seed_policy {
            SeedPolicy::CarryForward => job.carried_seed.clone(),
            SeedPolicy::Original => None,
        };

        match carried {
            Some(seed) => Phase::Batching {
                seed,
                from_original: false,
            },
            None => Phase::Batching {
                seed: job.original.clone(),
                from_original: true,
            },
        }
    }

    /// Run the round's batch under the retry budget.
    async fn batch(&self, job: &mut ProductionJob, seed: SourceVideo, from_original: bool) -> Phase {
        let copies = job.needed().min(self.copies_per_call());
        let request = BatchRequest {
            bitrate_reference_bytes: match self.config.bitrate_basis {
                BitrateBasis::Seed => seed.size_bytes,
                BitrateBasis::Original => job.original.size_bytes,
            },
            seed,
            copies,
            output_dir: self.config.work_dir.clone(),
        };
        info!(
            round = job.round,
            copies,
            produced = job.produced(),
            target = job.target_count,
            from_original,
            "Requesting batch"
        );

        let retry = RetryConfig::for_batches(&self.config);
        let driver = self.driver.as_ref();
        let req = &request;
        let result = retry_async_if(
            &retry,
            move || driver.run_batch(req),
            |e: &WorkerError| {
                let retryable = e.is_retryable();
                if retryable {
                    metrics::record_batch_retry();
                }
                retryable
            },
        )
        .await;

        match result {
            RetryResult::Success(outputs) => Phase::Uploading { outputs },
            RetryResult::Failed { error, attempts } if !from_original => {
                warn!(
                    round = job.round,
                    attempts,
                    "Carried seed failed, falling back to the original: {}",
                    error
                );
                metrics::record_seed_fallback();
                job.release_seed().await;
                Phase::Batching {
                    seed: job.original.clone(),
                    from_original: true,
                }
            }
            RetryResult::Failed { error, attempts } => Phase::Aborted {
                reason: format!(
                    "batch failed {} times on the original source: {}",
                    attempts, error
                ),
            },
        }
    }

    /// Upload the round's outputs. Every local file is gone when this returns.
    async fn upload(&self, job: &mut ProductionJob, outputs: Vec<PathBuf>) -> Phase {
        metrics::record_round(outputs.len());

        // The previous seed is no longer needed once its batch is done.
        job.release_seed().await;
        if self.config.seed_policy == SeedPolicy::CarryForward && outputs.len() < job.needed() {
            if let Some(first) = outputs.first() {
                job.carried_seed = self.set_aside(first).await;
            }
        }

        let before = job.produced();
        for path in outputs {
            if job.is_complete() {
                debug!("Dropping surplus copy {}", path.display());
                remove_if_exists(&path).await;
                continue;
            }

            let key = artifact_key(&extension_of(&path));
            let started = Instant::now();
            let result = self.store.put(&path, &key).await;
            remove_if_exists(&path).await;
            metrics::record_upload(result.is_ok(), started.elapsed().as_secs_f64());

            match result {
                Ok(url) => {
                    debug!(round = job.round, key = %key, "Uploaded copy");
                    job.artifacts.push(Artifact::new(key, url, job.round));
                }
                Err(e) => warn!(round = job.round, key = %key, "Upload failed, copy dropped: {}", e),
            }
        }
        metrics::set_job_progress(job.produced(), job.target_count);

        if job.produced() == before {
            job.empty_rounds += 1;
            job.release_seed().await;
            if job.empty_rounds > self.config.max_empty_rounds {
                return Phase::Aborted {
                    reason: format!("{} consecutive rounds uploaded nothing", job.empty_rounds),
                };
            }
        } else {
            job.empty_rounds = 0;
        }
        Phase::Continue
    }

    fn advance(&self, job: &ProductionJob, logger: &JobLogger) -> Phase {
        if job.is_complete() {
            return Phase::Done;
        }
        logger.log_progress(&format!(
            "round {}: {}/{} copies",
            job.round,
            job.produced(),
            job.target_count
        ));
        Phase::Seeding
    }

    /// Copy a batch output aside so it survives its own upload.
    async fn set_aside(&self, output: &Path) -> Option<SourceVideo> {
        let copied = match copy_aside(output, &self.config.work_dir, SEED_PREFIX).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not carry {} forward: {}", output.display(), e);
                return None;
            }
        };
        match open_source(&copied).await {
            Ok(seed) => Some(seed),
            Err(e) => {
                warn!("Carried seed {} unreadable: {}", copied.display(), e);
                remove_if_exists(&copied).await;
                None
            }
        }
    }

    /// Delete every uploaded artifact of an outcome, e.g. to reject a partial result.
    ///
    /// Returns the number of objects deleted.
    pub async fn discard(&self, outcome: &ProductionOutcome) -> usize {
        let mut deleted = 0;
        for artifact in &outcome.artifacts {
            match self.store.delete(&artifact.key).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(key = %artifact.key, "Failed to delete artifact: {}", e),
            }
        }
        info!(job_id = %outcome.job_id, deleted, "Discarded artifacts");
        deleted
    }

    /// Remove everything left in the work dir.
    pub async fn clear_work_dir(&self) -> WorkerResult<usize> {
        Ok(clear_dir(&self.config.work_dir).await?)
    }
}
