//! Batch driver: one round of up to `max_copies_per_call` encodes from one seed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use uniq_media::fs_utils::{ensure_dir, remove_if_exists, unique_path};
use uniq_media::probe::DEFAULT_RESOLUTION_PROBE_TIMEOUT;
use uniq_media::{probe_resolution, MediaError, ProcessRunner, RecipeGenerator, Transcoder};
use uniq_models::SourceVideo;

use crate::config::MAX_COPIES_PER_CALL;
use crate::error::{WorkerError, WorkerResult};

/// Prefix for batch output file names.
pub const OUTPUT_PREFIX: &str = "unique";

/// One round's worth of work.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Video every copy in this round is derived from
    pub seed: SourceVideo,
    /// Copies wanted; drivers clamp this to their cap
    pub copies: usize,
    /// File size the recipe bitrate is computed from
    pub bitrate_reference_bytes: u64,
    /// Where the outputs are written
    pub output_dir: PathBuf,
}

/// Produces up to `max_copies_per_call` copies of a seed per call.
///
/// A partial batch is a success: only the produced paths are returned and
/// the caller decides whether to ask again for the shortfall. A batch with no
/// output at all is an error.
#[async_trait]
pub trait BatchDriver: Send + Sync {
    fn max_copies_per_call(&self) -> usize;

    async fn run_batch(&self, request: &BatchRequest) -> WorkerResult<Vec<PathBuf>>;
}

/// Runs every copy of a batch through the local hardware transcoder.
#[derive(Clone)]
pub struct LocalBatchDriver {
    runner: Arc<dyn ProcessRunner>,
    transcoder: Transcoder,
    generator: RecipeGenerator,
    max_copies: usize,
    probe_timeout: Duration,
}

impl LocalBatchDriver {
    pub fn new(runner: Arc<dyn ProcessRunner>, transcoder: Transcoder) -> Self {
        Self {
            runner,
            transcoder,
            generator: RecipeGenerator::new(),
            max_copies: MAX_COPIES_PER_CALL,
            probe_timeout: DEFAULT_RESOLUTION_PROBE_TIMEOUT,
        }
    }

    /// Lower the per-call cap. Values above [`MAX_COPIES_PER_CALL`] are ignored.
    pub fn with_max_copies(mut self, max_copies: usize) -> Self {
        self.max_copies = max_copies.clamp(1, MAX_COPIES_PER_CALL);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Copies actually attempted for a request.
    pub fn clamp_copies(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_copies)
    }

    async fn resolution_hint(&self, seed: &SourceVideo) -> Option<uniq_models::Resolution> {
        if seed.resolution.is_some() {
            return seed.resolution;
        }
        match probe_resolution(self.runner.as_ref(), &seed.path, self.probe_timeout).await {
            Ok(resolution) => Some(resolution),
            Err(e) => {
                warn!("Could not probe {}: {}", seed.path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl BatchDriver for LocalBatchDriver {
    fn max_copies_per_call(&self) -> usize {
        self.max_copies
    }

    async fn run_batch(&self, request: &BatchRequest) -> WorkerResult<Vec<PathBuf>> {
        let copies = self.clamp_copies(request.copies);
        if !request.seed.path.exists() {
            return Err(WorkerError::Media(MediaError::FileNotFound(
                request.seed.path.clone(),
            )));
        }
        ensure_dir(&request.output_dir).await?;

        let hint = self.resolution_hint(&request.seed).await;
        let extension = request.seed.extension();

        let mut pending: FuturesUnordered<_> = (0..copies)
            .map(|_| {
                let destination = unique_path(&request.output_dir, OUTPUT_PREFIX, &extension);
                let recipe = self.generator.generate(hint, request.bitrate_reference_bytes);
                let transcoder = &self.transcoder;
                let source = &request.seed.path;
                async move {
                    let result = transcoder.encode(source, &destination, &recipe).await;
                    (destination, result)
                }
            })
            .collect();

        let mut produced = Vec::with_capacity(copies);
        let mut fatal = None;
        while let Some((destination, result)) = pending.next().await {
            match result {
                Ok(()) => produced.push(destination),
                Err(e) => {
                    debug!("Discarding failed copy {}: {}", destination.display(), e);
                    remove_if_exists(&destination).await;
                    if e.is_missing_tool() {
                        fatal = Some(e);
                    }
                }
            }
        }

        info!(
            requested = copies,
            produced = produced.len(),
            seed = %request.seed.path.display(),
            "Batch finished"
        );

        if produced.is_empty() {
            return Err(match fatal {
                Some(e) => WorkerError::Media(e),
                None => WorkerError::batch_shortfall(copies, 0),
            });
        }
        Ok(produced)
    }
}
