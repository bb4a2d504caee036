//! Pipeline construction.
//!
//! The toolchain check and capability probe run exactly once here. Nothing
//! downstream can be built without a detected hardware backend.

use std::sync::Arc;

use tracing::{error, info};

use uniq_media::{check_toolchain, CapabilityProber, ProcessRunner, Transcoder};
use uniq_models::{CapabilityProfile, EncoderBackend};
use uniq_storage::ArtifactStore;

use crate::batch::LocalBatchDriver;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::producer::UniqueProducer;

/// Initialized pipeline: a runner plus the detected encoder backend.
#[derive(Clone)]
pub struct Pipeline {
    runner: Arc<dyn ProcessRunner>,
    backend: EncoderBackend,
    config: WorkerConfig,
}

impl Pipeline {
    /// Check the toolchain and detect the hardware encoder.
    ///
    /// Fails with [`WorkerError::Initialization`] when ffmpeg is absent or no
    /// backend answers. There is no software fallback.
    pub async fn initialize(
        runner: Arc<dyn ProcessRunner>,
        config: WorkerConfig,
    ) -> WorkerResult<Self> {
        config.validate()?;

        check_toolchain(runner.as_ref(), config.probe_timeout)
            .await
            .map_err(|e| {
                error!("Encoder toolchain check failed: {}", e);
                WorkerError::initialization(format!("encoder toolchain absent: {}", e))
            })?;

        let profile = CapabilityProber::new(runner.clone())
            .with_timeout(config.probe_timeout)
            .detect()
            .await;

        let backend = match profile {
            CapabilityProfile::Hardware(backend) => backend,
            CapabilityProfile::NoneFound => {
                return Err(WorkerError::initialization(
                    "no hardware encoder detected (tried NVENC, QuickSync, AMF, VideoToolbox)",
                ))
            }
        };

        info!(backend = %backend, encoder = backend.encoder(), "Pipeline initialized");
        Ok(Self::with_backend(runner, backend, config))
    }

    /// Build a pipeline for an already known backend.
    pub fn with_backend(
        runner: Arc<dyn ProcessRunner>,
        backend: EncoderBackend,
        config: WorkerConfig,
    ) -> Self {
        Self {
            runner,
            backend,
            config,
        }
    }

    pub fn backend(&self) -> EncoderBackend {
        self.backend
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        self.runner.clone()
    }

    pub fn transcoder(&self) -> Transcoder {
        Transcoder::new(self.runner.clone(), self.backend).with_timeout(self.config.encode_timeout)
    }

    pub fn batch_driver(&self) -> LocalBatchDriver {
        LocalBatchDriver::new(self.runner.clone(), self.transcoder())
            .with_max_copies(self.config.max_copies_per_call)
    }

    /// Produce-N driver wired to the local batch driver and `store`.
    pub fn producer(&self, store: Arc<dyn ArtifactStore>) -> UniqueProducer {
        UniqueProducer::new(Arc::new(self.batch_driver()), store, self.config.clone())
    }
}
