//! Hardware encoder capability probing.
//!
//! Backends are tried in [`EncoderBackend::PRIORITY`] order. A probe that
//! errors or times out only means "this backend is unavailable"; deciding
//! whether "none found" is fatal is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uniq_models::{CapabilityProfile, EncoderBackend};

use crate::command::ProcessRunner;
use crate::error::{MediaError, MediaResult};

/// Default bound for a single capability query.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Discovers which hardware encoder is usable on this machine.
pub struct CapabilityProber {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
}

impl CapabilityProber {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe every backend in priority order and return the first match.
    pub async fn detect(&self) -> CapabilityProfile {
        for backend in EncoderBackend::PRIORITY {
            if self.probe_backend(backend).await {
                info!(
                    backend = %backend,
                    encoder = backend.encoder(),
                    hwaccel = backend.hwaccel(),
                    "Hardware encoder detected"
                );
                return CapabilityProfile::Hardware(backend);
            }
        }

        warn!("No hardware encoder detected");
        CapabilityProfile::NoneFound
    }

    /// Run one capability query for a backend.
    async fn probe_backend(&self, backend: EncoderBackend) -> bool {
        let args = vec!["-hide_banner".to_string(), "-encoders".to_string()];

        match self.runner.run("ffmpeg", &args, self.timeout).await {
            Ok(output) => {
                let found = output.success() && output.stdout.contains(backend.signature());
                debug!(backend = %backend, found, "Capability probe finished");
                found
            }
            Err(e) => {
                debug!(backend = %backend, "Capability probe failed: {}", e);
                false
            }
        }
    }
}

/// Verify the transcoder itself answers (`ffmpeg -version`).
pub async fn check_toolchain(runner: &dyn ProcessRunner, timeout: Duration) -> MediaResult<()> {
    let args = vec!["-version".to_string()];
    let output = runner.run("ffmpeg", &args, timeout).await.map_err(|e| match e {
        MediaError::ToolNotFound(_) => MediaError::FfmpegNotFound,
        other => other,
    })?;

    if !output.success() {
        return Err(MediaError::encode_failed(
            "ffmpeg -version exited with non-zero status",
            Some(output.stderr),
            output.exit_code,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProcessOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers `-encoders` with a fixed listing.
    struct EncoderListing {
        listing: &'static str,
        exit_code: i32,
        calls: AtomicUsize,
    }

    impl EncoderListing {
        fn new(listing: &'static str) -> Self {
            Self {
                listing,
                exit_code: 0,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for EncoderListing {
        async fn run(&self, _: &str, _: &[String], _: Duration) -> MediaResult<ProcessOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProcessOutput {
                exit_code: Some(self.exit_code),
                stdout: self.listing.to_string(),
                stderr: String::new(),
            })
        }
    }

    struct AlwaysTimesOut;

    #[async_trait]
    impl ProcessRunner for AlwaysTimesOut {
        async fn run(&self, _: &str, _: &[String], t: Duration) -> MediaResult<ProcessOutput> {
            Err(MediaError::Timeout(t))
        }
    }

    #[tokio::test]
    async fn test_nvenc_wins_over_qsv() {
        let runner = Arc::new(EncoderListing::new(
            " V....D h264_qsv  H.264 (Intel Quick Sync)\n V....D h264_nvenc NVIDIA NVENC",
        ));
        let prober = CapabilityProber::new(runner.clone());

        let profile = prober.detect().await;
        assert_eq!(profile, CapabilityProfile::Hardware(EncoderBackend::Nvenc));
        // First match stops probing
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_falls_through_to_later_backend() {
        let runner = Arc::new(EncoderListing::new(" V....D h264_videotoolbox VideoToolbox"));
        let prober = CapabilityProber::new(runner.clone());

        assert_eq!(
            prober.detect().await,
            CapabilityProfile::Hardware(EncoderBackend::VideoToolbox)
        );
        assert_eq!(runner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_a_match() {
        let mut listing = EncoderListing::new("h264_nvenc");
        listing.exit_code = 1;
        let prober = CapabilityProber::new(Arc::new(listing));
        assert_eq!(prober.detect().await, CapabilityProfile::NoneFound);
    }

    #[tokio::test]
    async fn test_timeouts_mean_none_found() {
        let prober = CapabilityProber::new(Arc::new(AlwaysTimesOut));
        assert_eq!(prober.detect().await, CapabilityProfile::NoneFound);
    }

    #[tokio::test]
    async fn test_check_toolchain() {
        let ok = EncoderListing::new("ffmpeg version 6.1");
        assert!(check_toolchain(&ok, DEFAULT_PROBE_TIMEOUT).await.is_ok());

        let mut broken = EncoderListing::new("");
        broken.exit_code = 127;
        assert!(check_toolchain(&broken, DEFAULT_PROBE_TIMEOUT).await.is_err());
    }
}
