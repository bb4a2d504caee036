//! Single-copy transcode worker.
//!
//! One invocation = one source, one destination, one recipe. The outcome is
//! either success or a typed failure carrying the tail of the tool's
//! diagnostic stream.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};
use uniq_models::{EncoderBackend, TransformRecipe};

use crate::command::{FfmpegCommand, ProcessRunner};
use crate::error::{MediaError, MediaResult};

/// Generous default so large files can finish.
pub const DEFAULT_ENCODE_TIMEOUT: Duration = Duration::from_secs(600);

/// Lines kept from the end of the diagnostic stream.
const DIAGNOSTIC_TAIL_LINES: usize = 10;

/// Character cap on the captured diagnostics.
const DIAGNOSTIC_MAX_CHARS: usize = 1000;

/// Drives one hardware encode per call.
#[derive(Clone)]
pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    backend: EncoderBackend,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(runner: Arc<dyn ProcessRunner>, backend: EncoderBackend) -> Self {
        Self {
            runner,
            backend,
            timeout: DEFAULT_ENCODE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> EncoderBackend {
        self.backend
    }

    /// Build the encode invocation for one copy.
    ///
    /// Decoding stays on the CPU so the software noise/eq filters run
    /// before the frames reach the hardware encoder.
    pub fn build_command(
        &self,
        source: &Path,
        destination: &Path,
        recipe: &TransformRecipe,
    ) -> FfmpegCommand {
        FfmpegCommand::new(source, destination)
            .strip_metadata()
            .video_filter(recipe.filter_chain())
            .video_codec(self.backend.encoder())
            .output_args(self.backend.rate_control_args(recipe.bitrate_kbps))
            .copy_audio()
    }

    /// Encode `source` into `destination` using `recipe`.
    ///
    /// On failure the destination may or may not exist and must not be trusted.
    pub async fn encode(
        &self,
        source: &Path,
        destination: &Path,
        recipe: &TransformRecipe,
    ) -> MediaResult<()> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }

        let cmd = self.build_command(source, destination, recipe);
        let args = cmd.build_args();
        debug!(
            backend = %self.backend,
            bitrate_kbps = recipe.bitrate_kbps,
            "Encoding {} -> {}",
            source.display(),
            destination.display()
        );

        let started = Instant::now();
        let result = self.runner.run("ffmpeg", &args, self.timeout).await;
        let labels = [("backend", self.backend.as_str().to_string())];
        histogram!("uniq_encode_duration_seconds", &labels).record(started.elapsed().as_secs_f64());

        let output = match result {
            Ok(output) => output,
            Err(MediaError::ToolNotFound(_)) => return Err(MediaError::FfmpegNotFound),
            Err(e) => {
                counter!("uniq_encode_failures_total", &labels).increment(1);
                warn!(backend = %self.backend, "Encode of {} failed: {}", source.display(), e);
                return Err(e);
            }
        };

        if output.success() {
            info!(
                backend = %self.backend,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Encoded {}",
                destination.display()
            );
            return Ok(());
        }

        counter!("uniq_encode_failures_total", &labels).increment(1);
        let stream = if output.stderr.trim().is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        let tail = diagnostic_tail(stream);
        warn!(
            backend = %self.backend,
            exit_code = ?output.exit_code,
            "Encoder exited with failure: {}",
            tail
        );

        Err(MediaError::encode_failed(
            format!("{} exited with status {:?}", self.backend.encoder(), output.exit_code),
            Some(tail),
            output.exit_code,
        ))
    }
}

/// Keep the last lines of a diagnostic stream, capped in length.
///
/// The actionable error is usually printed last.
pub fn diagnostic_tail(stream: &str) -> String {
    let lines: Vec<&str> = stream.trim_end().lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    let tail = lines[start..].join("\n");
    tail.chars().take(DIAGNOSTIC_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProcessOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use uniq_models::ColorCorrection;

    struct Scripted {
        result: fn() -> MediaResult<ProcessOutput>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Scripted {
        fn new(result: fn() -> MediaResult<ProcessOutput>) -> Self {
            Self {
                result,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for Scripted {
        async fn run(&self, _: &str, args: &[String], _: Duration) -> MediaResult<ProcessOutput> {
            self.seen.lock().unwrap().push(args.to_vec());
            (self.result)()
        }
    }

    fn recipe() -> TransformRecipe {
        TransformRecipe {
            noise: 0.4,
            color: ColorCorrection::identity(),
            bitrate_kbps: 2400,
        }
    }

    fn source(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("src.mp4");
        std::fs::write(&path, b"fake").unwrap();
        path
    }

    #[test]
    fn test_build_command_shape() {
        let runner = Arc::new(Scripted::new(|| Ok(ProcessOutput::default())));
        let transcoder = Transcoder::new(runner, EncoderBackend::Amf);
        let args = transcoder
            .build_command(Path::new("in.mov"), Path::new("out.mov"), &recipe())
            .build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-map_metadata -1"));
        assert!(joined.contains("-c:v h264_amf"));
        assert!(joined.contains("-rc vbr_peak -b:v 2400k"));
        assert!(joined.contains("-c:a copy"));
        assert!(!joined.contains("scale="));

        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].starts_with("noise="));
    }

    #[tokio::test]
    async fn test_encode_success() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let runner = Arc::new(Scripted::new(|| {
            Ok(ProcessOutput {
                exit_code: Some(0),
                ..Default::default()
            })
        }));
        let transcoder = Transcoder::new(runner.clone(), EncoderBackend::Nvenc);

        transcoder
            .encode(&src, &dir.path().join("out.mp4"), &recipe())
            .await
            .unwrap();
        assert_eq!(runner.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_encode_failure_keeps_tail() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let runner = Arc::new(Scripted::new(|| {
            let noise: String = (0..30).map(|i| format!("line {}\n", i)).collect();
            Ok(ProcessOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("{}No NVENC capable devices found", noise),
            })
        }));
        let transcoder = Transcoder::new(runner, EncoderBackend::Nvenc);

        let err = transcoder
            .encode(&src, &dir.path().join("out.mp4"), &recipe())
            .await
            .unwrap_err();

        match err {
            MediaError::EncodeFailed { stderr, exit_code, .. } => {
                let tail = stderr.unwrap();
                assert_eq!(exit_code, Some(1));
                assert!(tail.ends_with("No NVENC capable devices found"));
                assert!(!tail.contains("line 5\n"));
                assert_eq!(tail.lines().count(), 10);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encode_timeout() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir);
        let runner = Arc::new(Scripted::new(|| Err(MediaError::Timeout(Duration::from_secs(600)))));
        let transcoder = Transcoder::new(runner, EncoderBackend::QuickSync);

        let err = transcoder
            .encode(&src, &dir.path().join("out.mp4"), &recipe())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let runner = Arc::new(Scripted::new(|| Ok(ProcessOutput::default())));
        let transcoder = Transcoder::new(runner.clone(), EncoderBackend::Nvenc);
        let err = transcoder
            .encode(Path::new("/nope/missing.mp4"), Path::new("/tmp/x.mp4"), &recipe())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_diagnostic_tail_caps_length() {
        let long = "x".repeat(5000);
        assert_eq!(diagnostic_tail(&long).len(), 1000);
        assert_eq!(diagnostic_tail("a\nb\n"), "a\nb");
    }
}
