//! Offline batch mode: one unique copy of every video under an input path.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use uniq_media::fs_utils::{ensure_dir, remove_if_exists};
use uniq_media::probe::DEFAULT_RESOLUTION_PROBE_TIMEOUT;
use uniq_media::{collect_videos, open_source, probe_resolution, RecipeGenerator, Transcoder};
use uniq_models::SUPPORTED_EXTENSIONS;

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::Pipeline;

pub const DEFAULT_INPUT_DIR: &str = "input";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_ERROR_LOG: &str = "uniqueizer.log";

/// Options for one offline run.
#[derive(Debug, Clone)]
pub struct OfflineOptions {
    /// File or directory to process
    pub input: PathBuf,
    /// Explicit output file; only honored when a single video is processed
    pub output: Option<PathBuf>,
    /// Destination directory when several videos are processed
    pub output_dir: PathBuf,
    /// Per-file failures are appended here
    pub error_log: PathBuf,
    /// Create `input` when it does not exist (default input directory)
    pub create_input: bool,
}

impl Default for OfflineOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT_DIR),
            output: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            create_input: true,
        }
    }
}

/// One file that could not be processed.
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub input: PathBuf,
    pub error: String,
}

/// What an offline run did.
#[derive(Debug, Clone, Default)]
pub struct OfflineSummary {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FailedFile>,
}

impl OfflineSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Where the copy of `input` goes.
///
/// A single video goes to `-o` when given, otherwise next to the input as
/// `{stem}_unique{ext}`. Several videos go to `output_dir` under their own name.
pub fn plan_output(input: &Path, total: usize, options: &OfflineOptions) -> PathBuf {
    let file_name = input.file_name().map(PathBuf::from).unwrap_or_default();

    if total == 1 {
        if let Some(output) = &options.output {
            return output.clone();
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = input
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        return parent.join(format!("{}_unique{}", stem, ext));
    }

    options.output_dir.join(file_name)
}

/// Process every supported video under `options.input`.
///
/// Fails only when the input cannot be resolved or holds no videos. Per-file
/// failures are logged to `options.error_log` and reported in the summary.
pub async fn run_offline(pipeline: &Pipeline, options: &OfflineOptions) -> WorkerResult<OfflineSummary> {
    if options.create_input && !options.input.exists() {
        ensure_dir(&options.input).await?;
        info!("Created input directory {}", options.input.display());
    }

    let videos = collect_videos(&options.input).await?;
    if videos.is_empty() {
        return Err(WorkerError::invalid_request(format!(
            "no videos found in {} (supported: {})",
            options.input.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    info!("Found {} video(s) in {}", videos.len(), options.input.display());

    remove_if_exists(&options.error_log).await;

    let transcoder = pipeline.transcoder();
    let mut summary = OfflineSummary::default();
    let total = videos.len();

    for (index, input) in videos.into_iter().enumerate() {
        let output = plan_output(&input, total, options);
        info!("[{}/{}] {}", index + 1, total, input.display());

        let result = if same_file(&input, &output).await {
            Err(WorkerError::invalid_request(format!(
                "output {} would overwrite the source",
                output.display()
            )))
        } else {
            process_one(pipeline, &transcoder, &input, &output).await
        };

        match result {
            Ok(()) => {
                info!("Wrote {}", output.display());
                summary.succeeded.push(output);
            }
            Err(e) => {
                let message = describe(&e);
                error!("Failed to process {}: {}", input.display(), message);
                if !same_file(&input, &output).await {
                    remove_if_exists(&output).await;
                }
                if let Err(log_err) = append_error(&options.error_log, &input, &message).await {
                    warn!("Could not write {}: {}", options.error_log.display(), log_err);
                }
                summary.failed.push(FailedFile {
                    input,
                    error: message,
                });
            }
        }
    }

    info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        "Offline run finished"
    );
    Ok(summary)
}

async fn process_one(
    pipeline: &Pipeline,
    transcoder: &Transcoder,
    input: &Path,
    output: &Path,
) -> WorkerResult<()> {
    let mut source = open_source(input).await?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let runner = pipeline.runner();
    match probe_resolution(runner.as_ref(), input, DEFAULT_RESOLUTION_PROBE_TIMEOUT).await {
        Ok(resolution) => source = source.with_resolution(resolution),
        Err(e) => warn!("Could not probe {}: {}", input.display(), e),
    }

    let recipe = RecipeGenerator::new().generate(source.resolution, source.size_bytes);
    transcoder.encode(&source.path, output, &recipe).await?;
    Ok(())
}

/// Whether `output` names the same file as `input`, after resolving links and `..`.
async fn same_file(input: &Path, output: &Path) -> bool {
    let Ok(input) = fs::canonicalize(input).await else {
        return false;
    };
    if let Ok(output) = fs::canonicalize(output).await {
        return input == output;
    }
    // A missing output can only collide through its parent directory.
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent).await, output.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name) == input,
        _ => false,
    }
}

/// Error text including the encoder's diagnostic tail, when there is one.
fn describe(e: &WorkerError) -> String {
    match e {
        WorkerError::Media(media) => match media.diagnostics() {
            Some(tail) if !tail.is_empty() => format!("{}\n{}", media, tail),
            _ => media.to_string(),
        },
        other => other.to_string(),
    }
}

async fn append_error(log: &Path, input: &Path, message: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .await?;
    let line = format!(
        "{} Failed to process {}: {}\n",
        Utc::now().to_rfc3339(),
        input.display(),
        message
    );
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use uniq_media::{MediaError, MediaResult, ProcessOutput, ProcessRunner};
    use uniq_models::EncoderBackend;

    /// Writes the output of every encode whose input name does not contain "broken".
    struct FakeFfmpeg;

    #[async_trait]
    impl ProcessRunner for FakeFfmpeg {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            _timeout: Duration,
        ) -> MediaResult<ProcessOutput> {
            if program == "ffprobe" {
                return Ok(ProcessOutput {
                    exit_code: Some(0),
                    stdout: r#"{"streams":[{"width":640,"height":360}]}"#.to_string(),
                    stderr: String::new(),
                });
            }
            if args.iter().any(|a| a.contains("broken")) {
                return Ok(ProcessOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }
            let output = args
                .last()
                .ok_or_else(|| MediaError::InvalidVideo("no output".into()))?;
            tokio::fs::write(output, b"unique").await?;
            Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::with_backend(
            Arc::new(FakeFfmpeg),
            EncoderBackend::VideoToolbox,
            crate::config::WorkerConfig::default(),
        )
    }

    fn options(dir: &TempDir, input: PathBuf) -> OfflineOptions {
        OfflineOptions {
            input,
            output: None,
            output_dir: dir.path().join("out"),
            error_log: dir.path().join("uniqueizer.log"),
            create_input: false,
        }
    }

    #[test]
    fn test_plan_output_single_file() {
        let opts = OfflineOptions::default();
        assert_eq!(
            plan_output(Path::new("clips/holiday.MOV"), 1, &opts),
            PathBuf::from("clips/holiday_unique.MOV")
        );

        let opts = OfflineOptions {
            output: Some(PathBuf::from("done/final.mp4")),
            ..OfflineOptions::default()
        };
        assert_eq!(
            plan_output(Path::new("clips/holiday.mov"), 1, &opts),
            PathBuf::from("done/final.mp4")
        );
    }

    #[test]
    fn test_plan_output_many_files_ignores_explicit_output() {
        let opts = OfflineOptions {
            output: Some(PathBuf::from("done/final.mp4")),
            ..OfflineOptions::default()
        };
        assert_eq!(
            plan_output(Path::new("input/a.mp4"), 3, &opts),
            PathBuf::from("output/a.mp4")
        );
    }

    #[tokio::test]
    async fn test_run_directory_with_one_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        for name in ["a.mp4", "broken.mkv", "c.avi", "readme.txt"] {
            std::fs::write(input.join(name), b"frames").unwrap();
        }
        let opts = options(&dir, input);

        let summary = run_offline(&pipeline(), &opts).await.unwrap();

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.succeeded.len(), 2);
        assert!(opts.output_dir.join("a.mp4").exists());
        assert!(opts.output_dir.join("c.avi").exists());
        assert!(!opts.output_dir.join("broken.mkv").exists());

        let log = std::fs::read_to_string(&opts.error_log).unwrap();
        assert!(log.contains("broken.mkv"));
        assert!(log.contains("Invalid data found"));
    }

    #[tokio::test]
    async fn test_run_single_file_writes_alongside() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"frames").unwrap();

        let summary = run_offline(&pipeline(), &options(&dir, input)).await.unwrap();

        assert_eq!(summary.succeeded, vec![dir.path().join("clip_unique.mp4")]);
        assert!(dir.path().join("clip_unique.mp4").exists());
    }

    #[tokio::test]
    async fn test_output_naming_the_source_keeps_the_source() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"frames").unwrap();
        let mut opts = options(&dir, input.clone());
        opts.output = Some(dir.path().join("sub/../clip.mp4"));
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let summary = run_offline(&pipeline(), &opts).await.unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(std::fs::read(&input).unwrap(), b"frames");
        let log = std::fs::read_to_string(&opts.error_log).unwrap();
        assert!(log.contains("would overwrite the source"));
    }

    #[tokio::test]
    async fn test_output_dir_equal_to_input_dir_keeps_sources() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        for name in ["a.mp4", "b.mov"] {
            std::fs::write(input.join(name), b"frames").unwrap();
        }
        let mut opts = options(&dir, input.clone());
        opts.output_dir = input.clone();

        let summary = run_offline(&pipeline(), &opts).await.unwrap();

        assert_eq!(summary.failed.len(), 2);
        assert_eq!(std::fs::read(input.join("a.mp4")).unwrap(), b"frames");
        assert_eq!(std::fs::read(input.join("b.mov")).unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_empty_default_input_is_created_and_rejected() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(&dir, dir.path().join("input"));
        opts.create_input = true;

        let err = run_offline(&pipeline(), &opts).await.unwrap_err();

        assert!(matches!(err, WorkerError::InvalidRequest(_)));
        assert!(opts.input.is_dir());
    }

    #[tokio::test]
    async fn test_missing_input_path() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, dir.path().join("nope.mp4"));

        let err = run_offline(&pipeline(), &opts).await.unwrap_err();

        assert!(matches!(err, WorkerError::Media(MediaError::FileNotFound(_))));
    }
}
