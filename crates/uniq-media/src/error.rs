//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Executable not found: {0}")]
    ToolNotFound(String),

    #[error("Encode failed: {message}")]
    EncodeFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl MediaError {
    /// Create an encode failure error.
    pub fn encode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::EncodeFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Captured diagnostic tail, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            MediaError::EncodeFailed { stderr, .. } | MediaError::FfprobeFailed { stderr, .. } => {
                stderr.as_deref()
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MediaError::Timeout(_))
    }

    /// Missing toolchain binaries are not worth retrying.
    pub fn is_missing_tool(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound | MediaError::ToolNotFound(_)
        )
    }

    /// The input itself is missing or unusable.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            MediaError::FileNotFound(_) | MediaError::InvalidVideo(_) | MediaError::UnsupportedFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_reports_sub_second_bounds() {
        let err = MediaError::Timeout(Duration::from_millis(200));
        assert_eq!(err.to_string(), "Operation timed out after 200ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_bad_input_classification() {
        assert!(MediaError::FileNotFound(PathBuf::from("gone.mp4")).is_bad_input());
        assert!(MediaError::UnsupportedFormat("gif".into()).is_bad_input());
        assert!(!MediaError::Timeout(Duration::from_secs(1)).is_bad_input());
        assert!(!MediaError::encode_failed("exit 1", None, Some(1)).is_bad_input());
    }
}
