//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Batch produced {produced} of {requested} copies")]
    BatchShortfall { requested: usize, produced: usize },

    #[error("Retries exhausted after {produced} of {target} copies")]
    ExhaustedRetries {
        produced: usize,
        target: usize,
        urls: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] uniq_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] uniq_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    pub fn batch_shortfall(requested: usize, produced: usize) -> Self {
        Self::BatchShortfall { requested, produced }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Check if a failed batch call is worth repeating.
    ///
    /// Missing tools, bad input and configuration problems will not go away
    /// on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::BatchShortfall { .. } | WorkerError::Storage(_) | WorkerError::Io(_) => true,
            WorkerError::Media(e) => !e.is_missing_tool() && !e.is_bad_input(),
            _ => false,
        }
    }

    /// URLs that were delivered before the job gave up, if any.
    pub fn partial_urls(&self) -> &[String] {
        match self {
            WorkerError::ExhaustedRetries { urls, .. } => urls,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(WorkerError::batch_shortfall(5, 0).is_retryable());
        assert_eq!(
            WorkerError::batch_shortfall(5, 0).to_string(),
            "Batch produced 0 of 5 copies"
        );
        assert!(!WorkerError::initialization("no gpu").is_retryable());
        assert!(!WorkerError::Media(uniq_media::MediaError::FfmpegNotFound).is_retryable());
        assert!(WorkerError::Media(uniq_media::MediaError::Timeout(
            std::time::Duration::from_secs(600)
        ))
        .is_retryable());
        assert!(!WorkerError::Media(uniq_media::MediaError::FileNotFound(
            std::path::PathBuf::from("seed.mp4")
        ))
        .is_retryable());
    }

    #[test]
    fn test_exhausted_carries_urls() {
        let err = WorkerError::ExhaustedRetries {
            produced: 1,
            target: 3,
            urls: vec!["https://s3/videos/a.mp4".into()],
        };
        assert_eq!(err.to_string(), "Retries exhausted after 1 of 3 copies");
        assert_eq!(err.partial_urls().len(), 1);
        assert!(WorkerError::invalid_request("x").partial_urls().is_empty());
    }
}
