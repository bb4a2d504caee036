//! Artifact store contract.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Durable object store for finished copies.
///
/// `put` returns the URL under which the object is reachable. Failures are
/// per-artifact; callers decide whether they are fatal.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, path: &Path, key: &str) -> StorageResult<String>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// MIME type for a video file, by extension.
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.mp4"), "video/mp4");
        assert_eq!(content_type_for("a.MOV"), "video/quicktime");
        assert_eq!(content_type_for("dir/a.avi"), "video/x-msvideo");
        assert_eq!(content_type_for("a.mkv"), "video/x-matroska");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }
}
