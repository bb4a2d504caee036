//! Input discovery.

use std::path::{Path, PathBuf};

use tokio::fs;
use uniq_models::{is_supported_extension, SourceVideo};

use crate::error::{MediaError, MediaResult};

/// Resolve an input path (file or directory) to the list of videos to process.
///
/// Directories are scanned one level deep and the result is sorted. A single
/// file with an unsupported extension is an error rather than being skipped.
pub async fn collect_videos(input: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let input = input.as_ref();

    let metadata = fs::metadata(input)
        .await
        .map_err(|_| MediaError::FileNotFound(input.to_path_buf()))?;

    if metadata.is_file() {
        if is_supported_extension(input) {
            return Ok(vec![input.to_path_buf()]);
        }
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        return Err(MediaError::UnsupportedFormat(ext));
    }

    let mut videos = Vec::new();
    let mut entries = fs::read_dir(input).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_supported_extension(&path) {
            videos.push(path);
        }
    }

    videos.sort();
    Ok(videos)
}

/// Stat a file and wrap it as a [`SourceVideo`].
pub async fn open_source(path: impl AsRef<Path>) -> MediaResult<SourceVideo> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;

    if !metadata.is_file() {
        return Err(MediaError::InvalidVideo(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }

    Ok(SourceVideo::new(path, metadata.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collect_from_directory() {
        let dir = TempDir::new().unwrap();
        for name in ["b.MP4", "a.mov", "notes.txt", "c.mkv"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let videos = collect_videos(dir.path()).await.unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mov", "b.MP4", "c.mkv"]);
    }

    #[tokio::test]
    async fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.avi");
        std::fs::write(&video, b"x").unwrap();
        assert_eq!(collect_videos(&video).await.unwrap(), vec![video]);

        let text = dir.path().join("clip.txt");
        std::fs::write(&text, b"x").unwrap();
        assert!(matches!(
            collect_videos(&text).await,
            Err(MediaError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_input() {
        assert!(matches!(
            collect_videos("/definitely/not/here").await,
            Err(MediaError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_source_reads_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let source = open_source(&path).await.unwrap();
        assert_eq!(source.size_bytes, 2048);
        assert_eq!(source.extension(), ".mp4");
    }
}
