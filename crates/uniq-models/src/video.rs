//! Source video models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Container extensions the pipeline accepts (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

/// Check whether a path has a supported container extension.
pub fn is_supported_extension(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A video file selected as input to an encode round.
///
/// Identity is the filesystem path. The file is only ever read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceVideo {
    /// Path on local disk
    pub path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
    /// Probed frame size, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl SourceVideo {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            resolution: None,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Extension including the leading dot, as written on disk (e.g. `.MP4`).
    /// Empty when the file has no extension.
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }

    /// File name for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Dotted extension of a path, empty if none.
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_extension("clip.mp4"));
        assert!(is_supported_extension("clip.MOV"));
        assert!(is_supported_extension("/a/b/clip.Mkv"));
        assert!(!is_supported_extension("clip.webm"));
        assert!(!is_supported_extension("clip"));
    }

    #[test]
    fn test_extension_preserves_case() {
        let video = SourceVideo::new("/tmp/Clip.MP4", 10);
        assert_eq!(video.extension(), ".MP4");
        assert_eq!(SourceVideo::new("/tmp/noext", 1).extension(), "");
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::new(1920, 1080).to_string(), "1920x1080");
    }
}
