//! Filesystem helpers for temporary encode outputs.
//!
//! Every intermediate file the pipeline creates is removed through these
//! helpers so cleanup failures are logged in one place instead of aborting
//! the caller.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use uniq_models::extension_of;

use crate::error::{MediaError, MediaResult};

/// Create a directory (and parents) if it does not exist yet.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
    }
    Ok(())
}

/// Fresh path inside `dir` named `{prefix}_{uuid}{ext}`.
pub fn unique_path(dir: impl AsRef<Path>, prefix: &str, extension: &str) -> PathBuf {
    dir.as_ref()
        .join(format!("{}_{}{}", prefix, Uuid::new_v4(), extension))
}

/// Copy `src` into `dir` under a fresh name, keeping its extension.
///
/// Used to set a batch output aside before the upload step consumes it.
pub async fn copy_aside(
    src: impl AsRef<Path>,
    dir: impl AsRef<Path>,
    prefix: &str,
) -> MediaResult<PathBuf> {
    let src = src.as_ref();
    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    ensure_dir(&dir).await?;
    let dst = unique_path(dir, prefix, &extension_of(src));

    fs::copy(src, &dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy {} -> {}: {}",
            src.display(),
            dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    Ok(dst)
}

/// Remove a file if present. Returns whether a file was deleted.
///
/// Best effort: failures are logged, never returned.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Delete every entry in `dir`, keeping the directory itself.
///
/// Returns the number of entries removed. Entries that cannot be removed
/// are logged and skipped.
pub async fn clear_dir(dir: impl AsRef<Path>) -> MediaResult<usize> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) => tracing::error!("Failed to remove {}: {}", path.display(), e),
        }
    }

    tracing::info!("Cleared {} entries from {}", removed, dir.display());
    Ok(removed)
}
