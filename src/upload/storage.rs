//! Durable writes into the upload directory.
//!
//! Bytes land in a hidden `.<uuid>.part` file first. Only a fully written,
//! synced file is published under its final name, via a hard link that
//! refuses to replace an existing entry. Filesystems without hard links get
//! an exclusive placeholder under the final name that the temp file is then
//! renamed over. Until then a drop guard owns the temp file, so a failed or
//! abandoned upload leaves nothing behind.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::UploadError;

/// Longest name accepted by most filesystems.
const MAX_FILENAME_BYTES: usize = 255;

/// A file published in the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Name relative to the upload directory.
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Writes uploads into one fixed directory.
#[derive(Debug, Clone)]
pub struct StorageWriter {
    dir: PathBuf,
}

impl StorageWriter {
    /// The directory must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stream `chunks` into a temp file destined for `safe_name`.
    ///
    /// The first error from `chunks` aborts the write and is returned as-is.
    /// Call [`PendingFile::commit`] to publish.
    pub async fn write<S>(&self, safe_name: &str, chunks: S) -> Result<PendingFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, UploadError>>,
    {
        ensure_safe_name(safe_name)?;

        let temp = self.dir.join(format!(".{}.part", Uuid::new_v4()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .await?;

        let mut pending = PendingFile {
            temp,
            target: self.dir.join(safe_name),
            filename: safe_name.to_owned(),
            size: 0,
            armed: true,
        };

        let mut chunks = std::pin::pin!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            pending.size += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!(temp = ?pending.temp, size = pending.size, "Upload staged");
        Ok(pending)
    }
}

/// A fully written upload that has not been published yet.
///
/// Dropping it removes the temp file.
#[derive(Debug)]
pub struct PendingFile {
    temp: PathBuf,
    target: PathBuf,
    filename: String,
    size: u64,
    armed: bool,
}

impl PendingFile {
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Publish under the final name. Fails rather than overwrite.
    pub async fn commit(mut self) -> Result<StoredFile, UploadError> {
        match tokio::fs::hard_link(&self.temp, &self.target).await {
            Ok(()) => {
                self.armed = false;
                if let Err(e) = tokio::fs::remove_file(&self.temp).await {
                    tracing::warn!(temp = ?self.temp, error = %e, "Failed to remove staged upload after publishing");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Hard link unavailable, publishing by rename");
                publish_by_rename(&self.temp, &self.target).await?;
                self.armed = false;
            }
        }

        Ok(StoredFile {
            filename: std::mem::take(&mut self.filename),
            path: std::mem::take(&mut self.target),
            size: self.size,
        })
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.temp) {
            Ok(()) => tracing::debug!(temp = ?self.temp, "Discarded partial upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(temp = ?self.temp, error = %e, "Failed to discard partial upload"),
        }
    }
}

/// Reserve `target` with `create_new`, then move `temp` over the placeholder.
///
/// The placeholder is removed again if the rename fails.
async fn publish_by_rename(temp: &Path, target: &Path) -> io::Result<()> {
    OpenOptions::new().write(true).create_new(true).open(target).await?;
    if let Err(e) = tokio::fs::rename(temp, target).await {
        if let Err(cleanup) = tokio::fs::remove_file(target).await {
            tracing::warn!(target = ?target, error = %cleanup, "Failed to remove publish placeholder");
        }
        return Err(e);
    }
    Ok(())
}

/// Refuse anything that could resolve outside the upload directory or
/// collide with temp files.
fn ensure_safe_name(name: &str) -> Result<(), UploadError> {
    let charset_ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if name.is_empty() || name.len() > MAX_FILENAME_BYTES || name.starts_with('.') || !charset_ok {
        return Err(UploadError::Internal(format!("refusing unsafe storage name {name:?}")));
    }
    Ok(())
}
