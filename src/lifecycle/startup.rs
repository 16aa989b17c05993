//! Startup checks.
//!
//! Any failure here is fatal: the service refuses to start rather than
//! accept uploads it cannot store.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("upload directory {0:?} does not exist")]
    MissingUploadDir(PathBuf),

    #[error("upload path {0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("upload directory {path:?} is not accessible: {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload directory {0:?} is read-only")]
    ReadOnly(PathBuf),
}

/// Check that the configured upload directory exists and is writable.
///
/// The directory is never created here; it belongs to the operator.
pub fn ensure_upload_dir(path: &Path) -> Result<(), StartupError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StartupError::MissingUploadDir(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StartupError::Inaccessible {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.is_dir() {
        return Err(StartupError::NotADirectory(path.to_path_buf()));
    }
    if metadata.permissions().readonly() {
        return Err(StartupError::ReadOnly(path.to_path_buf()));
    }

    tracing::debug!(path = ?path, "Upload directory ready");
    Ok(())
}
