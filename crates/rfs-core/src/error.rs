//! Error types for rfs

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the filesystem primitives
#[derive(Error, Debug)]
pub enum RfsError {
    #[error("Malformed resource identifier: {0}")]
    Decode(String),

    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RfsError {
    /// Classify an IO error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => RfsError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => RfsError::PermissionDenied(path.to_path_buf()),
            _ => RfsError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, RfsError>;
