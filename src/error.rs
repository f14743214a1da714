//! Error taxonomy for the integrity engine
//!
//! Only configuration and I/O problems outside a batch propagate as `Err`.
//! Everything that can go wrong for a single file during a batch is captured
//! as a [`FileError`] record and returned next to the successes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur across the engine
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Referenced file is absent: {0}")]
    MissingSource(String),

    #[error("Destination already exists: {}", .0.display())]
    MoveConflict(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Path escapes the repository: {0}")]
    InvalidPath(String),

    #[error("Ledger at {path} is unreadable: {reason}")]
    LedgerUnreadable { path: PathBuf, reason: String },

    #[error("Trace of {entrypoint} timed out after {timeout_secs}s")]
    TraceTimeout { entrypoint: String, timeout_secs: u64 },

    #[error("Sandbox blocked {operation} in {entrypoint}")]
    SandboxViolation { entrypoint: String, operation: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Classification of a per-file failure inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    MissingSource,
    MoveConflict,
    PermissionDenied,
    InvalidPath,
    Io,
}

/// A per-file failure recorded during `apply`/`restore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(file: impl Into<String>, err: &IntegrityError) -> Self {
        let kind = match err {
            IntegrityError::MissingSource(_) => FileErrorKind::MissingSource,
            IntegrityError::MoveConflict(_) => FileErrorKind::MoveConflict,
            IntegrityError::PermissionDenied(_) => FileErrorKind::PermissionDenied,
            IntegrityError::InvalidPath(_) => FileErrorKind::InvalidPath,
            IntegrityError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                FileErrorKind::PermissionDenied
            }
            _ => FileErrorKind::Io,
        };
        Self {
            file: file.into(),
            kind,
            message: err.to_string(),
        }
    }
}
