//! Error types for provenance logging

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during audit operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to create log file
    #[error("Failed to create log file: {path}")]
    CreateFailed { path: PathBuf },

    /// Log entry is invalid or corrupted
    #[error("Invalid log entry at line {line}: {reason}")]
    InvalidEntry { line: usize, reason: String },
}

impl Error {
    /// Create a create failed error
    pub fn create_failed<P: Into<PathBuf>>(path: P) -> Self {
        Error::CreateFailed { path: path.into() }
    }
}
