//! Error types for tag-file and manifest codecs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding bag tag files
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document failed validation
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Checksum algorithm is not one we can compute
    #[error("Unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// File name is not a manifest or tag manifest
    #[error("Not a manifest file name: {0}")]
    NotAManifest(String),

    /// Bag name does not follow the package naming grammar
    #[error("Invalid bag name: {0}")]
    InvalidBagName(String),

    /// Schema document could not be compiled
    #[error("Invalid schema {path}: {message}")]
    InvalidSchema { path: PathBuf, message: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error with a message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Error::MissingField {
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = Error::validation("test message");
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.to_string(), "Validation error: test message");
    }

    #[test]
    fn test_unsupported_algorithm() {
        let err = Error::UnsupportedAlgorithm("md4".to_string());
        assert_eq!(err.to_string(), "Unsupported checksum algorithm: md4");
    }

    #[test]
    fn test_missing_field_error() {
        let err = Error::missing_field("BagIt-Version");
        assert!(err.to_string().contains("BagIt-Version"));
    }
}
