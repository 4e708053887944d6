/*!
 * Error types for preserv
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PreservError>;

/// One path whose recorded digest disagrees with its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for DigestMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

#[derive(Debug)]
pub enum PreservError {
    /// Bag root directory does not exist
    BagNotFound(PathBuf),

    /// Relative path is absolute, empty or escapes its tree
    InvalidPath(String),

    /// I/O error
    Io(io::Error),

    /// I/O error while moving content between two locations
    Transfer {
        source: PathBuf,
        dest: PathBuf,
        error: io::Error,
    },

    /// Invalid or self-contradictory configuration
    Config(String),

    /// Metadata lookup or update targeting an unknown path
    ComponentNotFound(String),

    /// Recorded digests disagree with content
    ChecksumMismatch { mismatches: Vec<DigestMismatch> },

    /// Post-split completeness failure with every offending path
    IncompleteSplit {
        missing: Vec<String>,
        duplicated: Vec<String>,
        mismatched: Vec<String>,
    },

    /// A descriptive record could not be read or written
    MalformedRecord { path: String, message: String },

    /// External archiving step failed
    Serialization(String),

    /// Archive digest does not match its detached digest file
    CorruptedArchive {
        archive: PathBuf,
        expected: String,
        actual: String,
    },

    /// Tag-file or manifest codec error
    Format(preserv_core_manifest::Error),

    /// Provenance log error
    Provenance(preserv_core_audit::Error),

    /// Generic error with message
    Other(String),
}

impl PreservError {
    /// Check if this error is fatal (the bag is not usable as-is)
    pub fn is_fatal(&self) -> bool {
        match self {
            PreservError::BagNotFound(_) => true,
            PreservError::InvalidPath(_) => true,
            PreservError::Config(_) => true,
            PreservError::ChecksumMismatch { .. } => true,
            PreservError::IncompleteSplit { .. } => true,
            PreservError::CorruptedArchive { .. } => true,

            PreservError::Io(_) => false,
            PreservError::Transfer { .. } => false,
            PreservError::ComponentNotFound(_) => false,
            PreservError::MalformedRecord { .. } => false,
            PreservError::Serialization(_) => false,
            PreservError::Format(_) => false,
            PreservError::Provenance(_) => false,
            PreservError::Other(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            PreservError::BagNotFound(_) | PreservError::InvalidPath(_) => ErrorCategory::Structure,
            PreservError::Io(_) | PreservError::Transfer { .. } => ErrorCategory::IoError,
            PreservError::Config(_) => ErrorCategory::Configuration,
            PreservError::ComponentNotFound(_) | PreservError::MalformedRecord { .. } => {
                ErrorCategory::Metadata
            }
            PreservError::ChecksumMismatch { .. } | PreservError::CorruptedArchive { .. } => {
                ErrorCategory::Integrity
            }
            PreservError::IncompleteSplit { .. } => ErrorCategory::Completeness,
            PreservError::Serialization(_) => ErrorCategory::Serialization,
            PreservError::Format(_) => ErrorCategory::Format,
            PreservError::Provenance(_) => ErrorCategory::Audit,
            PreservError::Other(_) => ErrorCategory::Unknown,
        }
    }

    pub(crate) fn transfer(source: &std::path::Path, dest: &std::path::Path, error: io::Error) -> Self {
        PreservError::Transfer {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            error,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing bag root or unusable paths
    Structure,
    /// I/O operation errors
    IoError,
    /// Configuration errors
    Configuration,
    /// Descriptive record errors
    Metadata,
    /// Data integrity errors (checksums)
    Integrity,
    /// Split series missing or duplicating content
    Completeness,
    /// External archiver errors
    Serialization,
    /// Tag-file syntax errors
    Format,
    /// Provenance logging errors
    Audit,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Structure => write!(f, "structure"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Metadata => write!(f, "metadata"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Completeness => write!(f, "completeness"),
            ErrorCategory::Serialization => write!(f, "serialization"),
            ErrorCategory::Format => write!(f, "format"),
            ErrorCategory::Audit => write!(f, "audit"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for PreservError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreservError::BagNotFound(path) => {
                write!(f, "Bag not found: {}", path.display())
            }
            PreservError::InvalidPath(path) => {
                write!(f, "Invalid path: {}", path)
            }
            PreservError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            PreservError::Transfer {
                source,
                dest,
                error,
            } => {
                write!(
                    f,
                    "I/O error placing {} at {}: {}",
                    source.display(),
                    dest.display(),
                    error
                )
            }
            PreservError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            PreservError::ComponentNotFound(path) => {
                write!(f, "Component not found: {}", path)
            }
            PreservError::ChecksumMismatch { mismatches } => {
                write!(f, "Checksum verification failed for {} file(s)", mismatches.len())?;
                for m in mismatches {
                    write!(f, "\n  {}", m)?;
                }
                Ok(())
            }
            PreservError::IncompleteSplit {
                missing,
                duplicated,
                mismatched,
            } => {
                write!(
                    f,
                    "Incomplete split: {} missing, {} duplicated, {} with differing checksums",
                    missing.len(),
                    duplicated.len(),
                    mismatched.len()
                )?;
                for p in missing {
                    write!(f, "\n  missing: {}", p)?;
                }
                for p in duplicated {
                    write!(f, "\n  duplicated: {}", p)?;
                }
                for p in mismatched {
                    write!(f, "\n  checksum differs: {}", p)?;
                }
                Ok(())
            }
            PreservError::MalformedRecord { path, message } => {
                write!(f, "Malformed record for '{}': {}", path, message)
            }
            PreservError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            PreservError::CorruptedArchive {
                archive,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Corrupted archive {}: expected {}, got {}",
                    archive.display(),
                    expected,
                    actual
                )
            }
            PreservError::Format(err) => {
                write!(f, "Format error: {}", err)
            }
            PreservError::Provenance(err) => {
                write!(f, "Provenance log error: {}", err)
            }
            PreservError::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for PreservError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreservError::Io(err) => Some(err),
            PreservError::Transfer { error, .. } => Some(error),
            PreservError::Format(err) => Some(err),
            PreservError::Provenance(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PreservError {
    fn from(err: io::Error) -> Self {
        PreservError::Io(err)
    }
}

impl From<serde_json::Error> for PreservError {
    fn from(err: serde_json::Error) -> Self {
        PreservError::Other(format!("JSON error: {}", err))
    }
}

impl From<walkdir::Error> for PreservError {
    fn from(err: walkdir::Error) -> Self {
        let message = err.to_string();
        match err.into_io_error() {
            Some(io_err) => PreservError::Io(io_err),
            None => PreservError::Other(message),
        }
    }
}

impl From<preserv_core_manifest::Error> for PreservError {
    fn from(err: preserv_core_manifest::Error) -> Self {
        PreservError::Format(err)
    }
}

impl From<preserv_core_audit::Error> for PreservError {
    fn from(err: preserv_core_audit::Error) -> Self {
        PreservError::Provenance(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(PreservError::BagNotFound(PathBuf::from("/tmp/none")).is_fatal());
        assert!(PreservError::Config("test".to_string()).is_fatal());
        assert!(PreservError::IncompleteSplit {
            missing: vec!["data/a".to_string()],
            duplicated: vec![],
            mismatched: vec![],
        }
        .is_fatal());
    }

    #[test]
    fn test_non_fatal_errors() {
        assert!(!PreservError::Io(io::Error::other("test")).is_fatal());
        assert!(!PreservError::ComponentNotFound("a".to_string()).is_fatal());
        assert!(!PreservError::Serialization("zip".to_string()).is_fatal());
        assert!(!PreservError::Other("test".to_string()).is_fatal());
    }

    #[test]
    fn test_checksum_mismatch_display_lists_paths() {
        let err = PreservError::ChecksumMismatch {
            mismatches: vec![DigestMismatch {
                path: "data/a.txt".to_string(),
                expected: "abc123".to_string(),
                actual: "def456".to_string(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "Checksum verification failed for 1 file(s)\n  data/a.txt: expected abc123, got def456"
        );
        assert_eq!(err.category(), ErrorCategory::Integrity);
    }

    #[test]
    fn test_incomplete_split_display() {
        let err = PreservError::IncompleteSplit {
            missing: vec!["data/a".to_string()],
            duplicated: vec!["data/b".to_string()],
            mismatched: vec![],
        };
        let text = err.to_string();
        assert!(text.contains("1 missing, 1 duplicated, 0 with differing checksums"));
        assert!(text.contains("missing: data/a"));
        assert!(text.contains("duplicated: data/b"));
    }

    #[test]
    fn test_transfer_names_both_paths() {
        let err = PreservError::transfer(
            std::path::Path::new("/src/a.bin"),
            std::path::Path::new("/bag/data/a.bin"),
            io::Error::other("cross-device link"),
        );
        let text = err.to_string();
        assert!(text.contains("/src/a.bin"));
        assert!(text.contains("/bag/data/a.bin"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_codec_errors_convert() {
        let err: PreservError =
            preserv_core_manifest::Error::UnsupportedAlgorithm("md5".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Format);
        assert_eq!(err.category().to_string(), "format");
    }
}
