//! Serializer: bag directory to archive file plus detached digest
//!
//! Archive creation is delegated to an external `zip` or `7z` executable run
//! in the bag's parent directory, so the archive holds a single top-level
//! directory named after the bag. The digest is written beside the archive
//! as `<archive>.<algorithm>`.

use crate::bag::Bag;
use crate::config::{ArchiveFormat, SerializerConfig};
use crate::core::checksum::calculate_checksum;
use crate::error::{PreservError, Result};
use preserv_core_manifest::Algorithm;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// A finished archive and its digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub archive: PathBuf,
    pub digest_file: PathBuf,
    pub algorithm: Algorithm,
    pub digest: String,
    pub size: u64,
}

/// Location of the detached digest for `archive`
pub fn digest_file_path(archive: &Path, algorithm: Algorithm) -> PathBuf {
    let mut name: OsString = archive.as_os_str().to_owned();
    name.push(".");
    name.push(algorithm.as_str());
    PathBuf::from(name)
}

/// Hash `archive` and write its detached digest file
pub fn write_digest_file(archive: &Path, algorithm: Algorithm) -> Result<(PathBuf, String)> {
    let digest = calculate_checksum(archive, algorithm)?;
    let path = digest_file_path(archive, algorithm);
    crate::bag::write::write_atomic(&path, digest.as_bytes())?;
    Ok((path, digest))
}

/// Recompute the digest of `archive` and compare it with its digest file
pub fn verify_archive(archive: &Path, algorithm: Algorithm) -> Result<String> {
    let recorded = std::fs::read_to_string(digest_file_path(archive, algorithm))?;
    let expected = recorded
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let actual = calculate_checksum(archive, algorithm)?;
    if actual != expected {
        warn!(archive = %archive.display(), "archive digest mismatch");
        return Err(PreservError::CorruptedArchive {
            archive: archive.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(actual)
}

/// Produces distributable archives from finished bags
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    config: SerializerConfig,
}

impl Serializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// `<bag-name>.<ext>`
    pub fn archive_name(&self, bag: &Bag) -> String {
        format!("{}.{}", bag.name(), self.config.format.extension())
    }

    fn executable(&self) -> PathBuf {
        self.config
            .executable
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.config.format.default_executable()))
    }

    /// Archive `bag` into `dest_dir` and write the detached digest
    pub fn serialize(&self, bag: &Bag, dest_dir: &Path) -> Result<ArchiveArtifact> {
        let parent = bag.root().parent().ok_or_else(|| {
            PreservError::Serialization(format!(
                "bag {} has no parent directory",
                bag.root().display()
            ))
        })?;
        std::fs::create_dir_all(dest_dir)?;
        let archive = std::path::absolute(dest_dir.join(self.archive_name(bag)))?;
        if archive.exists() {
            std::fs::remove_file(&archive)?;
        }

        let exe = self.executable();
        let mut command = Command::new(&exe);
        match self.config.format {
            ArchiveFormat::Zip => command.arg("-qr").arg(&archive).arg(bag.name()),
            ArchiveFormat::SevenZip => command
                .arg("a")
                .arg("-t7z")
                .arg(&archive)
                .arg(bag.name()),
        };
        command.current_dir(parent);
        debug!(command = ?command, "running archiver");

        let output = command.output().map_err(|e| {
            PreservError::Serialization(format!(
                "failed to run archiver {}: {}",
                exe.display(),
                e
            ))
        })?;
        if !output.status.success() {
            return Err(PreservError::Serialization(format!(
                "{} exited with {}: {}",
                exe.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !archive.is_file() {
            return Err(PreservError::Serialization(format!(
                "{} reported success but produced no {}",
                exe.display(),
                archive.display()
            )));
        }

        let algorithm = self.config.digest_algorithm;
        let (digest_file, digest) = write_digest_file(&archive, algorithm)?;
        let size = std::fs::metadata(&archive)?.len();
        info!(
            bag = %bag.name(),
            archive = %archive.display(),
            bytes = size,
            "bag serialized"
        );
        Ok(ArchiveArtifact {
            archive,
            digest_file,
            algorithm,
            digest,
            size,
        })
    }
}
