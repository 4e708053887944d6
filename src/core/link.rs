/*!
 * Verified placement of files by hardlink or copy.
 *
 * Content is first staged next to its destination, re-read and re-hashed,
 * and only renamed into place when the digests match the source. A failure
 * at any step leaves whatever was at the destination untouched.
 */

use super::checksum::{calculate_checksums, FileDigests};
use crate::error::{DigestMismatch, PreservError, Result};
use preserv_core_manifest::Algorithm;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a file reached its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceMethod {
    Hardlink,
    Copy,
}

impl PlaceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceMethod::Hardlink => "hardlink",
            PlaceMethod::Copy => "copy",
        }
    }
}

/// Options for [`place_verified`]
#[derive(Debug, Clone, Copy)]
pub struct PlaceOptions {
    /// Try a hardlink before copying
    pub link: bool,
    /// Copy when the hardlink fails
    pub copy_on_link_failure: bool,
}

/// Outcome of a verified placement
#[derive(Debug, Clone)]
pub struct Placement {
    pub method: PlaceMethod,
    /// Digests of the destination, confirmed by re-reading it
    pub digests: FileDigests,
    /// Whether a file already existed at the destination
    pub replaced: bool,
}

/// Suffix of staged files; content enumeration skips them
pub const STAGING_SUFFIX: &str = ".preserv-partial";

/// Staging name beside the destination
pub(crate) fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}{}", name, STAGING_SUFFIX))
}

pub(crate) fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

/// Create a hardlink at `link_path` pointing to `original_path`.
pub fn create_hardlink(original_path: &Path, link_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = link_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Hardlink creation fails on an existing path
    if link_path.exists() {
        std::fs::remove_file(link_path)?;
    }

    std::fs::hard_link(original_path, link_path)
}

/// Place `source` at `dest`, confirming the result by re-hashing it
pub fn place_verified(
    source: &Path,
    dest: &Path,
    algorithms: &[Algorithm],
    options: PlaceOptions,
) -> Result<Placement> {
    let expected = calculate_checksums(source, algorithms)
        .map_err(|e| match e {
            PreservError::Io(io) => PreservError::transfer(source, dest, io),
            other => other,
        })?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PreservError::transfer(source, dest, e))?;
    }
    let staging = staging_path(dest);
    let replaced = dest.exists();

    let method = stage(source, dest, &staging, options)?;

    let actual = match calculate_checksums(&staging, algorithms) {
        Ok(actual) => actual,
        Err(e) => {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
    };

    let mismatches: Vec<DigestMismatch> = expected
        .digests
        .iter()
        .filter_map(|(alg, want)| {
            let got = actual.get(*alg).unwrap_or_default();
            (got != want).then(|| DigestMismatch {
                path: dest.display().to_string(),
                expected: want.clone(),
                actual: got.to_string(),
            })
        })
        .collect();
    if !mismatches.is_empty() || actual.size != expected.size {
        let _ = std::fs::remove_file(&staging);
        warn!(source = %source.display(), dest = %dest.display(), "staged content does not match source");
        return Err(PreservError::ChecksumMismatch { mismatches });
    }

    std::fs::rename(&staging, dest).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        PreservError::transfer(source, dest, e)
    })?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        method = method.as_str(),
        bytes = actual.size,
        "placed file"
    );

    Ok(Placement {
        method,
        digests: actual,
        replaced,
    })
}

fn stage(source: &Path, dest: &Path, staging: &Path, options: PlaceOptions) -> Result<PlaceMethod> {
    if options.link {
        match create_hardlink(source, staging) {
            Ok(()) => return Ok(PlaceMethod::Hardlink),
            Err(e) if options.copy_on_link_failure => {
                debug!(source = %source.display(), error = %e, "hardlink failed, copying");
            }
            Err(e) => return Err(PreservError::transfer(source, dest, e)),
        }
    }

    if staging.exists() {
        std::fs::remove_file(staging).map_err(|e| PreservError::transfer(source, dest, e))?;
    }
    std::fs::copy(source, staging).map_err(|e| {
        let _ = std::fs::remove_file(staging);
        PreservError::transfer(source, dest, e)
    })?;
    Ok(PlaceMethod::Copy)
}
