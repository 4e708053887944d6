//! Payload and tag manifests (`manifest-<alg>.txt`, `tagmanifest-<alg>.txt`)
//!
//! Each line is `<digest>␠␠<relative-path>`. Paths are written with the
//! BagIt percent-encoding for `%`, CR and LF so that any file name fits on a
//! single line; everything else is written verbatim.

use crate::error::{Error, Result};
use crate::lines::{numbered_lines, LineIssue, LineIssueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Checksum algorithms a bag may declare manifests for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Length of a hex-encoded digest
    pub fn hex_len(&self) -> usize {
        match self {
            Algorithm::Sha256 => 64,
            Algorithm::Sha512 => 128,
        }
    }

    /// `manifest-<alg>.txt`
    pub fn manifest_name(&self) -> String {
        format!("manifest-{}.txt", self.as_str())
    }

    /// `tagmanifest-<alg>.txt`
    pub fn tagmanifest_name(&self) -> String {
        format!("tagmanifest-{}.txt", self.as_str())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            "sha512" | "sha-512" => Ok(Algorithm::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Which kind of manifest a file name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Payload,
    Tag,
}

/// Classify a bag-root file name as a manifest and extract its algorithm.
///
/// Returns `Ok(None)` for names that are not manifests at all, and an error
/// for manifest names whose algorithm we do not support.
pub fn classify_manifest_name(name: &str) -> Result<Option<(ManifestKind, Algorithm)>> {
    let (kind, rest) = if let Some(rest) = name.strip_prefix("tagmanifest-") {
        (ManifestKind::Tag, rest)
    } else if let Some(rest) = name.strip_prefix("manifest-") {
        (ManifestKind::Payload, rest)
    } else {
        return Ok(None);
    };
    match rest.strip_suffix(".txt") {
        Some(alg) => Ok(Some((kind, alg.parse()?))),
        None => Ok(None),
    }
}

/// One `(path, algorithm, digest)` manifest line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the bag root, POSIX separators (`data/...` for payload)
    pub path: String,
    pub algorithm: Algorithm,
    /// Lowercase hex digest
    pub digest: String,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, algorithm: Algorithm, digest: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            algorithm,
            digest: digest.into().to_ascii_lowercase(),
        }
    }
}

/// Result of leniently parsing a manifest file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    pub entries: Vec<ManifestEntry>,
    pub issues: Vec<LineIssue>,
}

impl ParsedManifest {
    /// Entries keyed by path; a later duplicate line wins
    pub fn by_path(&self) -> BTreeMap<&str, &ManifestEntry> {
        self.entries.iter().map(|e| (e.path.as_str(), e)).collect()
    }
}

/// Parse manifest text for `algorithm`, collecting bad lines
pub fn parse_manifest(text: &str, algorithm: Algorithm) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();

    for (lineno, line) in numbered_lines(text) {
        if line.trim().is_empty() {
            continue;
        }
        let Some((digest, path)) = line.split_once(char::is_whitespace) else {
            parsed
                .issues
                .push(LineIssue::new(lineno, line, LineIssueKind::MalformedManifestLine));
            continue;
        };
        let path = path.trim_start();
        if digest.is_empty() || path.is_empty() {
            parsed
                .issues
                .push(LineIssue::new(lineno, line, LineIssueKind::MalformedManifestLine));
            continue;
        }
        if digest.len() != algorithm.hex_len() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            parsed
                .issues
                .push(LineIssue::new(lineno, line, LineIssueKind::InvalidDigest));
            continue;
        }
        parsed
            .entries
            .push(ManifestEntry::new(decode_path(path), algorithm, digest));
    }

    parsed
}

/// Render manifest entries, sorted by path for byte-stable output
pub fn render_manifest<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a ManifestEntry>,
{
    let mut sorted: Vec<&ManifestEntry> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    let mut out = String::new();
    for entry in sorted {
        out.push_str(&entry.digest);
        out.push_str("  ");
        out.push_str(&encode_path(&entry.path));
        out.push('\n');
    }
    out
}

/// Percent-encode `%`, CR and LF in a manifest path
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`encode_path`]; other `%xx` sequences are left alone
pub fn decode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let (replacement, skip) = match tail.get(..3) {
            Some(code) if code.eq_ignore_ascii_case("%25") => ("%", 3),
            Some(code) if code.eq_ignore_ascii_case("%0A") => ("\n", 3),
            Some(code) if code.eq_ignore_ascii_case("%0D") => ("\r", 3),
            _ => ("%", 1),
        };
        out.push_str(replacement);
        rest = &tail[skip..];
    }
    out.push_str(rest);
    out
}
