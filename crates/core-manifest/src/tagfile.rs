//! Key/value tag files (`bag-info.txt`, `bagit.txt`)
//!
//! A tag file is an ordered multimap: a name may repeat, and both the order of
//! names and the order of repeated values are significant. [`TagFileSet`]
//! keeps the raw `(name, value)` sequence and groups on read.

use crate::lines::{numbered_lines, LineIssue, LineIssueKind};
use serde::{Deserialize, Serialize};

/// Ordered multimap of tag name to values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFileSet {
    entries: Vec<(String, String)>,
}

/// Result of leniently parsing a tag file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTags {
    pub tags: TagFileSet,
    pub issues: Vec<LineIssue>,
}

impl TagFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse tag-file text, collecting malformed lines instead of failing.
    ///
    /// Continuation lines start with a space or tab and are folded into the
    /// previous value with a single space. Blank lines are ignored.
    pub fn parse(text: &str) -> ParsedTags {
        let mut tags = TagFileSet::new();
        let mut issues = Vec::new();

        for (lineno, line) in numbered_lines(text) {
            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                match tags.entries.last_mut() {
                    Some((_, value)) => {
                        let more = line.trim();
                        if value.is_empty() {
                            value.push_str(more);
                        } else {
                            value.push(' ');
                            value.push_str(more);
                        }
                    }
                    None => issues.push(LineIssue::new(
                        lineno,
                        line,
                        LineIssueKind::OrphanContinuation,
                    )),
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if is_valid_name(name) => {
                    tags.entries
                        .push((name.trim_end().to_string(), value.trim().to_string()));
                }
                _ => issues.push(LineIssue::new(lineno, line, LineIssueKind::MalformedTag)),
            }
        }

        ParsedTags { tags, issues }
    }

    /// All values recorded for `name`, in file order; empty if absent
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value recorded for `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Number of values recorded for `name`
    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|(n, _)| n == name).count()
    }

    /// Append one value for `name` after any existing values
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name`.
    ///
    /// The new values take the position of the first existing occurrence, or
    /// are appended if the name was absent.
    pub fn set<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let position = self.entries.iter().position(|(n, _)| n == name);
        self.entries.retain(|(n, _)| n != name);
        let new: Vec<(String, String)> = values
            .into_iter()
            .map(|v| (name.to_string(), v.into()))
            .collect();
        let at = position.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries.splice(at..at, new);
    }

    /// Remove every value of `name`, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        before - self.entries.len()
    }

    /// Distinct names in order of first appearance
    pub fn names(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for (name, _) in &self.entries {
            if !seen.contains(&name.as_str()) {
                seen.push(name);
            }
        }
        seen
    }

    /// Raw `(name, value)` pairs in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into `self`: names present in `other` replace ours.
    pub fn merge(&mut self, other: &TagFileSet) {
        for name in other.names() {
            let values: Vec<String> = other.values(name).into_iter().map(String::from).collect();
            self.set(name, values);
        }
    }

    /// Render as tag-file text.
    ///
    /// Embedded newlines in a value are written as indented continuation
    /// lines so that the text parses back to the same multimap.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            let mut parts = value.split('\n');
            out.push_str(name);
            out.push_str(": ");
            out.push_str(parts.next().unwrap_or(""));
            out.push('\n');
            for part in parts {
                out.push_str("  ");
                out.push_str(part.trim());
                out.push('\n');
            }
        }
        out
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for TagFileSet {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    let name = name.trim_end();
    !name.is_empty() && !name.starts_with(char::is_whitespace)
}

/// Name of the version line in `bagit.txt`
pub const BAGIT_VERSION: &str = "BagIt-Version";
/// Name of the encoding line in `bagit.txt`
pub const TAG_ENCODING: &str = "Tag-File-Character-Encoding";

/// BagIt declaration versions we accept
pub const SUPPORTED_BAGIT_VERSIONS: &[&str] = &["0.97", "1.0"];

/// Parsed `bagit.txt` declaration
///
/// Kept as raw value lists so that duplicate or missing declarations remain
/// distinguishable for validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declaration {
    pub versions: Vec<String>,
    pub encodings: Vec<String>,
    /// Lines that are neither declaration, with their line numbers
    pub unrecognized: Vec<(usize, String)>,
}

impl Declaration {
    pub fn parse(text: &str) -> Self {
        let mut decl = Declaration::default();
        for (lineno, line) in numbered_lines(text) {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) if name == BAGIT_VERSION => {
                    decl.versions.push(value.trim().to_string())
                }
                Some((name, value)) if name == TAG_ENCODING => {
                    decl.encodings.push(value.trim().to_string())
                }
                _ => decl.unrecognized.push((lineno, line.to_string())),
            }
        }
        decl
    }

    /// Render the two-line declaration for the given version (always UTF-8)
    pub fn render(version: &str) -> String {
        format!("{}: {}\n{}: UTF-8\n", BAGIT_VERSION, version, TAG_ENCODING)
    }

    pub fn version(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encodings.first().map(String::as_str)
    }
}
