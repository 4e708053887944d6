//! Line-level parse diagnostics shared by every tag-file codec
//!
//! Tag files are read leniently: a bad line never aborts parsing. Instead the
//! codec records a [`LineIssue`] and keeps going, so the validator can report
//! every problem in a file at once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of problem found on a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineIssueKind {
    /// Line is not `Name: value` and not an indented continuation
    MalformedTag,
    /// Indented continuation line with no preceding tag
    OrphanContinuation,
    /// Manifest line is not `<digest> <path>`
    MalformedManifestLine,
    /// Manifest digest is not lowercase/uppercase hexadecimal of the right length
    InvalidDigest,
    /// Fetch line does not have exactly three fields
    WrongFieldCount,
    /// Fetch size field is neither a number nor `-`
    NonNumericSize,
    /// Lookup line is not `<path>\t<bag-name>`
    MalformedLookupLine,
}

impl fmt::Display for LineIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LineIssueKind::MalformedTag => "not a 'Name: value' line",
            LineIssueKind::OrphanContinuation => "continuation line without a preceding tag",
            LineIssueKind::MalformedManifestLine => "not a '<digest>  <path>' line",
            LineIssueKind::InvalidDigest => "digest is not valid hexadecimal",
            LineIssueKind::WrongFieldCount => "expected exactly 3 fields",
            LineIssueKind::NonNumericSize => "size field is not numeric",
            LineIssueKind::MalformedLookupLine => "not a '<path>\\t<bag-name>' line",
        };
        write!(f, "{}", s)
    }
}

/// A problem found on one (1-indexed) line of a tag file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineIssue {
    pub line: usize,
    pub text: String,
    pub kind: LineIssueKind,
}

impl LineIssue {
    pub fn new(line: usize, text: &str, kind: LineIssueKind) -> Self {
        Self {
            line,
            text: text.to_string(),
            kind,
        }
    }
}

impl fmt::Display for LineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.kind, self.text)
    }
}

/// Iterate the lines of a tag file, 1-indexed, without line terminators.
///
/// Handles `\n` and `\r\n` endings and drops a UTF-8 byte-order mark.
pub(crate) fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines().enumerate().map(|(i, l)| (i + 1, l))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_lines_strips_bom_and_crlf() {
        let lines: Vec<_> = numbered_lines("\u{feff}a\r\nb\n").collect();
        assert_eq!(lines, vec![(1, "a"), (2, "b")]);
    }

    #[test]
    fn test_issue_display() {
        let issue = LineIssue::new(3, "garbage", LineIssueKind::MalformedTag);
        let msg = issue.to_string();
        assert!(msg.starts_with("line 3"));
        assert!(msg.contains("garbage"));
    }
}
