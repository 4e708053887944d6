//! Remote fetch list (`fetch.txt`)
//!
//! Lines of `<url> <size> <relative-path>`, where size is a byte count or `-`
//! when unknown.

use crate::lines::{numbered_lines, LineIssue, LineIssueKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEntry {
    pub url: String,
    /// `None` when the file declares `-`
    pub size: Option<u64>,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFetch {
    pub entries: Vec<FetchEntry>,
    pub issues: Vec<LineIssue>,
}

impl ParsedFetch {
    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }
}

pub fn parse_fetch(text: &str) -> ParsedFetch {
    let mut parsed = ParsedFetch::default();

    for (lineno, line) in numbered_lines(text) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            parsed
                .issues
                .push(LineIssue::new(lineno, line, LineIssueKind::WrongFieldCount));
            continue;
        }
        let size = match fields[1] {
            "-" => None,
            s => match s.parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    parsed
                        .issues
                        .push(LineIssue::new(lineno, line, LineIssueKind::NonNumericSize));
                    continue;
                }
            },
        };
        parsed.entries.push(FetchEntry {
            url: fields[0].to_string(),
            size,
            path: fields[2].to_string(),
        });
    }

    parsed
}

pub fn render_fetch(entries: &[FetchEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let size = e.size.map_or_else(|| "-".to_string(), |n| n.to_string());
            format!("{} {} {}\n", e.url, size, e.path)
        })
        .collect()
}
