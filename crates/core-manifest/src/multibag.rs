//! Multibag ledger files carried by a head bag under `multibag/`
//!
//! - `member-bags.tsv`: one member bag name per line, in creation order
//! - `file-lookup.tsv`: `<content-path>\t<owning-bag-name>` per line
//! - `deprecated-members.txt`: optional list of superseded member names

use crate::lines::{numbered_lines, LineIssue, LineIssueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag directory holding the multibag ledgers
pub const MULTIBAG_DIR: &str = "multibag";
pub const MEMBER_BAGS_FILE: &str = "member-bags.tsv";
pub const FILE_LOOKUP_FILE: &str = "file-lookup.tsv";
pub const DEPRECATED_MEMBERS_FILE: &str = "deprecated-members.txt";

/// Ordered list of member bag names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberList {
    pub members: Vec<String>,
}

impl MemberList {
    /// One name per line; anything after a tab (e.g. a URL column) is ignored
    pub fn parse(text: &str) -> Self {
        let members = numbered_lines(text)
            .filter_map(|(_, line)| {
                let name = line.split('\t').next().unwrap_or("").trim();
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect();
        Self { members }
    }

    pub fn render(&self) -> String {
        self.members.iter().map(|m| format!("{}\n", m)).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    pub fn last(&self) -> Option<&str> {
        self.members.last().map(String::as_str)
    }
}

/// Content path to owning member bag, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLookup {
    pub entries: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLookup {
    pub lookup: FileLookup,
    pub issues: Vec<LineIssue>,
}

impl FileLookup {
    pub fn parse(text: &str) -> ParsedLookup {
        let mut parsed = ParsedLookup::default();
        for (lineno, line) in numbered_lines(text) {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((path, bag)) if !path.is_empty() && !bag.trim().is_empty() => parsed
                    .lookup
                    .entries
                    .push((path.to_string(), bag.trim().to_string())),
                _ => parsed
                    .issues
                    .push(LineIssue::new(lineno, line, LineIssueKind::MalformedLookupLine)),
            }
        }
        parsed
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(path, bag)| format!("{}\t{}\n", path, bag))
            .collect()
    }

    pub fn insert(&mut self, path: impl Into<String>, bag: impl Into<String>) {
        self.entries.push((path.into(), bag.into()));
    }

    /// Owning bag of `path` (first match)
    pub fn owner(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, b)| b.as_str())
    }

    /// Paths listed more than once
    pub fn duplicates(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (path, _) in &self.entries {
            *counts.entry(path.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_list_roundtrip_order() {
        let list = MemberList::parse("b.mbag0_4-0\nb.mbag0_4-1\thttps://x\n\nb.mbag0_4-2\n");
        assert_eq!(list.members.len(), 3);
        assert_eq!(list.last(), Some("b.mbag0_4-2"));
        assert_eq!(list.render(), "b.mbag0_4-0\nb.mbag0_4-1\nb.mbag0_4-2\n");
    }

    #[test]
    fn test_lookup_parse_and_duplicates() {
        let parsed = FileLookup::parse("data/a\tbag-0\ndata/b\tbag-1\nbroken line\ndata/a\tbag-1\n");
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.issues[0].line, 3);
        assert_eq!(parsed.lookup.owner("data/b"), Some("bag-1"));
        assert_eq!(parsed.lookup.duplicates(), vec!["data/a"]);
    }

    #[test]
    fn test_lookup_render() {
        let mut lookup = FileLookup::default();
        lookup.insert("data/x y", "bag-0");
        assert_eq!(lookup.render(), "data/x y\tbag-0\n");
    }
}
