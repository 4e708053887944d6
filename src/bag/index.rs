//! Multibag index carried by a head bag

use super::Bag;
use crate::error::Result;
use preserv_core_manifest::multibag::{
    DEPRECATED_MEMBERS_FILE, FILE_LOOKUP_FILE, MEMBER_BAGS_FILE, MULTIBAG_DIR,
};
use preserv_core_manifest::{FileLookup, LineIssue, MemberList};

/// Membership ledger, lookup table and deprecated-member list of a series
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultibagIndex {
    pub members: MemberList,
    pub lookup: FileLookup,
    pub deprecated: Vec<String>,
    /// Malformed lookup lines found while reading
    pub lookup_issues: Vec<LineIssue>,
}

impl MultibagIndex {
    /// Members that own at least one lookup entry
    pub fn referenced_members(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (_, bag) in &self.lookup.entries {
            if !out.contains(&bag.as_str()) {
                out.push(bag);
            }
        }
        out
    }
}

fn ledger_path(name: &str) -> String {
    format!("{}/{}", MULTIBAG_DIR, name)
}

impl Bag {
    /// Read the multibag index, `None` unless this is a head bag
    pub fn multibag_index(&self) -> Result<Option<MultibagIndex>> {
        if !self.is_head_bag() {
            return Ok(None);
        }
        let dir = self.multibag_dir();
        let members = MemberList::parse(&std::fs::read_to_string(dir.join(MEMBER_BAGS_FILE))?);
        let parsed = FileLookup::parse(&std::fs::read_to_string(dir.join(FILE_LOOKUP_FILE))?);
        let deprecated_file = dir.join(DEPRECATED_MEMBERS_FILE);
        let deprecated = if deprecated_file.is_file() {
            MemberList::parse(&std::fs::read_to_string(deprecated_file)?).members
        } else {
            Vec::new()
        };
        Ok(Some(MultibagIndex {
            members,
            lookup: parsed.lookup,
            deprecated,
            lookup_issues: parsed.issues,
        }))
    }

    /// Write the index files under `multibag/`
    pub fn write_multibag_index(&self, index: &MultibagIndex) -> Result<()> {
        self.write_tag_file(&ledger_path(MEMBER_BAGS_FILE), &index.members.render())?;
        self.write_tag_file(&ledger_path(FILE_LOOKUP_FILE), &index.lookup.render())?;
        let deprecated_file = self.multibag_dir().join(DEPRECATED_MEMBERS_FILE);
        if index.deprecated.is_empty() {
            if deprecated_file.exists() {
                std::fs::remove_file(deprecated_file)?;
            }
        } else {
            let list = MemberList {
                members: index.deprecated.clone(),
            };
            self.write_tag_file(&ledger_path(DEPRECATED_MEMBERS_FILE), &list.render())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_index_roundtrip() {
        let dir = tempdir().unwrap();
        let bag = Bag::create(dir.path().join("p.mbag0_4-2")).unwrap();
        assert!(bag.multibag_index().unwrap().is_none());

        let mut index = MultibagIndex {
            members: MemberList {
                members: vec!["p.mbag0_4-1".into(), "p.mbag0_4-2".into()],
            },
            deprecated: vec!["p.mbag0_4-0".into()],
            ..Default::default()
        };
        index.lookup.insert("data/a", "p.mbag0_4-1");
        index.lookup.insert("data/b", "p.mbag0_4-2");
        bag.write_multibag_index(&index).unwrap();

        assert!(bag.is_head_bag());
        let read = bag.multibag_index().unwrap().unwrap();
        assert_eq!(read, index);
        assert_eq!(read.referenced_members(), vec!["p.mbag0_4-1", "p.mbag0_4-2"]);

        index.deprecated.clear();
        bag.write_multibag_index(&index).unwrap();
        assert!(!bag
            .multibag_dir()
            .join(DEPRECATED_MEMBERS_FILE)
            .exists());
    }
}
