//! Split planning
//!
//! Content files are taken in the bag's enumeration order (depth-first,
//! name-sorted) and packed greedily: a split is sealed as soon as the next
//! file would push it past the packing target. Files are never reordered by
//! size and never cut.

use crate::bag::Bag;
use crate::config::MultibagConfig;
use crate::error::{PreservError, Result};
use preserv_core_manifest::BagName;
use serde::Serialize;
use tracing::{debug, warn};

/// One content file assigned to a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    /// Manifest path (`data/...`)
    pub path: String,
    pub size: u64,
}

/// One bag-to-be
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMember {
    pub name: String,
    pub files: Vec<PlannedFile>,
    /// Running total of content bytes
    pub content_size: u64,
    pub is_head: bool,
}

impl PlannedMember {
    fn new(files: Vec<PlannedFile>) -> Self {
        let content_size = files.iter().map(|f| f.size).sum();
        Self {
            name: String::new(),
            files,
            content_size,
            is_head: false,
        }
    }
}

/// What the splitter will do with a bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Fits already; returned as-is
    Unchanged,
    /// Fits, but gets a head-bag-only multibag structure in place
    Convert,
    /// Split into a series of new bags
    Split,
}

/// Inspectable result of planning, computed before anything is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    pub source: String,
    pub kind: PlanKind,
    pub members: Vec<PlannedMember>,
    pub content_size: u64,
    /// Bytes of `metadata/` plus `fetch.txt`, all carried by the head
    pub metadata_size: u64,
}

impl SplitPlan {
    pub fn total_size(&self) -> u64 {
        self.content_size + self.metadata_size
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// The member that becomes the head bag (always last)
    pub fn head(&self) -> Option<&PlannedMember> {
        self.members.last().filter(|m| m.is_head)
    }

    pub fn requires_split(&self) -> bool {
        self.kind == PlanKind::Split
    }
}

/// Greedily pack `(path, size)` pairs, in order, into groups bounded by `target`.
///
/// A file larger than `target` gets a group of its own.
pub fn pack<I>(files: I, target: u64) -> Vec<Vec<PlannedFile>>
where
    I: IntoIterator<Item = PlannedFile>,
{
    let mut groups: Vec<Vec<PlannedFile>> = Vec::new();
    let mut current: Vec<PlannedFile> = Vec::new();
    let mut current_size = 0u64;

    for file in files {
        if !current.is_empty() && current_size.saturating_add(file.size) > target {
            groups.push(std::mem::take(&mut current));
            current_size = 0;
        }
        if file.size > target {
            warn!(path = %file.path, size = file.size, target, "file exceeds packing target; placing it alone");
        }
        current_size += file.size;
        current.push(file);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Names for `count` members derived from the source bag name
pub fn member_names(source: &str, count: usize) -> Vec<String> {
    match BagName::parse(source) {
        Ok(name) => (0..count)
            .map(|i| name.with_sequence(name.sequence + i as u64).bag_name())
            .collect(),
        Err(_) => (0..count).map(|i| format!("{}-{}", source, i)).collect(),
    }
}

/// Plan how `bag` is split under `config`
pub fn plan_split(bag: &Bag, config: &MultibagConfig) -> Result<SplitPlan> {
    config.validate()?;

    let mut files = Vec::new();
    for file in bag.content_files() {
        let file = file?;
        files.push(PlannedFile {
            path: file.bag_path(),
            size: file.size,
        });
    }
    let content_size: u64 = files.iter().map(|f| f.size).sum();
    let metadata_size = bag.metadata_volume()?;

    let fits = content_size <= config.max_bag_size;
    if fits && !config.convert_small {
        debug!(bag = %bag.name(), content_size, "no split required");
        let mut member = PlannedMember::new(files);
        member.name = bag.name().to_string();
        return Ok(SplitPlan {
            source: bag.name().to_string(),
            kind: PlanKind::Unchanged,
            members: vec![member],
            content_size,
            metadata_size,
        });
    }

    // Every plan past this point produces a head bag
    let headbag_max = config.effective_headbag_size();
    if metadata_size > headbag_max {
        return Err(PreservError::Config(format!(
            "metadata of {} ({} bytes) exceeds max_headbag_size ({})",
            bag.name(),
            metadata_size,
            headbag_max
        )));
    }

    if fits {
        debug!(bag = %bag.name(), content_size, "converting in place");
        let mut member = PlannedMember::new(files);
        member.name = bag.name().to_string();
        member.is_head = true;
        return Ok(SplitPlan {
            source: bag.name().to_string(),
            kind: PlanKind::Convert,
            members: vec![member],
            content_size,
            metadata_size,
        });
    }

    let target = config.effective_target_size();
    let mut members: Vec<PlannedMember> = pack(files, target)
        .into_iter()
        .map(PlannedMember::new)
        .collect();

    let head_room = target.min(headbag_max);
    match members.last_mut() {
        Some(last) if last.content_size + metadata_size <= head_room => last.is_head = true,
        _ => {
            let mut head = PlannedMember::new(Vec::new());
            head.is_head = true;
            members.push(head);
        }
    }

    let names = member_names(bag.name(), members.len());
    for (member, name) in members.iter_mut().zip(names) {
        member.name = name;
    }

    debug!(
        bag = %bag.name(),
        members = members.len(),
        content_size,
        metadata_size,
        "split planned"
    );
    Ok(SplitPlan {
        source: bag.name().to_string(),
        kind: PlanKind::Split,
        members,
        content_size,
        metadata_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file(path: &str, size: u64) -> PlannedFile {
        PlannedFile {
            path: path.to_string(),
            size,
        }
    }

    fn sizes(groups: &[Vec<PlannedFile>]) -> Vec<Vec<u64>> {
        groups
            .iter()
            .map(|g| g.iter().map(|f| f.size).collect())
            .collect()
    }

    #[test]
    fn test_pack_keeps_order() {
        let groups = pack(
            vec![file("a", 100_000), file("b", 150_000), file("c", 50_000)],
            200_000,
        );
        assert_eq!(sizes(&groups), vec![vec![100_000], vec![150_000, 50_000]]);
    }

    #[test]
    fn test_pack_oversized_file_alone() {
        let groups = pack(
            vec![file("a", 10), file("big", 500), file("c", 10), file("d", 10)],
            100,
        );
        assert_eq!(sizes(&groups), vec![vec![10], vec![500], vec![10, 10]]);
    }

    #[test]
    fn test_pack_exact_fit() {
        let groups = pack(vec![file("a", 50), file("b", 50), file("c", 1)], 100);
        assert_eq!(sizes(&groups), vec![vec![50, 50], vec![1]]);
        assert!(pack(Vec::new(), 100).is_empty());
    }

    #[test]
    fn test_member_names() {
        assert_eq!(
            member_names("pdr0-0001.1_0.mbag0_4-3", 3),
            vec![
                "pdr0-0001.1_0.mbag0_4-3",
                "pdr0-0001.1_0.mbag0_4-4",
                "pdr0-0001.1_0.mbag0_4-5"
            ]
        );
        assert_eq!(member_names("plain", 2), vec!["plain-0", "plain-1"]);
    }

    fn sample_bag(sizes: &[(&str, usize)], metadata: usize) -> (tempfile::TempDir, Bag) {
        let dir = tempdir().unwrap();
        let bag = Bag::create(dir.path().join("sample")).unwrap();
        for (path, size) in sizes {
            let full = bag.content_path(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, vec![b'x'; *size]).unwrap();
        }
        std::fs::create_dir_all(bag.metadata_dir()).unwrap();
        std::fs::write(bag.metadata_dir().join("record.json"), vec![b' '; metadata]).unwrap();
        (dir, bag)
    }

    #[test]
    fn test_plan_dedicated_head() {
        let (_dir, bag) = sample_bag(&[("a", 100_000), ("b", 150_000), ("c", 50_000)], 500);
        let plan = plan_split(&bag, &MultibagConfig::with_max_bag_size(200_000)).unwrap();
        assert!(plan.requires_split());
        assert_eq!(plan.member_count(), 3);
        assert_eq!(plan.members[0].content_size, 100_000);
        assert_eq!(plan.members[1].content_size, 200_000);
        let head = plan.head().unwrap();
        assert!(head.files.is_empty());
        assert_eq!(head.name, "sample-2");
        assert_eq!(plan.total_size(), 300_500);
    }

    #[test]
    fn test_plan_head_joins_last_split() {
        let (_dir, bag) = sample_bag(&[("a", 150_000), ("b", 100_000)], 500);
        let plan = plan_split(&bag, &MultibagConfig::with_max_bag_size(200_000)).unwrap();
        assert_eq!(plan.member_count(), 2);
        assert!(plan.members[1].is_head);
        assert_eq!(plan.members[1].files.len(), 1);
    }

    #[test]
    fn test_plan_small_bag() {
        let (_dir, bag) = sample_bag(&[("a", 10)], 5);
        let plan = plan_split(&bag, &MultibagConfig::with_max_bag_size(100)).unwrap();
        assert_eq!(plan.kind, PlanKind::Unchanged);
        assert!(plan.head().is_none());

        let config = MultibagConfig {
            convert_small: true,
            ..MultibagConfig::with_max_bag_size(100)
        };
        let plan = plan_split(&bag, &config).unwrap();
        assert_eq!(plan.kind, PlanKind::Convert);
        assert_eq!(plan.head().unwrap().name, "sample");
    }

    #[test]
    fn test_plan_metadata_too_large() {
        let (_dir, bag) = sample_bag(&[("a", 100), ("b", 100)], 80);
        let config = MultibagConfig {
            max_headbag_size: Some(50),
            ..MultibagConfig::with_max_bag_size(150)
        };
        assert!(matches!(
            plan_split(&bag, &config),
            Err(PreservError::Config(_))
        ));

        // Converting in place still builds a head bag
        let convert = MultibagConfig {
            convert_small: true,
            max_headbag_size: Some(50),
            ..MultibagConfig::with_max_bag_size(1_000)
        };
        assert!(matches!(
            plan_split(&bag, &convert),
            Err(PreservError::Config(_))
        ));
        let unchanged = MultibagConfig {
            convert_small: false,
            ..convert
        };
        assert_eq!(plan_split(&bag, &unchanged).unwrap().kind, PlanKind::Unchanged);
    }

    #[test]
    fn test_plan_serializes() {
        let (_dir, bag) = sample_bag(&[("a", 100), ("b", 100)], 10);
        let plan = plan_split(&bag, &MultibagConfig::with_max_bag_size(150)).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["kind"], "split");
        assert_eq!(json["members"][0]["files"][0]["path"], "data/a");
    }
}
