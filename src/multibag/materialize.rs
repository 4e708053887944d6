//! Writing planned members to disk

use super::plan::{PlannedMember, SplitPlan};
use crate::bag::{Bag, MultibagIndex, DATA_DIR, METADATA_DIR};
use crate::builder::SOFTWARE_AGENT;
use crate::config::MultibagConfig;
use crate::core::human_size;
use crate::core::link::{place_verified, PlaceOptions};
use crate::core::paths::to_posix;
use crate::error::Result;
use preserv_core_audit::{ProvenanceEvent, ProvenanceLogger, ProvenanceType};
use preserv_core_manifest::multibag::MULTIBAG_DIR;
use preserv_core_manifest::{
    Algorithm, BagName, ManifestEntry, ManifestKind, TagFileSet, BAGIT_TXT, BAG_INFO_TXT,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Fields recomputed for every member
const COMPUTED_FIELDS: &[&str] = &[
    "Payload-Oxum",
    "Bag-Size",
    "Bag-Count",
    "Bag-Software-Agent",
    "Multibag-Version",
    "Multibag-Tag-Directory",
    "Multibag-Head-Version",
];

const LINK: PlaceOptions = PlaceOptions {
    link: true,
    copy_on_link_failure: true,
};

/// Tag files are copied so later appends to the head never reach the source
const COPY: PlaceOptions = PlaceOptions {
    link: false,
    copy_on_link_failure: true,
};

/// Shared facts about the source bag, read once per split
pub(crate) struct SourceFacts {
    pub algorithms: Vec<Algorithm>,
    pub bagit_version: String,
    pub info: TagFileSet,
    pub head_version: String,
    pub prior_index: Option<MultibagIndex>,
}

impl SourceFacts {
    pub fn read(bag: &Bag, config: &MultibagConfig) -> Result<Self> {
        let mut algorithms = bag.manifest_algorithms(ManifestKind::Payload)?;
        if algorithms.is_empty() {
            algorithms.push(Algorithm::Sha256);
        }
        let bagit_version = bag
            .declaration()?
            .and_then(|d| d.version().map(str::to_string))
            .unwrap_or_else(|| "1.0".to_string());

        let mut info = bag.info()?.tags;
        for field in COMPUTED_FIELDS {
            info.remove(field);
        }
        info.set("Bag-Software-Agent", [SOFTWARE_AGENT]);

        Ok(Self {
            algorithms,
            bagit_version,
            info,
            head_version: head_version(bag, config)?,
            prior_index: bag.multibag_index()?,
        })
    }
}

/// Profile version recorded as `Multibag-Head-Version`
fn head_version(bag: &Bag, config: &MultibagConfig) -> Result<String> {
    if let Ok(name) = BagName::parse(bag.name()) {
        return Ok(name.profile_version());
    }
    Ok(bag
        .info()?
        .tags
        .first("Profile-Version")
        .map(str::to_string)
        .unwrap_or_else(|| config.multibag_version.clone()))
}

/// Materialize every member of a split plan under `dest_dir`
pub(crate) fn materialize(
    source: &Bag,
    plan: &SplitPlan,
    dest_dir: &Path,
    config: &MultibagConfig,
) -> Result<Vec<Bag>> {
    let facts = SourceFacts::read(source, config)?;
    std::fs::create_dir_all(dest_dir)?;

    let count = plan.member_count();
    let mut members = Vec::with_capacity(count);
    for (i, planned) in plan.members.iter().enumerate() {
        let root = dest_dir.join(&planned.name);
        if root.exists() {
            warn!(bag = %planned.name, "replacing existing member directory");
            std::fs::remove_dir_all(&root)?;
        }
        let bag = Bag::create(&root)?;
        write_member(source, &bag, planned, i + 1, count, &facts, config)?;
        members.push(bag);
    }

    if let Some(head) = members.last() {
        finish_head(source, head, plan, &facts, config)?;
    }
    info!(
        source = %source.name(),
        members = members.len(),
        dest = %dest_dir.display(),
        "split materialized"
    );
    Ok(members)
}

/// Content, payload manifests and bag-info of one member
fn write_member(
    source: &Bag,
    bag: &Bag,
    planned: &PlannedMember,
    position: usize,
    count: usize,
    facts: &SourceFacts,
    config: &MultibagConfig,
) -> Result<()> {
    let mut manifests: BTreeMap<Algorithm, Vec<ManifestEntry>> = BTreeMap::new();
    for file in &planned.files {
        let placement = place_verified(
            &bag_file(source, &file.path),
            &bag_file(bag, &file.path),
            &facts.algorithms,
            LINK,
        )?;
        for (alg, digest) in placement.digests.digests {
            manifests
                .entry(alg)
                .or_default()
                .push(ManifestEntry::new(file.path.clone(), alg, digest));
        }
    }
    for alg in &facts.algorithms {
        let entries = manifests.remove(alg).unwrap_or_default();
        bag.write_manifest(ManifestKind::Payload, *alg, &entries)?;
    }
    bag.write_declaration(&facts.bagit_version)?;

    let mut info = facts.info.clone();
    info.set(
        "Payload-Oxum",
        [format!("{}.{}", planned.content_size, planned.files.len())],
    );
    info.set("Bag-Size", [human_size(planned.content_size)]);
    info.set("Bag-Count", [format!("{} of {}", position, count)]);
    if planned.is_head {
        set_multibag_fields(&mut info, facts, config);
    }
    bag.write_info(&info)?;

    if !planned.is_head {
        bag.write_tag_manifests(&facts.algorithms)?;
    }
    debug!(
        bag = %bag.name(),
        files = planned.files.len(),
        bytes = planned.content_size,
        "member written"
    );
    Ok(())
}

pub(crate) fn set_multibag_fields(info: &mut TagFileSet, facts: &SourceFacts, config: &MultibagConfig) {
    info.set("Multibag-Version", [config.multibag_version.clone()]);
    info.set("Multibag-Tag-Directory", [MULTIBAG_DIR]);
    info.set("Multibag-Head-Version", [facts.head_version.clone()]);
}

/// Tag directories, the multibag index, provenance and tag manifests of the head
fn finish_head(
    source: &Bag,
    head: &Bag,
    plan: &SplitPlan,
    facts: &SourceFacts,
    config: &MultibagConfig,
) -> Result<()> {
    copy_tag_tree(source, head)?;

    let names: Vec<String> = plan.members.iter().map(|m| m.name.clone()).collect();
    let mut lookup = Vec::new();
    for member in &plan.members {
        for file in &member.files {
            lookup.push((file.path.clone(), member.name.clone()));
        }
    }
    let index = merge_index(facts.prior_index.as_ref(), source.name(), &names, lookup);
    head.write_multibag_index(&index)?;

    let mut logger = ProvenanceLogger::open(head.provenance_file())?;
    logger.log(
        &ProvenanceEvent::new(ProvenanceType::BagSplit, source.name())
            .with_bytes(plan.content_size)
            .with_message(&format!("split into {} member bags", names.len()))
            .with_context("head", head.name())
            .with_context("max_bag_size", &config.max_bag_size.to_string()),
    )?;

    head.write_tag_manifests(&facts.algorithms)
}

/// Build the head's index, carrying forward what a prior head bag recorded.
///
/// Prior lookup entries for paths not in this split keep their owner, unless
/// that owner is the source bag being replaced.
pub(crate) fn merge_index(
    prior: Option<&MultibagIndex>,
    source_name: &str,
    names: &[String],
    lookup: Vec<(String, String)>,
) -> MultibagIndex {
    let mut index = MultibagIndex::default();
    let fresh: BTreeSet<&str> = lookup.iter().map(|(p, _)| p.as_str()).collect();

    if let Some(prior) = prior {
        for member in &prior.members.members {
            if member != source_name && !names.contains(member) {
                index.members.members.push(member.clone());
            }
        }
        for (path, owner) in &prior.lookup.entries {
            if owner != source_name && !fresh.contains(path.as_str()) {
                index.lookup.insert(path.clone(), owner.clone());
            }
        }
        index.deprecated = prior.deprecated.clone();
    }
    index.members.members.extend(names.iter().cloned());
    for (path, owner) in lookup {
        index.lookup.insert(path, owner);
    }
    index
}

/// Copy every root-level tag directory and file the head must carry
fn copy_tag_tree(source: &Bag, head: &Bag) -> Result<()> {
    for entry in std::fs::read_dir(source.root())? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if is_regenerated(name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            copy_dir(&path, &head.root().join(name))?;
        } else {
            place_verified(&path, &head.root().join(name), &[], COPY)?;
        }
    }
    Ok(())
}

/// Root entries every member writes for itself
fn is_regenerated(name: &str) -> bool {
    name == DATA_DIR
        || name == MULTIBAG_DIR
        || name == BAGIT_TXT
        || name == BAG_INFO_TXT
        || crate::core::link::is_staging_name(name)
        || preserv_core_manifest::classify_manifest_name(name)
            .ok()
            .flatten()
            .is_some()
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let rel = to_posix(rel)?;
        let dest = rel.split('/').fold(to.to_path_buf(), |acc, p| acc.join(p));
        place_verified(entry.path(), &dest, &[], COPY)?;
    }
    Ok(())
}

fn bag_file(bag: &Bag, manifest_path: &str) -> std::path::PathBuf {
    manifest_path
        .split('/')
        .fold(bag.root().to_path_buf(), |acc, p| acc.join(p))
}

/// Give an in-place bag a head-bag-only multibag structure
pub(crate) fn convert_in_place(bag: &Bag, config: &MultibagConfig) -> Result<()> {
    let facts = SourceFacts::read(bag, config)?;

    let mut lookup = Vec::new();
    let mut manifests: BTreeMap<Algorithm, Vec<ManifestEntry>> = BTreeMap::new();
    let existing = bag.manifest_algorithms(ManifestKind::Payload)?;
    let digests = if existing.is_empty() {
        Some(bag.compute_payload_digests(&facts.algorithms)?)
    } else {
        None
    };
    let (octets, count) = bag.payload_oxum()?;
    for file in bag.content_files() {
        let path = file?.bag_path();
        if let Some(d) = digests.as_ref().and_then(|d| d.get(&path)) {
            for (alg, digest) in &d.digests {
                manifests
                    .entry(*alg)
                    .or_default()
                    .push(ManifestEntry::new(path.clone(), *alg, digest.clone()));
            }
        }
        lookup.push((path, bag.name().to_string()));
    }
    for (alg, entries) in manifests {
        bag.write_manifest(ManifestKind::Payload, alg, &entries)?;
    }
    if bag.declaration()?.is_none() {
        bag.write_declaration(&facts.bagit_version)?;
    }

    let names = vec![bag.name().to_string()];
    let index = merge_index(facts.prior_index.as_ref(), bag.name(), &names, lookup);
    bag.write_multibag_index(&index)?;

    let mut info = bag.info()?.tags;
    info.set("Payload-Oxum", [format!("{}.{}", octets, count)]);
    info.set("Bag-Size", [human_size(octets)]);
    info.set("Bag-Count", ["1 of 1"]);
    set_multibag_fields(&mut info, &facts, config);
    bag.write_info(&info)?;

    std::fs::create_dir_all(bag.root().join(METADATA_DIR))?;
    let mut logger = ProvenanceLogger::open(bag.provenance_file())?;
    logger.log(
        &ProvenanceEvent::new(ProvenanceType::BagConverted, bag.name())
            .with_bytes(octets)
            .with_message("added head-bag multibag structure"),
    )?;

    let mut tag_algs = bag.manifest_algorithms(ManifestKind::Tag)?;
    if tag_algs.is_empty() {
        tag_algs = facts.algorithms.clone();
    }
    bag.write_tag_manifests(&tag_algs)?;
    info!(bag = %bag.name(), "converted to single-member multibag");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use preserv_core_manifest::{FileLookup, MemberList};

    #[test]
    fn test_merge_index_fresh() {
        let names = vec!["b-0".to_string(), "b-1".to_string()];
        let index = merge_index(
            None,
            "b",
            &names,
            vec![("data/x".into(), "b-0".into())],
        );
        assert_eq!(index.members.members, names);
        assert_eq!(index.lookup.owner("data/x"), Some("b-0"));
        assert!(index.deprecated.is_empty());
    }

    #[test]
    fn test_merge_index_carries_prior_entries() {
        let mut lookup = FileLookup::default();
        lookup.insert("data/old", "p.mbag0_4-0");
        lookup.insert("data/changed", "p.mbag0_4-0");
        lookup.insert("data/head-owned", "p.mbag0_4-1");
        let prior = MultibagIndex {
            members: MemberList {
                members: vec!["p.mbag0_4-0".into(), "p.mbag0_4-1".into()],
            },
            lookup,
            deprecated: vec!["p.mbag0_3-0".into()],
            lookup_issues: Vec::new(),
        };

        let names = vec!["p.mbag0_4-2".to_string(), "p.mbag0_4-3".to_string()];
        let index = merge_index(
            Some(&prior),
            "p.mbag0_4-1",
            &names,
            vec![("data/changed".into(), "p.mbag0_4-2".into())],
        );
        assert_eq!(
            index.members.members,
            vec!["p.mbag0_4-0", "p.mbag0_4-2", "p.mbag0_4-3"]
        );
        assert_eq!(index.lookup.owner("data/old"), Some("p.mbag0_4-0"));
        assert_eq!(index.lookup.owner("data/changed"), Some("p.mbag0_4-2"));
        assert_eq!(index.lookup.owner("data/head-owned"), None);
        assert!(index.lookup.duplicates().is_empty());
        assert_eq!(index.deprecated, vec!["p.mbag0_3-0"]);
    }

    #[test]
    fn test_regenerated_names() {
        assert!(is_regenerated("data"));
        assert!(is_regenerated("manifest-sha256.txt"));
        assert!(is_regenerated("tagmanifest-sha512.txt"));
        assert!(is_regenerated("bag-info.txt"));
        assert!(!is_regenerated("fetch.txt"));
        assert!(!is_regenerated("metadata"));
        assert!(!is_regenerated("about.txt"));
    }
}
