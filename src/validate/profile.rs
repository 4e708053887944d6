//! Organization profile rules
//!
//! Layered on the packaging-format rules: package naming (P1), bag-info
//! fields (P2), descriptive metadata (P3) and multibag ledgers (P4).
//!
//! Content-dependent metadata rules see the whole series from a head bag
//! (through its lookup table) and nothing from a non-head member, which
//! carries no metadata.

use super::{RuleContext, RuleDefinition, RuleSet, Severity};
use crate::bag::{RecordKind, DATA_DIR};
use crate::core::checksum::calculate_checksum;
use crate::core::paths::ancestors;
use crate::error::Result;
use preserv_core_manifest::multibag::{FILE_LOOKUP_FILE, MEMBER_BAGS_FILE};
use preserv_core_manifest::BagName;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

const fn rule(
    name: &'static str,
    label: &'static str,
    severity: Severity,
    spec: &'static str,
    check: super::CheckFn,
) -> RuleDefinition {
    RuleDefinition {
        name,
        label,
        severity,
        spec,
        set: RuleSet::Profile,
        check,
    }
}

pub static RULES: &[RuleDefinition] = &[
    rule("name_grammar", "P1-1", Severity::Error, "Bag name must follow {aipid}.{version}.mbag{M}_{m}-{seq}", name_grammar),
    rule("name_profile_version", "P1-2", Severity::Error, "Bag name must carry the expected profile version", name_profile_version),
    rule("info_required_groups", "P2-1", Severity::Error, "bag-info.txt must carry each required field combination", info_required_groups),
    rule("info_contact_email", "P2-2", Severity::Error, "Contact-Email values must be email addresses", info_contact_email),
    rule("info_profile_version", "P2-3", Severity::Error, "bag-info.txt must declare the expected Profile-Version", info_profile_version),
    rule("info_bag_count", "P2-4", Severity::Error, "Bag-Count must read '<n> of <N>'", info_bag_count),
    rule("info_multibag_fields", "P2-5", Severity::Error, "A head bag must declare Multibag-Version, Multibag-Tag-Directory and Multibag-Head-Version", info_multibag_fields),
    rule("metadata_dir_exists", "P3-1", Severity::Error, "A bag carrying metadata must have a metadata/ directory", metadata_dir_exists),
    rule("resource_record_exists", "P3-2", Severity::Error, "metadata/record.json must describe the resource", resource_record_exists),
    rule("records_valid", "P3-3", Severity::Error, "Every record file must be valid JSON conforming to the record schema", records_valid),
    rule("content_records_exist", "P3-4", Severity::Error, "Every content path must have a record", content_records_exist),
    rule("content_records_consistent", "P3-5", Severity::Error, "Data file records must match their file's kind, size and checksum", content_records_consistent),
    rule("subcollection_members", "P3-6", Severity::Error, "hasMember must list exactly the children one level below", subcollection_members),
    rule("multibag_ledgers", "P4-1", Severity::Error, "A head bag must carry member-bags.tsv and file-lookup.tsv", multibag_ledgers),
    rule("member_list_head_last", "P4-2", Severity::Error, "The member list must name each bag once, with the head bag last", member_list_head_last),
    rule("lookup_syntax", "P4-3", Severity::Error, "Each lookup line must be '<path>\\t<bag-name>'", lookup_syntax),
    rule("lookup_members", "P4-4", Severity::Error, "Every lookup owner must be a listed member", lookup_members),
    rule("lookup_covers_local", "P4-5", Severity::Error, "Content files in the head bag and lookup entries naming the head bag must agree", lookup_covers_local),
    rule("lookup_unique", "P4-6", Severity::Error, "Each content path must appear in the lookup table once", lookup_unique),
];

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

/// `<n> of <N>`
fn parse_bag_count(value: &str) -> Option<(u64, u64)> {
    let (n, total) = value.split_once(" of ")?;
    let n = n.trim().parse().ok()?;
    let total = total.trim().parse().ok()?;
    (n >= 1 && n <= total).then_some((n, total))
}

/// Non-head member of a series of more than one bag
fn is_non_head_member(ctx: &RuleContext<'_>) -> Result<bool> {
    if ctx.bag.is_head_bag() {
        return Ok(false);
    }
    let info = ctx.bag.info()?;
    Ok(info
        .tags
        .first("Bag-Count")
        .and_then(parse_bag_count)
        .is_some_and(|(_, total)| total > 1))
}

/// Content paths the metadata describes; `None` for non-head members
fn content_universe(ctx: &RuleContext<'_>) -> Result<Option<BTreeSet<String>>> {
    if is_non_head_member(ctx)? {
        return Ok(None);
    }
    let prefix = format!("{}/", DATA_DIR);
    let mut paths: BTreeSet<String> = ctx.bag.content_paths()?.into_iter().collect();
    if let Some(index) = ctx.bag.multibag_index()? {
        for (path, _) in &index.lookup.entries {
            if let Some(rel) = path.strip_prefix(&prefix) {
                paths.insert(rel.to_string());
            }
        }
    }
    Ok(Some(paths))
}

/// Content files plus every directory above them, `""` included
fn with_ancestors(files: &BTreeSet<String>) -> BTreeMap<String, RecordKind> {
    let mut nodes = BTreeMap::new();
    for file in files {
        nodes.insert(file.clone(), RecordKind::DataFile);
        for dir in ancestors(file) {
            let kind = if dir.is_empty() {
                RecordKind::Resource
            } else {
                RecordKind::Subcollection
            };
            nodes.entry(dir.to_string()).or_insert(kind);
        }
    }
    nodes.entry(String::new()).or_insert(RecordKind::Resource);
    nodes
}

fn name_grammar(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(match BagName::parse(ctx.bag.name()) {
        Err(_) => vec![format!("'{}' does not follow the naming grammar", ctx.bag.name())],
        Ok(name) if !name.is_versioned() && !ctx.config.allow_unversioned_names => {
            vec![format!("'{}' carries no version", ctx.bag.name())]
        }
        Ok(_) => Vec::new(),
    })
}

fn name_profile_version(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Ok(name) = BagName::parse(ctx.bag.name()) else {
        return Ok(Vec::new());
    };
    let found = name.profile_version();
    Ok(if found == ctx.config.profile_version {
        Vec::new()
    } else {
        vec![format!(
            "name declares profile {} but {} is expected",
            found, ctx.config.profile_version
        )]
    })
}

fn info_required_groups(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let info = ctx.bag.info()?.tags;
    Ok(ctx
        .config
        .required_info_groups
        .iter()
        .filter_map(|group| {
            let missing: Vec<&str> = group
                .iter()
                .map(String::as_str)
                .filter(|f| info.values(f).iter().all(|v| v.trim().is_empty()))
                .collect();
            (!missing.is_empty()).then(|| {
                format!(
                    "missing {} (required together: {})",
                    missing.join(", "),
                    group.join(", ")
                )
            })
        })
        .collect())
}

fn info_contact_email(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let info = ctx.bag.info()?.tags;
    let Some(pattern) = email_pattern() else {
        return Ok(vec!["email pattern failed to compile".to_string()]);
    };
    Ok(info
        .values("Contact-Email")
        .into_iter()
        .filter(|v| !pattern.is_match(v.trim()))
        .map(|v| format!("Contact-Email '{}' is not an email address", v))
        .collect())
}

fn info_profile_version(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let info = ctx.bag.info()?.tags;
    Ok(match info.first("Profile-Version") {
        None => vec!["Profile-Version is missing".to_string()],
        Some(v) if v.trim() != ctx.config.profile_version => vec![format!(
            "Profile-Version is {} but {} is expected",
            v, ctx.config.profile_version
        )],
        Some(_) => Vec::new(),
    })
}

fn info_bag_count(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let info = ctx.bag.info()?.tags;
    Ok(info
        .values("Bag-Count")
        .into_iter()
        .filter(|v| parse_bag_count(v).is_none())
        .map(|v| format!("Bag-Count '{}' is not '<n> of <N>'", v))
        .collect())
}

fn info_multibag_fields(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    if !ctx.bag.is_head_bag() {
        return Ok(Vec::new());
    }
    let info = ctx.bag.info()?.tags;
    let mut offenses = Vec::new();
    for field in ["Multibag-Version", "Multibag-Head-Version"] {
        if info.first(field).is_none() {
            offenses.push(format!("{} is missing", field));
        }
    }
    match info.first("Multibag-Tag-Directory") {
        None => offenses.push("Multibag-Tag-Directory is missing".to_string()),
        Some(dir) if dir.trim() != preserv_core_manifest::multibag::MULTIBAG_DIR => {
            offenses.push(format!("Multibag-Tag-Directory is '{}', not 'multibag'", dir))
        }
        Some(_) => {}
    }
    Ok(offenses)
}

fn metadata_dir_exists(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    if is_non_head_member(ctx)? {
        return Ok(Vec::new());
    }
    Ok(if ctx.bag.metadata_dir().is_dir() {
        Vec::new()
    } else {
        vec!["metadata/ directory is missing".to_string()]
    })
}

fn resource_record_exists(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    if is_non_head_member(ctx)? {
        return Ok(Vec::new());
    }
    Ok(if ctx.bag.has_record("") {
        Vec::new()
    } else {
        vec!["metadata/record.json is missing".to_string()]
    })
}

fn records_valid(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let schema = ctx.schema()?;
    let mut offenses = Vec::new();
    for path in ctx.bag.record_paths()? {
        let file = ctx.bag.record_file(&path);
        let text = std::fs::read_to_string(&file)?;
        let shown = if path.is_empty() { "(resource)" } else { path.as_str() };
        match serde_json::from_str::<serde_json::Value>(&text) {
            Err(e) => offenses.push(format!("record for {} is not valid JSON: {}", shown, e)),
            Ok(value) => {
                let violations = schema.violations(&value);
                if !violations.is_empty() {
                    offenses.push(format!(
                        "record for {} violates the schema: {}",
                        shown,
                        violations.join("; ")
                    ));
                }
            }
        }
    }
    Ok(offenses)
}

fn content_records_exist(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(files) = content_universe(ctx)? else {
        return Ok(Vec::new());
    };
    Ok(with_ancestors(&files)
        .keys()
        .filter(|p| !p.is_empty() && !ctx.bag.has_record(p))
        .map(|p| format!("{} has no record", p))
        .collect())
}

fn content_records_consistent(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(files) = content_universe(ctx)? else {
        return Ok(Vec::new());
    };
    let nodes = with_ancestors(&files);
    let mut offenses = Vec::new();
    for path in ctx.bag.record_paths()? {
        // Malformed records are reported by records_valid
        let Ok(record) = ctx.bag.record(&path) else {
            continue;
        };
        let Some(expected) = nodes.get(&path) else {
            offenses.push(format!("record for {} describes no content", path));
            continue;
        };
        if record.kind != *expected {
            offenses.push(format!(
                "record for {} is {:?} but the content is {:?}",
                path, record.kind, expected
            ));
            continue;
        }
        let full = ctx.bag.content_path(&path);
        if record.kind != RecordKind::DataFile || !full.is_file() {
            continue;
        }
        let size = std::fs::metadata(&full)?.len();
        if record.size != Some(size) {
            offenses.push(format!(
                "record for {} has size {:?}, file has {}",
                path, record.size, size
            ));
        }
        if let Some(checksum) = &record.checksum {
            let actual = calculate_checksum(&full, checksum.algorithm)?;
            if actual != checksum.hash {
                offenses.push(format!("record for {} has a stale checksum", path));
            }
        }
    }
    Ok(offenses)
}

fn subcollection_members(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(files) = content_universe(ctx)? else {
        return Ok(Vec::new());
    };
    let nodes = with_ancestors(&files);
    let mut children: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for path in nodes.keys().filter(|p| !p.is_empty()) {
        children
            .entry(crate::core::paths::parent(path))
            .or_default()
            .push(path.clone());
    }

    let mut offenses = Vec::new();
    for (path, kind) in &nodes {
        if *kind == RecordKind::DataFile || !ctx.bag.has_record(path) {
            continue;
        }
        let Ok(record) = ctx.bag.record(path) else {
            continue;
        };
        let expected = children.get(path.as_str()).cloned().unwrap_or_default();
        if record.has_member != expected {
            let shown = if path.is_empty() { "(resource)" } else { path.as_str() };
            offenses.push(format!(
                "hasMember of {} is {:?}, expected {:?}",
                shown, record.has_member, expected
            ));
        }
    }
    Ok(offenses)
}

fn multibag_ledgers(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let declared = ctx.bag.info()?.tags.contains("Multibag-Version");
    let dir = ctx.bag.multibag_dir();
    if !declared && !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok([MEMBER_BAGS_FILE, FILE_LOOKUP_FILE]
        .into_iter()
        .filter(|f| !dir.join(f).is_file())
        .map(|f| format!("multibag/{} is missing", f))
        .collect())
}

fn member_list_head_last(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(index) = ctx.bag.multibag_index()? else {
        return Ok(Vec::new());
    };
    let mut offenses = Vec::new();
    match index.members.last() {
        None => offenses.push("member list is empty".to_string()),
        Some(last) if last != ctx.bag.name() => offenses.push(format!(
            "member list ends with {}, not the head bag {}",
            last,
            ctx.bag.name()
        )),
        Some(_) => {}
    }
    let mut seen = BTreeSet::new();
    for member in &index.members.members {
        if !seen.insert(member.as_str()) {
            offenses.push(format!("{} is listed more than once", member));
        }
    }
    Ok(offenses)
}

fn lookup_syntax(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(index) = ctx.bag.multibag_index()? else {
        return Ok(Vec::new());
    };
    Ok(index
        .lookup_issues
        .iter()
        .map(|i| format!("{} {}", FILE_LOOKUP_FILE, i))
        .collect())
}

fn lookup_members(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(index) = ctx.bag.multibag_index()? else {
        return Ok(Vec::new());
    };
    Ok(index
        .lookup
        .entries
        .iter()
        .filter(|(_, owner)| !index.members.contains(owner))
        .map(|(path, owner)| format!("{} is looked up to unlisted bag {}", path, owner))
        .collect())
}

fn lookup_covers_local(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(index) = ctx.bag.multibag_index()? else {
        return Ok(Vec::new());
    };
    let mut offenses = Vec::new();
    for file in ctx.bag.content_files() {
        let path = file?.bag_path();
        match index.lookup.owner(&path) {
            None => offenses.push(format!("{} is missing from the lookup table", path)),
            Some(owner) if owner != ctx.bag.name() => offenses.push(format!(
                "{} is in the head bag but looked up to {}",
                path, owner
            )),
            Some(_) => {}
        }
    }
    for (path, owner) in &index.lookup.entries {
        if owner != ctx.bag.name() {
            continue;
        }
        let local = path
            .split('/')
            .fold(ctx.bag.root().to_path_buf(), |acc, p| acc.join(p));
        if !path.starts_with(&format!("{}/", DATA_DIR)) || !local.is_file() {
            offenses.push(format!(
                "{} is looked up to the head bag but is not in its content tree",
                path
            ));
        }
    }
    Ok(offenses)
}

fn lookup_unique(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(index) = ctx.bag.multibag_index()? else {
        return Ok(Vec::new());
    };
    Ok(index
        .lookup
        .duplicates()
        .into_iter()
        .map(|p| format!("{} appears more than once", p))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bag_count() {
        assert_eq!(parse_bag_count("2 of 3"), Some((2, 3)));
        assert_eq!(parse_bag_count("4 of 3"), None);
        assert_eq!(parse_bag_count("0 of 3"), None);
        assert_eq!(parse_bag_count("two of three"), None);
    }

    #[test]
    fn test_with_ancestors() {
        let files: BTreeSet<String> = ["a/b/c.txt", "d.txt"].iter().map(|s| s.to_string()).collect();
        let nodes = with_ancestors(&files);
        assert_eq!(nodes.get(""), Some(&RecordKind::Resource));
        assert_eq!(nodes.get("a"), Some(&RecordKind::Subcollection));
        assert_eq!(nodes.get("a/b"), Some(&RecordKind::Subcollection));
        assert_eq!(nodes.get("a/b/c.txt"), Some(&RecordKind::DataFile));
        assert_eq!(nodes.len(), 5);
    }

    #[test]
    fn test_email_pattern() {
        let p = email_pattern().unwrap();
        assert!(p.is_match("ray.plante@example.gov"));
        assert!(!p.is_match("not an email"));
        assert!(!p.is_match("a@b"));
    }
}
