//! Packaging-format rules
//!
//! Labels follow the section numbering of the packaging format: 2.1.x for
//! required elements, 2.2.x for tag files.

use super::{RuleContext, RuleDefinition, RuleSet, Severity};
use crate::error::Result;
use preserv_core_manifest::tagfile::SUPPORTED_BAGIT_VERSIONS;
use preserv_core_manifest::{LineIssueKind, ManifestKind, ParsedManifest, BAG_INFO_TXT};
use std::collections::BTreeSet;

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
        set: RuleSet::BagIt,
        check,
    }
}

pub static RULES: &[RuleDefinition] = &[
    rule("bagit_txt_exists", "2.1.1-1", Severity::Error, "A bag must contain a bagit.txt file", bagit_txt_exists),
    rule("bagit_version_present", "2.1.1-2", Severity::Error, "bagit.txt must declare a supported BagIt-Version", bagit_version_present),
    rule("bagit_version_unique", "2.1.1-3", Severity::Error, "bagit.txt must declare BagIt-Version only once", bagit_version_unique),
    rule("bagit_encoding_present", "2.1.1-4", Severity::Error, "bagit.txt must declare Tag-File-Character-Encoding: UTF-8", bagit_encoding_present),
    rule("bagit_encoding_unique", "2.1.1-5", Severity::Error, "bagit.txt must declare Tag-File-Character-Encoding only once", bagit_encoding_unique),
    rule("bagit_no_extra_lines", "2.1.1-6", Severity::Error, "bagit.txt must contain only the two declaration lines", bagit_no_extra_lines),
    rule("data_dir_exists", "2.1.2-1", Severity::Error, "A bag must contain a data directory", data_dir_exists),
    rule("payload_manifest_exists", "2.1.3-1", Severity::Error, "A bag must contain at least one payload manifest", payload_manifest_exists),
    rule("payload_manifest_syntax", "2.1.3-2", Severity::Error, "Each payload manifest line must be '<digest>  <path>'", payload_manifest_syntax),
    rule("payload_manifest_files_exist", "2.1.3-3", Severity::Error, "Every file listed in a payload manifest must exist", payload_manifest_files_exist),
    rule("payload_checksums", "2.1.3-4", Severity::Error, "Every payload manifest digest must match its file", payload_checksums),
    rule("payload_files_listed", "2.1.3-5", Severity::Error, "Every payload file must be listed in every payload manifest", payload_files_listed),
    rule("tag_manifest_syntax", "2.2.1-1", Severity::Error, "Each tag manifest line must be '<digest>  <path>'", tag_manifest_syntax),
    rule("tag_manifest_files_exist", "2.2.1-2", Severity::Error, "Every file listed in a tag manifest must exist", tag_manifest_files_exist),
    rule("tag_checksums", "2.2.1-3", Severity::Error, "Every tag manifest digest must match its file", tag_checksums),
    rule("tag_files_listed", "2.2.1-4", Severity::Error, "Every tag file must be listed in every tag manifest", tag_files_listed),
    rule("bag_info_syntax", "2.2.2-1", Severity::Error, "Each bag-info.txt line must be 'Name: value' or an indented continuation", bag_info_syntax),
    rule("bag_info_nonempty", "2.2.2-2", Severity::Recommendation, "A bag should carry a non-empty bag-info.txt", bag_info_nonempty),
    rule("payload_oxum", "2.2.2-3", Severity::Error, "Payload-Oxum, when present, must match the payload", payload_oxum),
    rule("fetch_field_count", "2.2.3-1", Severity::Error, "Each fetch.txt line must be '<url> <size> <path>'", fetch_field_count),
    rule("fetch_size_numeric", "2.2.3-2", Severity::Error, "Each fetch.txt size must be a number or '-'", fetch_size_numeric),
    rule("fetch_path_in_data", "2.2.3-3", Severity::Error, "Each fetch.txt path must point into data/", fetch_path_in_data),
];

fn bagit_txt_exists(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(match ctx.bag.declaration()? {
        Some(_) => Vec::new(),
        None => vec!["bagit.txt is missing".to_string()],
    })
}

fn bagit_version_present(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(decl) = ctx.bag.declaration()? else {
        return Ok(Vec::new());
    };
    Ok(match decl.version() {
        None => vec!["BagIt-Version is not declared".to_string()],
        Some(v) if !SUPPORTED_BAGIT_VERSIONS.contains(&v) => {
            vec![format!("unsupported BagIt-Version '{}'", v)]
        }
        Some(_) => Vec::new(),
    })
}

fn bagit_version_unique(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(decl) = ctx.bag.declaration()? else {
        return Ok(Vec::new());
    };
    Ok(if decl.versions.len() > 1 {
        vec![format!(
            "BagIt-Version declared {} times",
            decl.versions.len()
        )]
    } else {
        Vec::new()
    })
}

fn bagit_encoding_present(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(decl) = ctx.bag.declaration()? else {
        return Ok(Vec::new());
    };
    Ok(match decl.encoding() {
        None => vec!["Tag-File-Character-Encoding is not declared".to_string()],
        Some(e) if !e.eq_ignore_ascii_case("UTF-8") => {
            vec![format!("unsupported tag-file encoding '{}'", e)]
        }
        Some(_) => Vec::new(),
    })
}

fn bagit_encoding_unique(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(decl) = ctx.bag.declaration()? else {
        return Ok(Vec::new());
    };
    Ok(if decl.encodings.len() > 1 {
        vec![format!(
            "Tag-File-Character-Encoding declared {} times",
            decl.encodings.len()
        )]
    } else {
        Vec::new()
    })
}

fn bagit_no_extra_lines(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let Some(decl) = ctx.bag.declaration()? else {
        return Ok(Vec::new());
    };
    Ok(decl
        .unrecognized
        .iter()
        .map(|(line, text)| format!("bagit.txt line {}: unrecognized {:?}", line, text))
        .collect())
}

fn data_dir_exists(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(if ctx.bag.data_dir().is_dir() {
        Vec::new()
    } else {
        vec!["data/ directory is missing".to_string()]
    })
}

/// Every manifest of one kind, with its file name
fn manifests(ctx: &RuleContext<'_>, kind: ManifestKind) -> Result<Vec<(String, ParsedManifest)>> {
    let mut out = Vec::new();
    for alg in ctx.bag.manifest_algorithms(kind)? {
        if let Some(manifest) = ctx.bag.manifest(kind, alg)? {
            let name = match kind {
                ManifestKind::Payload => alg.manifest_name(),
                ManifestKind::Tag => alg.tagmanifest_name(),
            };
            out.push((name, manifest));
        }
    }
    Ok(out)
}

fn payload_manifest_exists(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(if ctx.bag.manifest_algorithms(ManifestKind::Payload)?.is_empty() {
        vec!["no manifest-<algorithm>.txt found".to_string()]
    } else {
        Vec::new()
    })
}

fn manifest_syntax(ctx: &RuleContext<'_>, kind: ManifestKind) -> Result<Vec<String>> {
    let mut offenses = Vec::new();
    for (name, manifest) in manifests(ctx, kind)? {
        for issue in &manifest.issues {
            offenses.push(format!("{} {}", name, issue));
        }
    }
    Ok(offenses)
}

fn payload_manifest_syntax(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    manifest_syntax(ctx, ManifestKind::Payload)
}

fn tag_manifest_syntax(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    manifest_syntax(ctx, ManifestKind::Tag)
}

fn bag_path_is_file(ctx: &RuleContext<'_>, rel: &str) -> bool {
    rel.split('/')
        .fold(ctx.bag.root().to_path_buf(), |acc, p| acc.join(p))
        .is_file()
}

fn payload_manifest_files_exist(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let fetch = ctx.bag.fetch()?;
    let mut offenses = Vec::new();
    for (name, manifest) in manifests(ctx, ManifestKind::Payload)? {
        for entry in &manifest.entries {
            if !bag_path_is_file(ctx, &entry.path) && !fetch.contains_path(&entry.path) {
                offenses.push(format!("{}: {} does not exist", name, entry.path));
            }
        }
    }
    Ok(offenses)
}

fn tag_manifest_files_exist(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let mut offenses = Vec::new();
    for (name, manifest) in manifests(ctx, ManifestKind::Tag)? {
        for entry in &manifest.entries {
            if !bag_path_is_file(ctx, &entry.path) {
                offenses.push(format!("{}: {} does not exist", name, entry.path));
            }
        }
    }
    Ok(offenses)
}

fn payload_checksums(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let digests = ctx.payload_digests()?;
    let mut offenses = Vec::new();
    for (name, manifest) in manifests(ctx, ManifestKind::Payload)? {
        for entry in &manifest.entries {
            let Some(actual) = digests.get(&entry.path).and_then(|d| d.get(entry.algorithm)) else {
                continue;
            };
            if !actual.eq_ignore_ascii_case(&entry.digest) {
                offenses.push(format!(
                    "{}: checksum mismatch for {} (expected {}, found {})",
                    name, entry.path, entry.digest, actual
                ));
            }
        }
    }
    Ok(offenses)
}

fn tag_checksums(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let mut offenses = Vec::new();
    for (name, manifest) in manifests(ctx, ManifestKind::Tag)? {
        for entry in &manifest.entries {
            let path = entry
                .path
                .split('/')
                .fold(ctx.bag.root().to_path_buf(), |acc, p| acc.join(p));
            if !path.is_file() {
                continue;
            }
            let actual = crate::core::checksum::calculate_checksum(&path, entry.algorithm)?;
            if !actual.eq_ignore_ascii_case(&entry.digest) {
                offenses.push(format!(
                    "{}: checksum mismatch for {} (expected {}, found {})",
                    name, entry.path, entry.digest, actual
                ));
            }
        }
    }
    Ok(offenses)
}

fn payload_files_listed(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let mut offenses = Vec::new();
    let manifests = manifests(ctx, ManifestKind::Payload)?;
    if manifests.is_empty() {
        return Ok(offenses);
    }
    let listed: Vec<(String, BTreeSet<&str>)> = manifests
        .iter()
        .map(|(name, m)| (name.clone(), m.entries.iter().map(|e| e.path.as_str()).collect()))
        .collect();
    for file in ctx.bag.content_files() {
        let path = file?.bag_path();
        for (name, paths) in &listed {
            if !paths.contains(path.as_str()) {
                offenses.push(format!("{} is not listed in {}", path, name));
            }
        }
    }
    Ok(offenses)
}

fn tag_files_listed(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let mut offenses = Vec::new();
    let manifests = manifests(ctx, ManifestKind::Tag)?;
    if manifests.is_empty() {
        return Ok(offenses);
    }
    let tag_files = ctx.bag.tag_files()?;
    for (name, manifest) in &manifests {
        let listed: BTreeSet<&str> = manifest.entries.iter().map(|e| e.path.as_str()).collect();
        for path in &tag_files {
            if !listed.contains(path.as_str()) {
                offenses.push(format!("{} is not listed in {}", path, name));
            }
        }
    }
    Ok(offenses)
}

fn bag_info_syntax(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(ctx
        .bag
        .info()?
        .issues
        .iter()
        .map(|issue| format!("{} {}", BAG_INFO_TXT, issue))
        .collect())
}

fn bag_info_nonempty(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(if ctx.bag.info()?.tags.is_empty() {
        vec!["bag-info.txt is missing or has no fields".to_string()]
    } else {
        Vec::new()
    })
}

fn payload_oxum(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    let info = ctx.bag.info()?;
    let Some(declared) = info.tags.first("Payload-Oxum") else {
        return Ok(Vec::new());
    };
    let (octets, count) = ctx.bag.payload_oxum()?;
    let actual = format!("{}.{}", octets, count);
    Ok(if declared.trim() == actual {
        Vec::new()
    } else {
        vec![format!(
            "Payload-Oxum is {} but the payload is {}",
            declared, actual
        )]
    })
}

fn fetch_issues(ctx: &RuleContext<'_>, kind: LineIssueKind) -> Result<Vec<String>> {
    Ok(ctx
        .bag
        .fetch()?
        .issues
        .iter()
        .filter(|i| i.kind == kind)
        .map(|i| format!("fetch.txt {}", i))
        .collect())
}

fn fetch_field_count(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    fetch_issues(ctx, LineIssueKind::WrongFieldCount)
}

fn fetch_size_numeric(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    fetch_issues(ctx, LineIssueKind::NonNumericSize)
}

fn fetch_path_in_data(ctx: &RuleContext<'_>) -> Result<Vec<String>> {
    Ok(ctx
        .bag
        .fetch()?
        .entries
        .iter()
        .filter(|e| !e.path.starts_with("data/") || e.path.split('/').any(|p| p == ".."))
        .map(|e| format!("fetch.txt path {} is outside data/", e.path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::Bag;
    use crate::config::{BuilderConfig, ValidatorConfig};
    use crate::validate::Validator;
    use crate::BagBuilder;
    use tempfile::tempdir;

    fn finalized_bag(dir: &std::path::Path) -> Bag {
        let source = dir.join("src.txt");
        std::fs::write(&source, b"content").unwrap();
        let mut builder = BagBuilder::create(dir.join("b"), BuilderConfig::default()).unwrap();
        builder.add_content_file(&source, "f.txt").unwrap();
        builder.finalize().unwrap();
        builder.bag().clone()
    }

    fn run(bag: &Bag) -> crate::validate::ValidationReport {
        Validator::bagit(ValidatorConfig::default())
            .validate(bag.root())
            .unwrap()
    }

    #[test]
    fn test_finalized_bag_passes() {
        let dir = tempdir().unwrap();
        let bag = finalized_bag(dir.path());
        let report = run(&bag);
        assert!(report.failed().is_empty(), "{:?}", report.failed());
        assert_eq!(report.issues.len(), RULES.len());
    }

    #[test]
    fn test_declaration_faults_are_distinct() {
        let dir = tempdir().unwrap();
        let bag = finalized_bag(dir.path());
        std::fs::write(
            bag.root().join("bagit.txt"),
            "BagIt-Version: 1.0\nBagIt-Version: 1.0\nextra\n",
        )
        .unwrap();
        bag.write_tag_manifests(&[preserv_core_manifest::Algorithm::Sha256])
            .unwrap();
        let report = run(&bag);
        let failed: Vec<&str> = report.failed().iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(
            failed,
            vec![
                "bagit_version_unique",
                "bagit_encoding_present",
                "bagit_no_extra_lines"
            ]
        );
    }

    #[test]
    fn test_unlisted_and_missing_files() {
        let dir = tempdir().unwrap();
        let bag = finalized_bag(dir.path());
        std::fs::write(bag.content_path("extra.txt"), b"new").unwrap();
        std::fs::remove_file(bag.content_path("f.txt")).unwrap();
        let report = run(&bag);
        assert_eq!(report.failures_of("payload_files_listed").len(), 1);
        assert_eq!(report.failures_of("payload_manifest_files_exist").len(), 1);
        assert_eq!(report.failures_of("payload_oxum").len(), 1);
        assert!(report.failures_of("payload_checksums").is_empty());
    }

    #[test]
    fn test_unlisted_tag_file() {
        let dir = tempdir().unwrap();
        let bag = finalized_bag(dir.path());
        std::fs::write(bag.root().join("about.txt"), b"unlisted").unwrap();
        std::fs::create_dir_all(bag.root().join("extra")).unwrap();
        std::fs::write(bag.root().join("extra").join("notes.txt"), b"nested").unwrap();
        let report = run(&bag);
        let failures = report.failures_of("tag_files_listed");
        assert_eq!(failures.len(), 2);
        assert!(failures[0].comments[0].starts_with("about.txt is not listed"));
        assert!(failures[1].comments[0].starts_with("extra/notes.txt is not listed"));
        assert_eq!(report.failed().len(), 2);

        bag.write_tag_manifests(&[preserv_core_manifest::Algorithm::Sha256])
            .unwrap();
        assert!(run(&bag).failed().is_empty());
    }

    #[test]
    fn test_fetch_faults_are_distinct() {
        let dir = tempdir().unwrap();
        let bag = finalized_bag(dir.path());
        std::fs::write(
            bag.root().join("fetch.txt"),
            "https://x/a 12\nhttps://x/b big data/b\nhttps://x/c 3 ../c\n",
        )
        .unwrap();
        let report = run(&bag);
        assert_eq!(report.failures_of("fetch_field_count").len(), 1);
        assert_eq!(report.failures_of("fetch_size_numeric").len(), 1);
        assert_eq!(report.failures_of("fetch_path_in_data").len(), 1);
    }

    #[test]
    fn test_empty_bag_info_is_only_a_recommendation() {
        let dir = tempdir().unwrap();
        let bag = finalized_bag(dir.path());
        std::fs::write(bag.root().join("bag-info.txt"), "").unwrap();
        bag.write_tag_manifests(&[preserv_core_manifest::Algorithm::Sha256])
            .unwrap();
        let report = run(&bag);
        assert_eq!(report.recommendations().len(), 1);
        assert!(report.is_valid());
    }

    #[test]
    fn test_rule_names_are_unique() {
        let names: BTreeSet<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), RULES.len());
    }
}
