/*!
 * Fault isolation in the validation framework
 */

use assert_fs::prelude::*;

use preserv::validate::{RuleContext, RuleDefinition, RuleSet};
use preserv::{Algorithm, BagBuilder, BuilderConfig, PreservError, Severity, Validator, ValidatorConfig};
use preserv_core_manifest::{ManifestEntry, ManifestKind};

fn finalized(temp: &assert_fs::TempDir) -> BagBuilder {
    temp.child("in/a.txt").write_str("alpha").unwrap();
    temp.child("in/b.txt").write_str("bravo").unwrap();
    let mut builder = BagBuilder::create(
        temp.path().join("bag"),
        BuilderConfig {
            link_content: false,
            ..Default::default()
        },
    )
    .unwrap();
    builder.add_content_file(&temp.path().join("in/a.txt"), "a.txt").unwrap();
    builder.add_content_file(&temp.path().join("in/b.txt"), "b.txt").unwrap();
    builder.finalize().unwrap();
    builder
}

fn exploding(_: &RuleContext<'_>) -> preserv::Result<Vec<String>> {
    panic!("rule blew up")
}

fn unreadable(_: &RuleContext<'_>) -> preserv::Result<Vec<String>> {
    Err(PreservError::Format(preserv_core_manifest::Error::Other("cannot parse".to_string())))
}

#[test]
fn test_corrupt_payload_digest_is_isolated() {
    let temp = assert_fs::TempDir::new().unwrap();
    let builder = finalized(&temp);
    let bag = builder.bag();

    // Swap in a well-formed but wrong digest
    let mut entries = bag
        .manifest(ManifestKind::Payload, Algorithm::Sha256)
        .unwrap()
        .unwrap()
        .entries;
    let target = entries
        .iter_mut()
        .find(|e| e.path == "data/b.txt")
        .unwrap();
    *target = ManifestEntry::new("data/b.txt", Algorithm::Sha256, &"0".repeat(64));
    bag.write_manifest(ManifestKind::Payload, Algorithm::Sha256, &entries)
        .unwrap();

    // The payload manifest is itself a tag file, so its tag digest is stale too
    let validator = Validator::bagit(ValidatorConfig::default());
    let report = validator.validate(bag.root()).unwrap();
    let failed: Vec<&str> = report.errors().iter().map(|i| i.rule.as_str()).collect();
    assert_eq!(failed, vec!["payload_checksums", "tag_checksums"]);
    assert!(report.failures_of("tag_checksums")[0].comments[0].contains("manifest-sha256.txt"));

    // Once the tag manifests are resealed only the payload fault remains
    bag.write_tag_manifests(&[Algorithm::Sha256]).unwrap();
    let report = validator.validate(bag.root()).unwrap();
    let errors = report.errors();
    assert_eq!(errors.len(), 1, "{:#?}", errors);
    assert_eq!(errors[0].rule, "payload_checksums");
    assert!(errors[0].comments.iter().any(|c| c.contains("data/b.txt")));
}

#[test]
fn test_panicking_rule_is_contained() {
    let temp = assert_fs::TempDir::new().unwrap();
    let builder = finalized(&temp);

    let extra = [
        RuleDefinition {
            name: "exploding",
            label: "X-1",
            severity: Severity::Error,
            spec: "never panics",
            set: RuleSet::Profile,
            check: exploding,
        },
        RuleDefinition {
            name: "unreadable",
            label: "X-2",
            severity: Severity::Error,
            spec: "can always read its input",
            set: RuleSet::Profile,
            check: unreadable,
        },
    ];
    let validator = Validator::bagit(ValidatorConfig::default()).with_rules(extra);
    let report = validator.validate(builder.bag().root()).unwrap();

    let panicked = report.failures_of("exploding");
    assert_eq!(panicked.len(), 1);
    assert!(panicked[0].comments[0].contains("rule blew up"));
    let errored = report.failures_of("unreadable");
    assert_eq!(errored.len(), 1);
    assert!(errored[0].comments[0].starts_with("could not evaluate"));

    // Every other rule still ran and passed
    assert_eq!(report.errors().len(), 2);
    assert_eq!(
        report.issues.iter().filter(|i| i.passed).count(),
        validator.rule_names().len() - 2
    );
}

#[test]
fn test_missing_bag_is_the_only_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    assert!(matches!(
        Validator::bagit(ValidatorConfig::default()).validate(&temp.path().join("absent")),
        Err(PreservError::BagNotFound(_))
    ));
}

#[test]
fn test_skip_leaves_rule_out() {
    let temp = assert_fs::TempDir::new().unwrap();
    let builder = finalized(&temp);
    std::fs::remove_file(builder.bag().root().join("bagit.txt")).unwrap();

    let config = ValidatorConfig {
        skip: vec!["bagit_*".to_string()],
        ..Default::default()
    };
    let report = Validator::bagit(config).validate(builder.bag().root()).unwrap();
    assert!(report.issues.iter().all(|i| !i.rule.starts_with("bagit_")));
    // bagit.txt was also listed in the tag manifest
    assert_eq!(report.failures_of("tag_manifest_files_exist").len(), 1);
}
