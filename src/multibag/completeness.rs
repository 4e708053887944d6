//! Post-split completeness check
//!
//! Every content path of the original must show up in exactly one member's
//! payload manifest with the original digest. All offenders are collected
//! before failing.

use crate::bag::Bag;
use crate::collab::RemoteAvailability;
use crate::error::{PreservError, Result};
use preserv_core_manifest::{Algorithm, ManifestKind};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Offending paths found by [`verify_complete`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completeness {
    pub missing: Vec<String>,
    pub duplicated: Vec<String>,
    pub mismatched: Vec<String>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty() && self.mismatched.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        Err(PreservError::IncompleteSplit {
            missing: self.missing,
            duplicated: self.duplicated,
            mismatched: self.mismatched,
        })
    }
}

/// Digests of the original, from its manifest or computed when it has none
fn original_digests(original: &Bag) -> Result<(Algorithm, BTreeMap<String, String>)> {
    if let Some(alg) = original
        .manifest_algorithms(ManifestKind::Payload)?
        .into_iter()
        .next()
    {
        if let Some(manifest) = original.manifest(ManifestKind::Payload, alg)? {
            let digests = manifest
                .entries
                .into_iter()
                .map(|e| (e.path, e.digest))
                .collect();
            return Ok((alg, digests));
        }
    }

    debug!(bag = %original.name(), "no payload manifest; computing digests for completeness check");
    let alg = Algorithm::Sha256;
    let digests = original
        .compute_payload_digests(&[alg])?
        .into_iter()
        .filter_map(|(path, d)| d.get(alg).map(|h| (path, h.to_string())))
        .collect();
    Ok((alg, digests))
}

/// Compare the original's content against the members' payload manifests
pub fn check_completeness(
    original: &Bag,
    members: &[Bag],
    remote: Option<&dyn RemoteAvailability>,
) -> Result<Completeness> {
    let (alg, expected) = original_digests(original)?;

    let mut found: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for member in members {
        let Some(manifest) = member.manifest(ManifestKind::Payload, alg)? else {
            warn!(bag = %member.name(), algorithm = %alg.as_str(), "member has no payload manifest");
            continue;
        };
        for entry in manifest.entries {
            found
                .entry(entry.path)
                .or_default()
                .push((member.name().to_string(), entry.digest));
        }
    }

    let fetch = original.fetch()?;
    let mut result = Completeness::default();
    for (path, digest) in &expected {
        match found.get(path).map(Vec::as_slice) {
            None | Some([]) => {
                let remote_ok = fetch
                    .entries
                    .iter()
                    .find(|e| &e.path == path)
                    .is_some_and(|e| remote.map_or(true, |r| r.is_available(e)));
                if remote_ok {
                    debug!(path = %path, "missing locally but available by fetch reference");
                } else {
                    result.missing.push(path.clone());
                }
            }
            Some([(_, got)]) => {
                if got != digest {
                    result.mismatched.push(path.clone());
                }
            }
            Some(_) => result.duplicated.push(path.clone()),
        }
    }

    for path in found.keys().filter(|p| !expected.contains_key(*p)) {
        warn!(path = %path, "member manifest lists a path absent from the original");
    }

    if !result.is_complete() {
        warn!(
            bag = %original.name(),
            missing = result.missing.len(),
            duplicated = result.duplicated.len(),
            mismatched = result.mismatched.len(),
            "split is incomplete"
        );
    }
    Ok(result)
}

/// Fail with `IncompleteSplit` listing every offending path
pub fn verify_complete(
    original: &Bag,
    members: &[Bag],
    remote: Option<&dyn RemoteAvailability>,
) -> Result<()> {
    check_completeness(original, members, remote)?.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checksum::hex_digest;
    use preserv_core_manifest::{FetchEntry, ManifestEntry};
    use tempfile::tempdir;

    fn bag_with_manifest(root: &std::path::Path, files: &[(&str, &[u8])]) -> Bag {
        let bag = Bag::create(root).unwrap();
        let mut entries = Vec::new();
        for (path, bytes) in files {
            std::fs::write(bag.content_path(path), bytes).unwrap();
            entries.push(ManifestEntry::new(
                format!("data/{}", path),
                Algorithm::Sha256,
                hex_digest(bytes, Algorithm::Sha256),
            ));
        }
        bag.write_manifest(ManifestKind::Payload, Algorithm::Sha256, &entries)
            .unwrap();
        bag
    }

    struct Nowhere;

    impl RemoteAvailability for Nowhere {
        fn is_available(&self, _entry: &FetchEntry) -> bool {
            false
        }
    }

    #[test]
    fn test_complete_split() {
        let dir = tempdir().unwrap();
        let original = bag_with_manifest(&dir.path().join("o"), &[("a", b"a"), ("b", b"b")]);
        let m0 = bag_with_manifest(&dir.path().join("m0"), &[("a", b"a")]);
        let m1 = bag_with_manifest(&dir.path().join("m1"), &[("b", b"b")]);
        assert!(verify_complete(&original, &[m0, m1], None).is_ok());
    }

    #[test]
    fn test_collects_every_offender() {
        let dir = tempdir().unwrap();
        let original = bag_with_manifest(
            &dir.path().join("o"),
            &[("a", b"a"), ("b", b"b"), ("c", b"c"), ("d", b"d")],
        );
        let m0 = bag_with_manifest(&dir.path().join("m0"), &[("a", b"a"), ("b", b"B")]);
        let m1 = bag_with_manifest(&dir.path().join("m1"), &[("a", b"a")]);

        match verify_complete(&original, &[m0, m1], None) {
            Err(PreservError::IncompleteSplit {
                missing,
                duplicated,
                mismatched,
            }) => {
                assert_eq!(missing, vec!["data/c", "data/d"]);
                assert_eq!(duplicated, vec!["data/a"]);
                assert_eq!(mismatched, vec!["data/b"]);
            }
            other => panic!("expected IncompleteSplit, got {:?}", other),
        }
    }

    #[test]
    fn test_fetched_path_needs_remote_confirmation() {
        let dir = tempdir().unwrap();
        let original = bag_with_manifest(&dir.path().join("o"), &[("a", b"a"), ("r", b"r")]);
        std::fs::write(
            original.root().join("fetch.txt"),
            "https://example.org/r 1 data/r\n",
        )
        .unwrap();
        let m0 = bag_with_manifest(&dir.path().join("m0"), &[("a", b"a")]);
        let members = [m0];

        assert!(verify_complete(&original, &members, None).is_ok());
        let report = check_completeness(&original, &members, Some(&Nowhere)).unwrap();
        assert_eq!(report.missing, vec!["data/r"]);
    }

    #[test]
    fn test_original_without_manifest() {
        let dir = tempdir().unwrap();
        let original = Bag::create(dir.path().join("o")).unwrap();
        std::fs::write(original.content_path("a"), b"a").unwrap();
        let m0 = bag_with_manifest(&dir.path().join("m0"), &[("a", b"a")]);
        assert!(verify_complete(&original, &[m0], None).is_ok());
    }
}
