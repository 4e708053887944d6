//! Manifest and tag-file (re)generation

use super::BagBuilder;
use crate::bag::{Checksum, RecordKind, DATA_DIR};
use crate::core::human_size;
use crate::error::{DigestMismatch, PreservError, Result};
use preserv_core_audit::{ProvenanceEvent, ProvenanceType};
use preserv_core_manifest::{Algorithm, ManifestEntry, ManifestKind};
use tracing::{info, warn};

/// Agent string written as `Bag-Software-Agent`
pub const SOFTWARE_AGENT: &str = concat!("preserv/", env!("CARGO_PKG_VERSION"));

/// Summary of one finalize pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    pub payload_files: u64,
    pub payload_bytes: u64,
    pub algorithms: Vec<Algorithm>,
    /// Mismatches overwritten because `force_recompute` was set
    pub recomputed: Vec<DigestMismatch>,
}

impl BagBuilder {
    /// Write payload manifests, `bagit.txt`, `bag-info.txt` and tag manifests.
    ///
    /// Digests that disagree with the existing manifest and were not written
    /// through [`BagBuilder::add_content_file`] fail the whole pass with
    /// `ChecksumMismatch` before anything is written, unless
    /// `force_recompute` is set.
    pub fn finalize(&mut self) -> Result<FinalizeReport> {
        let algorithms = self.config.algorithms.clone();
        let digests = self.bag.compute_payload_digests(&algorithms)?;

        let mut mismatches = Vec::new();
        for alg in self.bag.manifest_algorithms(ManifestKind::Payload)? {
            if !algorithms.contains(&alg) {
                continue;
            }
            let Some(existing) = self.bag.manifest(ManifestKind::Payload, alg)? else {
                continue;
            };
            for entry in &existing.entries {
                let Some(actual) = digests.get(&entry.path).and_then(|d| d.get(alg)) else {
                    continue;
                };
                if actual == entry.digest {
                    continue;
                }
                let confirmed = self
                    .pending
                    .get(&entry.path)
                    .and_then(|p| p.get(alg))
                    .is_some_and(|p| p == actual);
                if !confirmed {
                    mismatches.push(DigestMismatch {
                        path: entry.path.clone(),
                        expected: entry.digest.clone(),
                        actual: actual.to_string(),
                    });
                }
            }
        }

        if !mismatches.is_empty() {
            if !self.config.force_recompute {
                warn!(bag = %self.bag.name(), count = mismatches.len(), "finalize found checksum mismatches");
                return Err(PreservError::ChecksumMismatch { mismatches });
            }
            warn!(bag = %self.bag.name(), count = mismatches.len(), "recomputing mismatched checksums");
        }

        for alg in &algorithms {
            let entries: Vec<ManifestEntry> = digests
                .iter()
                .filter_map(|(path, d)| d.get(*alg).map(|h| ManifestEntry::new(path.clone(), *alg, h)))
                .collect();
            self.bag.write_manifest(ManifestKind::Payload, *alg, &entries)?;
        }
        for alg in self.bag.manifest_algorithms(ManifestKind::Payload)? {
            if !algorithms.contains(&alg) {
                std::fs::remove_file(self.bag.root().join(alg.manifest_name()))?;
            }
        }
        self.bag.write_declaration(&self.config.bagit_version)?;

        // Records of content that changed underneath them
        let primary = self.config.primary_algorithm();
        let prefix = format!("{}/", DATA_DIR);
        for (manifest_path, d) in &digests {
            let path = manifest_path.strip_prefix(&prefix).unwrap_or(manifest_path);
            if !self.bag.has_record(path) {
                continue;
            }
            let mut record = self.bag.record(path)?;
            if record.kind != RecordKind::DataFile {
                continue;
            }
            let checksum = d.get(primary).map(|hash| Checksum {
                algorithm: primary,
                hash: hash.to_string(),
            });
            if record.size != Some(d.size) || record.checksum != checksum {
                record.size = Some(d.size);
                record.checksum = checksum;
                self.bag.write_record(path, &record)?;
            }
        }

        let payload_bytes: u64 = digests.values().map(|d| d.size).sum();
        let payload_files = digests.len() as u64;

        let mut event = ProvenanceEvent::new(ProvenanceType::BagFinalized, self.bag.name())
            .with_bytes(payload_bytes)
            .with_context("files", &payload_files.to_string());
        if !mismatches.is_empty() {
            event = event.with_message(&format!(
                "recomputed {} mismatched checksum(s)",
                mismatches.len()
            ));
        }
        self.log_event(event)?;

        let mut tags = self.bag.info()?.tags;
        for field in &self.config.bag_info {
            if !tags.contains(&field.name) {
                tags.add(field.name.clone(), field.value.clone());
            }
        }
        tags.merge(&self.info);
        tags.set("Bag-Software-Agent", [SOFTWARE_AGENT]);
        tags.set(
            "Bagging-Date",
            [chrono::Utc::now().format("%Y-%m-%d").to_string()],
        );
        tags.set(
            "Payload-Oxum",
            [format!("{}.{}", payload_bytes, payload_files)],
        );
        tags.set("Bag-Size", [human_size(payload_bytes)]);
        tags.set("Profile-Version", [self.config.profile_version.clone()]);
        self.bag.write_info(&tags)?;

        self.bag.write_tag_manifests(&algorithms)?;
        self.pending.clear();

        info!(
            bag = %self.bag.name(),
            files = payload_files,
            bytes = payload_bytes,
            "bag finalized"
        );
        Ok(FinalizeReport {
            payload_files,
            payload_bytes,
            algorithms,
            recomputed: mismatches,
        })
    }
}
