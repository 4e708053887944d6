//! Write accessors over the bag layout
//!
//! Every file is written to a staging name beside its target and renamed
//! into place, so a reader never sees a half-written manifest or record.

use super::{Bag, DescriptiveRecord};
use crate::core::checksum::calculate_checksums;
use crate::core::link::staging_path;
use crate::error::Result;
use preserv_core_manifest::{
    render_manifest, Algorithm, Declaration, ManifestEntry, ManifestKind, TagFileSet, BAGIT_TXT,
    BAG_INFO_TXT,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Write `contents` to `path` via a staged rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    if let Err(e) = std::fs::write(&staging, contents) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }
    std::fs::rename(&staging, path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        e.into()
    })
}

impl Bag {
    /// Write the two-line `bagit.txt`
    pub fn write_declaration(&self, version: &str) -> Result<()> {
        write_atomic(
            &self.root().join(BAGIT_TXT),
            Declaration::render(version).as_bytes(),
        )
    }

    pub fn write_info(&self, tags: &TagFileSet) -> Result<()> {
        write_atomic(&self.root().join(BAG_INFO_TXT), tags.to_text().as_bytes())
    }

    /// Write (or replace) the record file for a content path
    pub fn write_record(&self, path: &str, record: &DescriptiveRecord) -> Result<()> {
        write_atomic(&self.record_file(path), record.to_json()?.as_bytes())
    }

    /// Write one manifest file, entries sorted by path
    pub fn write_manifest(
        &self,
        kind: ManifestKind,
        algorithm: Algorithm,
        entries: &[ManifestEntry],
    ) -> Result<()> {
        let name = match kind {
            ManifestKind::Payload => algorithm.manifest_name(),
            ManifestKind::Tag => algorithm.tagmanifest_name(),
        };
        debug!(bag = %self.name(), manifest = %name, entries = entries.len(), "writing manifest");
        write_atomic(&self.root().join(name), render_manifest(entries).as_bytes())
    }

    /// Write text to a file at a bag-relative path
    pub fn write_tag_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = rel
            .split('/')
            .fold(self.root().to_path_buf(), |acc, part| acc.join(part));
        write_atomic(&path, contents.as_bytes())
    }

    /// Digest every tag file and write one tag manifest per algorithm.
    ///
    /// Stale tag manifests for algorithms not in `algorithms` are removed.
    pub fn write_tag_manifests(&self, algorithms: &[Algorithm]) -> Result<()> {
        let mut entries: BTreeMap<Algorithm, Vec<ManifestEntry>> = BTreeMap::new();
        for rel in self.tag_files()? {
            let path = rel
                .split('/')
                .fold(self.root().to_path_buf(), |acc, part| acc.join(part));
            let digests = calculate_checksums(&path, algorithms)?;
            for (alg, digest) in digests.digests {
                entries
                    .entry(alg)
                    .or_default()
                    .push(ManifestEntry::new(rel.clone(), alg, digest));
            }
        }

        for alg in self.manifest_algorithms(ManifestKind::Tag)? {
            if !algorithms.contains(&alg) {
                std::fs::remove_file(self.root().join(alg.tagmanifest_name()))?;
            }
        }
        for alg in algorithms {
            let list = entries.remove(alg).unwrap_or_default();
            self.write_manifest(ManifestKind::Tag, *alg, &list)?;
        }
        Ok(())
    }
}
