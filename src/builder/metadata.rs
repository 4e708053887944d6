//! Descriptive-record maintenance

use super::{check_record_name, BagBuilder};
use crate::bag::{Checksum, DescriptiveRecord, RecordKind};
use crate::core::checksum::calculate_checksum;
use crate::core::paths::{ancestors, normalize_rel};
use crate::error::{PreservError, Result};
use preserv_core_audit::{ProvenanceEvent, ProvenanceType};
use serde_json::Value;
use tracing::debug;

impl BagBuilder {
    /// Make sure `path` and all its ancestors have records.
    ///
    /// Missing records are created with computed size, checksum and media
    /// type; existing ones only have computed fields and `hasMember`
    /// refreshed. Nothing is written when everything is already current.
    pub fn ensure_metadata_for(&mut self, path: &str) -> Result<()> {
        let path = normalize_rel(path)?;
        check_record_name(&path)?;
        let kind = self
            .bag
            .content_kind(&path)
            .ok_or_else(|| PreservError::ComponentNotFound(path.clone()))?;

        self.ensure_one(&path, kind)?;
        for ancestor in ancestors(&path) {
            let kind = if ancestor.is_empty() {
                RecordKind::Resource
            } else {
                RecordKind::Subcollection
            };
            self.ensure_one(ancestor, kind)?;
        }
        Ok(())
    }

    /// Deep-merge `patch` into the record at `path` and log `message`.
    ///
    /// The resource record (`""`) always exists; any other path must be in
    /// the content tree.
    pub fn update_metadata_for(
        &mut self,
        path: &str,
        patch: &Value,
        message: &str,
    ) -> Result<DescriptiveRecord> {
        let path = normalize_rel(path)?;
        if !path.is_empty() && self.bag.content_kind(&path).is_none() {
            return Err(PreservError::ComponentNotFound(path));
        }
        self.ensure_metadata_for(&path)?;

        let current = self.bag.record(&path)?;
        let merged = current.merged(patch)?;
        if merged != current {
            self.bag.write_record(&path, &merged)?;
        }
        self.log_event(
            ProvenanceEvent::new(ProvenanceType::RecordUpdated, self.bag.name())
                .with_path(&path)
                .with_message(message),
        )?;
        debug!(bag = %self.bag.name(), path = %path, "record updated");
        Ok(merged)
    }

    /// Create or refresh a single record; returns whether it was written
    pub(super) fn ensure_one(&mut self, path: &str, kind: RecordKind) -> Result<bool> {
        let existing = if self.bag.has_record(path) {
            Some(self.bag.record(path)?)
        } else {
            None
        };

        let desired = match &existing {
            Some(record) if record.kind == kind => self.refreshed(record, path)?,
            Some(record) => {
                // Node changed kind; keep caller metadata, rebuild the rest
                let mut fresh = self.fresh(path, kind)?;
                fresh.extra = record.extra.clone();
                fresh
            }
            None => self.fresh(path, kind)?,
        };

        if existing.as_ref() == Some(&desired) {
            return Ok(false);
        }
        self.bag.write_record(path, &desired)?;

        let event_type = if existing.is_some() {
            ProvenanceType::RecordUpdated
        } else {
            ProvenanceType::RecordCreated
        };
        let mut event = ProvenanceEvent::new(event_type, self.bag.name()).with_path(path);
        if existing.is_some() {
            event = event.with_message("refreshed computed fields");
        }
        self.log_event(event)?;
        debug!(bag = %self.bag.name(), path = %path, kind = ?kind, "record written");
        Ok(true)
    }

    fn fresh(&self, path: &str, kind: RecordKind) -> Result<DescriptiveRecord> {
        let mut record = match kind {
            RecordKind::Resource => DescriptiveRecord::resource(self.ids.resource_id()),
            RecordKind::Subcollection => {
                DescriptiveRecord::subcollection(self.ids.file_id(path), path)
            }
            RecordKind::DataFile => {
                let (size, checksum) = self.file_facts(path)?;
                let mut record =
                    DescriptiveRecord::data_file(self.ids.file_id(path), path, size, checksum);
                record.download_url = self.download_url(path);
                record
            }
        };
        if kind != RecordKind::DataFile {
            record.has_member = self.bag.children(path)?;
        }
        Ok(record)
    }

    fn refreshed(&self, record: &DescriptiveRecord, path: &str) -> Result<DescriptiveRecord> {
        let mut record = record.clone();
        match record.kind {
            RecordKind::DataFile => {
                let (size, checksum) = self.file_facts(path)?;
                record.size = Some(size);
                record.checksum = Some(checksum);
            }
            RecordKind::Resource | RecordKind::Subcollection => {
                record.has_member = self.bag.children(path)?;
            }
        }
        Ok(record)
    }

    /// Size and primary-algorithm checksum, from pending digests when fresh
    fn file_facts(&self, path: &str) -> Result<(u64, Checksum)> {
        let algorithm = self.config.primary_algorithm();
        let manifest_path = format!("{}/{}", crate::bag::DATA_DIR, path);
        if let Some(hash) = self
            .pending
            .get(&manifest_path)
            .and_then(|d| d.get(algorithm).map(|h| (d.size, h.to_string())))
        {
            return Ok((hash.0, Checksum { algorithm, hash: hash.1 }));
        }

        let full = self.bag.content_path(path);
        let size = std::fs::metadata(&full)?.len();
        let hash = calculate_checksum(&full, algorithm)?;
        Ok((size, Checksum { algorithm, hash }))
    }

    fn download_url(&self, path: &str) -> Option<String> {
        self.config
            .download_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), path))
    }
}
