//! Adding content files to the bag

use super::{check_record_name, BagBuilder};
use crate::bag::RecordKind;
use crate::core::link::{place_verified, PlaceOptions, Placement};
use crate::core::paths::normalize_rel;
use crate::error::{PreservError, Result};
use preserv_core_audit::{ProvenanceEvent, ProvenanceType};
use std::path::Path;
use tracing::info;

impl BagBuilder {
    /// Link or copy `source` into the content tree at `dest_path`.
    ///
    /// The placed file is re-read and re-hashed before it replaces anything;
    /// its digests are then held as pending for the next finalize. An
    /// existing record for `dest_path` has its computed fields refreshed.
    pub fn add_content_file(&mut self, source: &Path, dest_path: &str) -> Result<Placement> {
        let dest_path = normalize_rel(dest_path)?;
        if dest_path.is_empty() {
            return Err(PreservError::InvalidPath(dest_path));
        }
        check_record_name(&dest_path)?;

        let dest = self.bag.content_path(&dest_path);
        if dest.is_dir() {
            return Err(PreservError::InvalidPath(format!(
                "{} is a directory in the content tree",
                dest_path
            )));
        }

        let options = PlaceOptions {
            link: self.config.link_content,
            copy_on_link_failure: self.config.copy_on_link_failure,
        };
        let placement = place_verified(source, &dest, &self.config.algorithms, options)?;

        let manifest_path = format!("{}/{}", crate::bag::DATA_DIR, dest_path);
        self.pending
            .insert(manifest_path, placement.digests.clone());

        if self.bag.has_record(&dest_path) {
            self.ensure_one(&dest_path, RecordKind::DataFile)?;
        }

        let event_type = if placement.replaced {
            ProvenanceType::ContentReplaced
        } else {
            ProvenanceType::ContentAdded
        };
        let mut event = ProvenanceEvent::new(event_type, self.bag.name())
            .with_path(&dest_path)
            .with_bytes(placement.digests.size)
            .with_context("method", placement.method.as_str());
        if let Some(digest) = placement.digests.get(self.config.primary_algorithm()) {
            event = event.with_digest(digest);
        }
        self.log_event(event)?;

        info!(
            bag = %self.bag.name(),
            path = %dest_path,
            bytes = placement.digests.size,
            method = placement.method.as_str(),
            "content added"
        );
        Ok(placement)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::BagBuilder;
    use crate::config::BuilderConfig;
    use crate::core::link::PlaceMethod;
    use crate::error::PreservError;
    use preserv_core_audit::{parse_provenance_log, ProvenanceType};
    use tempfile::tempdir;

    #[test]
    fn test_add_content_file_links() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("upload.csv");
        std::fs::write(&source, b"a,b\n1,2\n").unwrap();
        let mut builder =
            BagBuilder::create(dir.path().join("b"), BuilderConfig::default()).unwrap();

        let placed = builder.add_content_file(&source, "tables/upload.csv").unwrap();
        assert_eq!(placed.method, PlaceMethod::Hardlink);
        assert_eq!(builder.pending_paths(), vec!["data/tables/upload.csv"]);
        assert_eq!(
            std::fs::read(builder.bag().content_path("tables/upload.csv")).unwrap(),
            b"a,b\n1,2\n"
        );
    }

    #[test]
    fn test_replace_refreshes_record() {
        let dir = tempdir().unwrap();
        let v1 = dir.path().join("v1.txt");
        let v2 = dir.path().join("v2.txt");
        std::fs::write(&v1, b"one").unwrap();
        std::fs::write(&v2, b"three").unwrap();
        let config = BuilderConfig {
            link_content: false,
            ..Default::default()
        };
        let mut builder = BagBuilder::create(dir.path().join("b"), config).unwrap();

        builder.add_content_file(&v1, "notes.txt").unwrap();
        builder.ensure_metadata_for("notes.txt").unwrap();
        let placed = builder.add_content_file(&v2, "notes.txt").unwrap();
        assert!(placed.replaced);
        assert_eq!(placed.method, PlaceMethod::Copy);
        assert_eq!(builder.bag().record("notes.txt").unwrap().size, Some(5));

        let events = parse_provenance_log(builder.bag().provenance_file()).unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == ProvenanceType::ContentReplaced));
    }

    #[test]
    fn test_missing_source_leaves_bag_untouched() {
        let dir = tempdir().unwrap();
        let mut builder =
            BagBuilder::create(dir.path().join("b"), BuilderConfig::default()).unwrap();
        let err = builder
            .add_content_file(&dir.path().join("absent.bin"), "absent.bin")
            .unwrap_err();
        assert!(matches!(err, PreservError::Transfer { .. }));
        assert!(builder.pending_paths().is_empty());
        assert!(builder.bag().content_paths().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_destinations() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("s.txt");
        std::fs::write(&source, b"s").unwrap();
        let mut builder =
            BagBuilder::create(dir.path().join("b"), BuilderConfig::default()).unwrap();

        assert!(matches!(
            builder.add_content_file(&source, ""),
            Err(PreservError::InvalidPath(_))
        ));
        assert!(matches!(
            builder.add_content_file(&source, "sub/record.json"),
            Err(PreservError::Config(_))
        ));
        std::fs::create_dir_all(builder.bag().content_path("sub")).unwrap();
        assert!(matches!(
            builder.add_content_file(&source, "sub"),
            Err(PreservError::InvalidPath(_))
        ));
    }
}
