/*!
 * Bag Builder: the only component that mutates a bag
 *
 * Operations:
 *
 * - [`BagBuilder::ensure_metadata_for`] creates or refreshes minimal records
 * - [`BagBuilder::update_metadata_for`] deep-merges caller metadata
 * - [`BagBuilder::add_content_file`] places verified content
 * - [`BagBuilder::finalize`] writes manifests and tag files
 *
 * Content digests confirmed by `add_content_file` are held as pending until
 * `finalize`, which is the only step that rewrites manifests.
 */

mod content;
mod finalize;
mod metadata;

pub use finalize::{FinalizeReport, SOFTWARE_AGENT};

use crate::bag::Bag;
use crate::collab::{IdentifierSource, PathIdentifiers, RecordProducer};
use crate::config::BuilderConfig;
use crate::core::checksum::FileDigests;
use crate::error::{PreservError, Result};
use preserv_core_audit::{ProvenanceEvent, ProvenanceLogger, ProvenanceType};
use preserv_core_manifest::TagFileSet;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Builds and maintains one bag directory
pub struct BagBuilder {
    bag: Bag,
    config: BuilderConfig,
    ids: Box<dyn IdentifierSource>,
    /// Confirmed digests of content written since the last finalize,
    /// keyed by manifest path
    pending: BTreeMap<String, FileDigests>,
    /// Caller-supplied `bag-info.txt` fields, applied at finalize
    info: TagFileSet,
}

impl BagBuilder {
    /// Create a bag at `root` (or adopt an existing one there)
    pub fn create(root: impl AsRef<Path>, config: BuilderConfig) -> Result<Self> {
        config.validate()?;
        let bag = Bag::create(root)?;
        std::fs::create_dir_all(bag.metadata_dir())?;
        if bag.declaration()?.is_none() {
            bag.write_declaration(&config.bagit_version)?;
        }
        info!(bag = %bag.name(), root = %bag.root().display(), "bag created");
        Ok(Self::with_bag(bag, config))
    }

    /// Open an existing bag for further building
    pub fn open(root: impl AsRef<Path>, config: BuilderConfig) -> Result<Self> {
        config.validate()?;
        let bag = Bag::open(root)?;
        Ok(Self::with_bag(bag, config))
    }

    fn with_bag(bag: Bag, config: BuilderConfig) -> Self {
        let ids = Box::new(PathIdentifiers::new(bag.name()));
        Self {
            bag,
            config,
            ids,
            pending: BTreeMap::new(),
            info: TagFileSet::new(),
        }
    }

    /// Use a different identifier source
    pub fn with_identifiers(mut self, ids: Box<dyn IdentifierSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Manifest paths written since the last finalize
    pub fn pending_paths(&self) -> Vec<&str> {
        self.pending.keys().map(String::as_str).collect()
    }

    /// Replace every value of a `bag-info.txt` field at the next finalize
    pub fn set_info<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.set(name, values);
    }

    /// Seed the resource record from `producer` if the bag has none yet
    pub fn init_resource(&mut self, producer: &dyn RecordProducer) -> Result<()> {
        if self.bag.has_record("") {
            return Ok(());
        }
        let id = self.ids.resource_id();
        let mut record = producer.resource_record(&id)?;
        if record.kind != crate::bag::RecordKind::Resource {
            return Err(PreservError::MalformedRecord {
                path: String::new(),
                message: format!("initial resource record has kind {:?}", record.kind),
            });
        }
        record.filepath = None;
        record.has_member = self.bag.children("")?;
        self.bag.write_record("", &record)?;
        self.log_event(ProvenanceEvent::new(ProvenanceType::RecordCreated, self.bag.name()).with_path(""))
    }

    /// Append one event to the bag's provenance log
    fn log_event(&self, event: ProvenanceEvent) -> Result<()> {
        let mut logger = ProvenanceLogger::open(self.bag.provenance_file())?;
        logger.log(&event)?;
        Ok(())
    }
}

/// Content paths ending in the record file name would collide with records
fn check_record_name(path: &str) -> Result<()> {
    if crate::core::paths::file_name(path) == crate::bag::RECORD_FILE {
        return Err(PreservError::Config(format!(
            "content path '{}' collides with the record file name",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::{DescriptiveRecord, RecordKind};
    use preserv_core_audit::parse_provenance_log;
    use tempfile::tempdir;

    #[test]
    fn test_create_writes_declaration() {
        let dir = tempdir().unwrap();
        let builder = BagBuilder::create(dir.path().join("pdr0-0001"), BuilderConfig::default())
            .unwrap();
        let decl = builder.bag().declaration().unwrap().unwrap();
        assert_eq!(decl.version(), Some("1.0"));
        assert!(builder.bag().metadata_dir().is_dir());
        assert!(builder.pending_paths().is_empty());
    }

    #[test]
    fn test_open_missing_bag() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            BagBuilder::open(dir.path().join("absent"), BuilderConfig::default()),
            Err(PreservError::BagNotFound(_))
        ));
    }

    #[test]
    fn test_init_resource_from_producer() {
        let dir = tempdir().unwrap();
        let mut builder = BagBuilder::create(dir.path().join("b"), BuilderConfig::default())
            .unwrap()
            .with_identifiers(Box::new(PathIdentifiers::new("ark:/88434/b")));

        let producer = |id: &str| -> Result<DescriptiveRecord> {
            let mut r = DescriptiveRecord::resource(id);
            r.extra.insert("title".into(), serde_json::json!("Sample"));
            Ok(r)
        };
        builder.init_resource(&producer).unwrap();
        builder.init_resource(&producer).unwrap();

        let record = builder.bag().record("").unwrap();
        assert_eq!(record.id, "ark:/88434/b");
        assert_eq!(record.kind, RecordKind::Resource);
        assert_eq!(record.extra["title"], "Sample");

        let events = parse_provenance_log(builder.bag().provenance_file()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_init_resource_rejects_wrong_kind() {
        let dir = tempdir().unwrap();
        let mut builder =
            BagBuilder::create(dir.path().join("b"), BuilderConfig::default()).unwrap();
        let producer = |id: &str| -> Result<DescriptiveRecord> {
            Ok(DescriptiveRecord::subcollection(id, "x"))
        };
        assert!(builder.init_resource(&producer).is_err());
    }

    #[test]
    fn test_record_name_collision() {
        assert!(check_record_name("a/record.json").is_err());
        assert!(check_record_name("record.json").is_err());
        assert!(check_record_name("a/record.json.bak").is_ok());
    }
}
