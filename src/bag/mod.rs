/*!
 * Bag Model: structural access to a bag directory
 *
 * A bag is a directory with:
 *
 * - `data/` - the content tree
 * - `metadata/` - one descriptive record per content path
 *   (`metadata/<path>/record.json`), the resource record and the
 *   provenance log
 * - `bagit.txt`, `bag-info.txt`, `fetch.txt`
 * - `manifest-<alg>.txt` / `tagmanifest-<alg>.txt`
 * - `multibag/` - only in head bags
 *
 * All paths handed out are relative and `/`-separated. Content paths are
 * relative to `data/`; manifest paths are relative to the bag root.
 *
 * Callers must hold exclusive access to the directory while mutating it.
 */

pub mod index;
pub mod record;
pub mod walk;
pub mod write;

pub use index::MultibagIndex;
pub use record::{Checksum, DescriptiveRecord, RecordKind};
pub use walk::{ContentFile, ContentFiles};

use crate::core::checksum::{calculate_checksums, FileDigests};
use crate::core::paths::{join, normalize_rel, to_posix};
use crate::error::{PreservError, Result};
use preserv_core_manifest::multibag::{FILE_LOOKUP_FILE, MEMBER_BAGS_FILE, MULTIBAG_DIR};
use preserv_core_manifest::{
    classify_manifest_name, parse_fetch, parse_manifest, Algorithm, Declaration, ManifestEntry,
    ManifestKind, ParsedFetch, ParsedManifest, ParsedTags, TagFileSet, BAGIT_TXT, BAG_INFO_TXT,
    FETCH_TXT,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Content tree directory
pub const DATA_DIR: &str = "data";
/// Descriptive-metadata tree directory
pub const METADATA_DIR: &str = "metadata";
/// Record file name inside each metadata directory
pub const RECORD_FILE: &str = "record.json";
/// Provenance log inside `metadata/`
pub const PROVENANCE_FILE: &str = "provenance.jsonl";

/// A bag directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bag {
    root: PathBuf,
    name: String,
}

impl Bag {
    /// Open an existing bag; fails with `BagNotFound` if `root` is not a directory
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PreservError::BagNotFound(root.to_path_buf()));
        }
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PreservError::InvalidPath(root.display().to_string()))?
            .to_string();
        Ok(Self {
            root: root.to_path_buf(),
            name,
        })
    }

    /// Create the bag directory and its content tree if missing, then open it
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root.join(DATA_DIR))?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the bag
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn multibag_dir(&self) -> PathBuf {
        self.root.join(MULTIBAG_DIR)
    }

    /// Absolute location of a content path (`""` is `data/` itself)
    pub fn content_path(&self, path: &str) -> PathBuf {
        rel_join(&self.data_dir(), path)
    }

    /// Absolute location of the record file for a content path
    pub fn record_file(&self, path: &str) -> PathBuf {
        rel_join(&self.metadata_dir(), path).join(RECORD_FILE)
    }

    pub fn provenance_file(&self) -> PathBuf {
        self.metadata_dir().join(PROVENANCE_FILE)
    }

    /// Lazy, restartable enumeration of content files
    pub fn content_files(&self) -> ContentFiles {
        ContentFiles::new(&self.data_dir())
    }

    /// Every content path, in enumeration order
    pub fn content_paths(&self) -> Result<Vec<String>> {
        self.content_files().map(|f| f.map(|f| f.path)).collect()
    }

    /// What kind of node a content path is, if it exists
    pub fn content_kind(&self, path: &str) -> Option<RecordKind> {
        if path.is_empty() {
            return Some(RecordKind::Resource);
        }
        let full = self.content_path(path);
        if full.is_dir() {
            Some(RecordKind::Subcollection)
        } else if full.is_file() {
            Some(RecordKind::DataFile)
        } else {
            None
        }
    }

    /// Direct children of a content directory, sorted, as content paths
    pub fn children(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.content_path(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name
                .to_str()
                .ok_or_else(|| PreservError::InvalidPath(entry.path().display().to_string()))?;
            if crate::core::link::is_staging_name(name) {
                continue;
            }
            names.push(join(path, name));
        }
        names.sort();
        Ok(names)
    }

    /// Total bytes and file count of the content tree
    pub fn payload_oxum(&self) -> Result<(u64, u64)> {
        let mut octets = 0;
        let mut count = 0;
        for file in self.content_files() {
            octets += file?.size;
            count += 1;
        }
        Ok((octets, count))
    }

    /// Size and digests of every content file, keyed by manifest path
    pub fn compute_payload_digests(
        &self,
        algorithms: &[Algorithm],
    ) -> Result<BTreeMap<String, FileDigests>> {
        let mut out = BTreeMap::new();
        for file in self.content_files() {
            let file = file?;
            let digests = calculate_checksums(&self.content_path(&file.path), algorithms)?;
            out.insert(file.bag_path(), digests);
        }
        Ok(out)
    }

    pub fn has_record(&self, path: &str) -> bool {
        self.record_file(path).is_file()
    }

    /// Descriptive record for a content path (`""` for the resource)
    pub fn record(&self, path: &str) -> Result<DescriptiveRecord> {
        let path = normalize_rel(path)?;
        let file = self.record_file(&path);
        if !file.is_file() {
            return Err(PreservError::ComponentNotFound(path));
        }
        let text = std::fs::read_to_string(&file)?;
        DescriptiveRecord::from_json(&path, &text)
    }

    /// Content paths that have a record file, in tree order (`""` first)
    pub fn record_paths(&self) -> Result<Vec<String>> {
        let meta = self.metadata_dir();
        if !meta.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&meta).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && entry.file_name() == RECORD_FILE {
                let dir = entry.path().parent().unwrap_or(&meta);
                let rel = dir.strip_prefix(&meta).unwrap_or(Path::new(""));
                paths.push(to_posix(rel)?);
            }
        }
        Ok(paths)
    }

    /// Raw text of a root-level tag file, `None` if absent
    pub fn read_tag_file(&self, name: &str) -> Result<Option<String>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    /// Parsed `bagit.txt`, `None` if absent
    pub fn declaration(&self) -> Result<Option<Declaration>> {
        Ok(self
            .read_tag_file(BAGIT_TXT)?
            .map(|text| Declaration::parse(&text)))
    }

    /// Parsed `bag-info.txt`; an absent file is an empty tag set
    pub fn info(&self) -> Result<ParsedTags> {
        Ok(match self.read_tag_file(BAG_INFO_TXT)? {
            Some(text) => TagFileSet::parse(&text),
            None => ParsedTags::default(),
        })
    }

    /// Values of one `bag-info.txt` field; empty when absent
    pub fn info_values(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .info()?
            .tags
            .values(name)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Algorithms with a manifest of the given kind, sorted
    pub fn manifest_algorithms(&self, kind: ManifestKind) -> Result<Vec<Algorithm>> {
        let mut algorithms = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match classify_manifest_name(name) {
                Ok(Some((k, alg))) if k == kind => algorithms.push(alg),
                Ok(_) => {}
                Err(e) => warn!(bag = %self.name, file = name, error = %e, "ignoring manifest"),
            }
        }
        algorithms.sort();
        Ok(algorithms)
    }

    /// Parsed manifest of one kind and algorithm, `None` if absent
    pub fn manifest(&self, kind: ManifestKind, algorithm: Algorithm) -> Result<Option<ParsedManifest>> {
        let name = match kind {
            ManifestKind::Payload => algorithm.manifest_name(),
            ManifestKind::Tag => algorithm.tagmanifest_name(),
        };
        Ok(self
            .read_tag_file(&name)?
            .map(|text| parse_manifest(&text, algorithm)))
    }

    /// Payload manifest entries across every algorithm present
    pub fn payload_entries(&self) -> Result<Vec<ManifestEntry>> {
        let mut entries = Vec::new();
        for alg in self.manifest_algorithms(ManifestKind::Payload)? {
            if let Some(manifest) = self.manifest(ManifestKind::Payload, alg)? {
                entries.extend(manifest.entries);
            }
        }
        Ok(entries)
    }

    /// Parsed `fetch.txt`; absent file is an empty list
    pub fn fetch(&self) -> Result<ParsedFetch> {
        Ok(match self.read_tag_file(FETCH_TXT)? {
            Some(text) => parse_fetch(&text),
            None => ParsedFetch::default(),
        })
    }

    /// True iff `multibag/` holds both ledger files
    pub fn is_head_bag(&self) -> bool {
        let dir = self.multibag_dir();
        dir.join(MEMBER_BAGS_FILE).is_file() && dir.join(FILE_LOOKUP_FILE).is_file()
    }

    /// Every file outside `data/` except tag manifests, sorted
    pub fn tag_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == DATA_DIR));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let rel = to_posix(rel)?;
            if entry.depth() == 1 {
                if let Ok(Some((ManifestKind::Tag, _))) = classify_manifest_name(&rel) {
                    continue;
                }
            }
            if rel
                .rsplit('/')
                .next()
                .is_some_and(crate::core::link::is_staging_name)
            {
                continue;
            }
            files.push(rel);
        }
        Ok(files)
    }

    /// Bytes the head bag needs for descriptive metadata and `fetch.txt`
    pub fn metadata_volume(&self) -> Result<u64> {
        let mut total = 0;
        let meta = self.metadata_dir();
        if meta.is_dir() {
            for entry in WalkDir::new(&meta) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    total += entry.metadata()?.len();
                }
            }
        }
        let fetch = self.root.join(FETCH_TXT);
        if fetch.is_file() {
            total += std::fs::metadata(fetch)?.len();
        }
        Ok(total)
    }
}

fn rel_join(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|p| !p.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}
