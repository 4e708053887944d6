//! Typed provenance events for bag construction
//!
//! Instead of free-text log lines, each provenance entry carries a typed
//! event category so a bag's history can be queried ("which records were
//! updated after the last finalize?") without text matching.
//!
//! # Event Types
//!
//! - **RecordCreated**: A descriptive record was created for a path
//! - **RecordUpdated**: A descriptive record was merged with an update
//! - **ContentAdded**: A content file was linked or copied into the bag
//! - **ContentReplaced**: An existing content file was overwritten
//! - **BagFinalized**: Manifests and tag files were (re)written
//! - **BagSplit**: The bag was split into a multibag series
//! - **BagConverted**: A multibag structure was added around an unsplit bag

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Typed provenance event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceType {
    // ── Metadata lifecycle ──
    /// A descriptive record was created
    RecordCreated,
    /// A descriptive record was updated
    RecordUpdated,

    // ── Content lifecycle ──
    /// A content file was added
    ContentAdded,
    /// A content file was replaced
    ContentReplaced,

    // ── Bag lifecycle ──
    /// Manifests and tag files were written
    BagFinalized,
    /// The bag was split into a multibag series
    BagSplit,
    /// A head-bag-only multibag structure was added
    BagConverted,
}

impl ProvenanceType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceType::RecordCreated => "record_created",
            ProvenanceType::RecordUpdated => "record_updated",
            ProvenanceType::ContentAdded => "content_added",
            ProvenanceType::ContentReplaced => "content_replaced",
            ProvenanceType::BagFinalized => "bag_finalized",
            ProvenanceType::BagSplit => "bag_split",
            ProvenanceType::BagConverted => "bag_converted",
        }
    }

    /// Is this a metadata-level event?
    pub fn is_record_event(&self) -> bool {
        matches!(
            self,
            ProvenanceType::RecordCreated | ProvenanceType::RecordUpdated
        )
    }

    /// Is this a bag-level event?
    pub fn is_bag_event(&self) -> bool {
        matches!(
            self,
            ProvenanceType::BagFinalized | ProvenanceType::BagSplit | ProvenanceType::BagConverted
        )
    }
}

/// A structured provenance event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    /// Timestamp (UTC)
    pub ts: DateTime<Utc>,

    /// Event type
    pub event_type: ProvenanceType,

    /// Name of the bag the event happened in
    pub bag: String,

    /// Content path the event concerns (`""` is the whole resource)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Caller-supplied description of the change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Bytes involved in this event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,

    /// Digest of the content involved, hex-encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Additional context (free-form key-value pairs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl ProvenanceEvent {
    /// Create a new provenance event
    pub fn new(event_type: ProvenanceType, bag: &str) -> Self {
        Self {
            ts: Utc::now(),
            event_type,
            bag: bag.to_string(),
            path: None,
            message: None,
            bytes: None,
            digest: None,
            context: None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    pub fn with_digest(mut self, digest: &str) -> Self {
        self.digest = Some(digest.to_string());
        self
    }

    /// Add a context key-value pair
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }
}

/// Append-only writer for a JSON Lines provenance file
pub struct ProvenanceLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ProvenanceLogger {
    /// Open (creating if needed) the log at `path` for appending
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|_| crate::Error::create_failed(&path))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Append one event and flush it to disk
    pub fn log(&mut self, event: &ProvenanceEvent) -> crate::Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse every event of a JSON Lines provenance file, in order
pub fn parse_provenance_log<P: AsRef<Path>>(path: P) -> crate::Result<Vec<ProvenanceEvent>> {
    let contents = std::fs::read_to_string(path)?;
    let mut events = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str::<ProvenanceEvent>(line).map_err(|e| {
            crate::Error::InvalidEntry {
                line: idx + 1,
                reason: e.to_string(),
            }
        })?;
        events.push(event);
    }

    Ok(events)
}
