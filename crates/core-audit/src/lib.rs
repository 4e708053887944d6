//! Provenance logging for preservation bags
//!
//! Every change the bag builder makes to a bag's descriptive metadata is
//! recorded as one line in an append-only JSON Lines file that travels inside
//! the bag (`metadata/provenance.jsonl`). The log is never rewritten, only
//! appended to.
//!
//! ```text
//! {"ts":"...","event_type":"record_created","bag":"pdr0-0001","path":"a.txt"}
//! {"ts":"...","event_type":"record_updated","bag":"pdr0-0001","path":"a.txt","message":"..."}
//! {"ts":"...","event_type":"bag_finalized","bag":"pdr0-0001","bytes":3072}
//! ```
//!
//! # Example
//!
//! ```no_run
//! use preserv_core_audit::{ProvenanceEvent, ProvenanceLogger, ProvenanceType};
//!
//! let mut log = ProvenanceLogger::open("bag/metadata/provenance.jsonl").unwrap();
//! log.log(
//!     &ProvenanceEvent::new(ProvenanceType::RecordUpdated, "pdr0-0001")
//!         .with_path("trial1.json")
//!         .with_message("added description"),
//! )
//! .unwrap();
//! ```

pub mod error;
pub mod provenance;

// Re-export main types
pub use error::{Error, Result};
pub use provenance::{parse_provenance_log, ProvenanceEvent, ProvenanceLogger, ProvenanceType};
