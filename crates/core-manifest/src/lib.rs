//! Tag-file codecs for preservation bags
//!
//! This crate knows the byte-level formats of a bag's tag files and nothing
//! about the filesystem. Every parser is lenient: malformed lines come back as
//! [`LineIssue`]s next to whatever parsed cleanly, so callers can report all
//! problems at once.
//!
//! # Formats
//!
//! - **Declaration** (`bagit.txt`): version and tag-encoding lines
//! - **Tag set** (`bag-info.txt`): ordered, repeatable `Name: value` fields
//! - **Manifests** (`manifest-<alg>.txt`, `tagmanifest-<alg>.txt`)
//! - **Fetch list** (`fetch.txt`)
//! - **Multibag ledgers** (`multibag/member-bags.tsv`, `multibag/file-lookup.tsv`)
//! - **Package names** (`{aipid}.{version}.mbag{major}_{minor}-{seq}`)
//!
//! # Example
//!
//! ```
//! use preserv_core_manifest::TagFileSet;
//!
//! let parsed = TagFileSet::parse("Contact-Name: Ray\nContact-Name: Gretchen\n");
//! assert_eq!(parsed.tags.values("Contact-Name"), vec!["Ray", "Gretchen"]);
//! assert!(parsed.tags.values("Contact-Email").is_empty());
//! ```

pub mod error;
pub mod fetch;
pub mod lines;
pub mod manifest;
pub mod multibag;
pub mod naming;
pub mod tagfile;
pub mod validate;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use fetch::{parse_fetch, render_fetch, FetchEntry, ParsedFetch};
pub use lines::{LineIssue, LineIssueKind};
pub use manifest::{
    classify_manifest_name, parse_manifest, render_manifest, Algorithm, ManifestEntry,
    ManifestKind, ParsedManifest,
};
pub use multibag::{FileLookup, MemberList, ParsedLookup};
pub use naming::BagName;
pub use tagfile::{Declaration, ParsedTags, TagFileSet};
pub use validate::RecordSchema;

/// Declaration file name
pub const BAGIT_TXT: &str = "bagit.txt";
/// Bag metadata tag file name
pub const BAG_INFO_TXT: &str = "bag-info.txt";
/// Remote fetch list file name
pub const FETCH_TXT: &str = "fetch.txt";
