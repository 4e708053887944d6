/*!
 * Interfaces to collaborators outside the core
 *
 * The core asks for identifiers, the initial resource record, remote
 * availability of fetched files, and a place to hand finished archives.
 * Reference implementations cover the simple cases.
 */

use crate::bag::DescriptiveRecord;
use crate::error::Result;
use crate::serialize::ArchiveArtifact;
use preserv_core_manifest::FetchEntry;

/// Supplies opaque identifiers for the resource and its content paths
pub trait IdentifierSource {
    fn resource_id(&self) -> String;

    fn file_id(&self, path: &str) -> String;
}

/// `cmps/<path>` identifiers for content, a fixed resource id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathIdentifiers {
    resource: String,
}

impl PathIdentifiers {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl IdentifierSource for PathIdentifiers {
    fn resource_id(&self) -> String {
        self.resource.clone()
    }

    fn file_id(&self, path: &str) -> String {
        format!("cmps/{}", path)
    }
}

/// Supplies the resource-level record before building begins
pub trait RecordProducer {
    fn resource_record(&self, resource_id: &str) -> Result<DescriptiveRecord>;
}

impl<F> RecordProducer for F
where
    F: Fn(&str) -> Result<DescriptiveRecord>,
{
    fn resource_record(&self, resource_id: &str) -> Result<DescriptiveRecord> {
        self(resource_id)
    }
}

/// Answers whether a fetch-listed file already exists elsewhere
pub trait RemoteAvailability {
    fn is_available(&self, entry: &FetchEntry) -> bool;
}

/// Trusts every `fetch.txt` entry
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustFetchList;

impl RemoteAvailability for TrustFetchList {
    fn is_available(&self, _entry: &FetchEntry) -> bool {
        true
    }
}

/// Accepts a finished archive and its digest
pub trait SubmissionChannel {
    fn submit(&mut self, artifact: &ArchiveArtifact) -> Result<()>;
}

/// Capability to ask whether an identifier was already issued
pub type IssuedCheck = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Sequential identifier minter.
///
/// Each instance owns its counter; uniqueness across processes is delegated
/// to the injected [`IssuedCheck`].
pub struct Minter {
    prefix: String,
    next: u64,
    issued: IssuedCheck,
}

impl Minter {
    pub fn new(prefix: impl Into<String>, start: u64, issued: IssuedCheck) -> Self {
        Self {
            prefix: prefix.into(),
            next: start,
            issued,
        }
    }

    /// A minter that never consults an external registry
    pub fn standalone(prefix: impl Into<String>, start: u64) -> Self {
        Self::new(prefix, start, Box::new(|_| false))
    }

    fn format(&self, seq: u64) -> String {
        format!("{}{:04}", self.prefix, seq)
    }

    /// Issue the next identifier not already issued
    pub fn mint(&mut self) -> String {
        loop {
            let candidate = self.format(self.next);
            self.next += 1;
            if !(self.issued)(&candidate) {
                return candidate;
            }
        }
    }

    /// Sequence number the next call to [`Minter::mint`] will try first
    pub fn next_sequence(&self) -> u64 {
        self.next
    }
}

impl std::fmt::Debug for Minter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Minter")
            .field("prefix", &self.prefix)
            .field("next", &self.next)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_path_identifiers() {
        let ids = PathIdentifiers::new("ark:/88434/pdr0-0001");
        assert_eq!(ids.resource_id(), "ark:/88434/pdr0-0001");
        assert_eq!(ids.file_id("trial3/trial3a.json"), "cmps/trial3/trial3a.json");
    }

    #[test]
    fn test_minter_skips_issued() {
        let taken: HashSet<String> = ["pdr0-0001", "pdr0-0002"].iter().map(|s| s.to_string()).collect();
        let mut minter = Minter::new("pdr0-", 1, Box::new(move |id| taken.contains(id)));
        assert_eq!(minter.mint(), "pdr0-0003");
        assert_eq!(minter.mint(), "pdr0-0004");
        assert_eq!(minter.next_sequence(), 5);
    }

    #[test]
    fn test_minters_are_independent() {
        let mut a = Minter::standalone("a-", 0);
        let mut b = Minter::standalone("a-", 0);
        assert_eq!(a.mint(), "a-0000");
        assert_eq!(a.mint(), "a-0001");
        assert_eq!(b.mint(), "a-0000");
    }

    #[test]
    fn test_closure_record_producer() {
        let producer = |id: &str| -> Result<DescriptiveRecord> { Ok(DescriptiveRecord::resource(id)) };
        let record = producer.resource_record("ark:/1").unwrap();
        assert_eq!(record.id, "ark:/1");
    }

    #[test]
    fn test_trust_fetch_list() {
        let entry = FetchEntry {
            url: "https://example.org/x".into(),
            size: Some(1),
            path: "data/x".into(),
        };
        assert!(TrustFetchList.is_available(&entry));
    }
}
