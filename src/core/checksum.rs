/*!
 * Streaming checksum calculation for manifests and records
 */

use crate::error::Result;
use preserv_core_manifest::Algorithm;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024; // 64KB buffer

/// Streaming hasher that calculates a checksum incrementally
pub enum StreamingHasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamingHasher {
    /// Create a new streaming hasher for `algorithm`
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
            Algorithm::Sha512 => StreamingHasher::Sha512(Sha512::new()),
        }
    }

    /// Update the hash with new data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Sha256(h) => h.update(data),
            StreamingHasher::Sha512(h) => h.update(data),
        }
    }

    /// Finalize and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        match self {
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Size and per-algorithm digests of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    pub size: u64,
    pub digests: BTreeMap<Algorithm, String>,
}

impl FileDigests {
    pub fn get(&self, algorithm: Algorithm) -> Option<&str> {
        self.digests.get(&algorithm).map(String::as_str)
    }
}

/// Calculate checksum of a file (standalone function)
pub fn calculate_checksum(path: &Path, algorithm: Algorithm) -> Result<String> {
    let mut file = BufReader::new(File::open(path)?);
    let mut hasher = StreamingHasher::new(algorithm);
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize_hex())
}

/// Read a file once, computing its size and every requested digest
pub fn calculate_checksums(path: &Path, algorithms: &[Algorithm]) -> Result<FileDigests> {
    let mut file = BufReader::new(File::open(path)?);
    let mut hashers: Vec<(Algorithm, StreamingHasher)> = algorithms
        .iter()
        .map(|alg| (*alg, StreamingHasher::new(*alg)))
        .collect();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buffer[..n]);
        }
    }

    Ok(FileDigests {
        size,
        digests: hashers
            .into_iter()
            .map(|(alg, hasher)| (alg, hasher.finalize_hex()))
            .collect(),
    })
}

/// Digest of an in-memory buffer
pub fn hex_digest(data: &[u8], algorithm: Algorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}
