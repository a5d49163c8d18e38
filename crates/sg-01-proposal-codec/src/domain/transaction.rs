//! A single opaque transaction.

use shared_crypto::sha256;
use shared_types::{Hash, PartialHash, PARTIAL_HASH_LEN};

/// An opaque transaction: the core never interprets the bytes, it only
/// moves, hashes and stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    data: Vec<u8>,
    hash: Hash,
}

impl Transaction {
    /// Wrap raw transaction bytes, computing the content hash once.
    pub fn new(data: Vec<u8>) -> Self {
        let hash = sha256(&data);
        Self { data, hash }
    }

    /// The raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serialized length in bytes.
    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Full SHA-256 of the bytes.
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// The 16-byte compact identifier peers use to name this transaction.
    pub fn partial_hash(&self) -> PartialHash {
        let mut partial = [0u8; PARTIAL_HASH_LEN];
        partial.copy_from_slice(&self.hash[..PARTIAL_HASH_LEN]);
        partial
    }
}
