//! # Core Entities
//!
//! Identifier aliases and digest types used on the wire and in storage.

use serde::{Deserialize, Serialize};

// Re-export U256 from primitive-types for use across all subsystems;
// the prior-state commitment carried by every proposal is a 256-bit value.
pub use primitive_types::U256;

/// Length of a full SHA-256 digest in bytes.
pub const HASH_LEN: usize = 32;

/// Length of a partial transaction hash in bytes.
pub const PARTIAL_HASH_LEN: usize = 16;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_LEN];

/// The first 16 bytes of a transaction's SHA-256, used as its compact id.
pub type PartialHash = [u8; PARTIAL_HASH_LEN];

/// Identifier of a chain instance.
pub type ChainId = u64;

/// Identifier of a node in the network (not its committee position).
pub type NodeId = u64;

/// Block height.
pub type BlockId = u64;

/// 1-based position of a proposer within the committee.
pub type ProposerIndex = u64;

/// 1-based position of a signer within the committee.
pub type SignerIndex = u64;

/// One bit per committee member: bit `i` is set when proposer `i` holds a
/// committed DA proof for the block under consideration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVector {
    bits: Vec<bool>,
}

impl ProposalVector {
    /// Create an all-clear vector for a committee of `node_count` members.
    pub fn new(node_count: u64) -> Self {
        Self {
            bits: vec![false; node_count as usize],
        }
    }

    /// Build a vector with the given 1-based proposer indexes set.
    ///
    /// Out-of-range indexes are ignored.
    pub fn from_indices<I: IntoIterator<Item = ProposerIndex>>(node_count: u64, set: I) -> Self {
        let mut v = Self::new(node_count);
        for index in set {
            v.set(index);
        }
        v
    }

    /// Set the bit for a 1-based proposer index. Out-of-range is a no-op.
    pub fn set(&mut self, proposer_index: ProposerIndex) {
        if proposer_index >= 1 && proposer_index as usize <= self.bits.len() {
            self.bits[proposer_index as usize - 1] = true;
        }
    }

    /// Whether the bit for a 1-based proposer index is set.
    pub fn is_set(&self, proposer_index: ProposerIndex) -> bool {
        proposer_index >= 1
            && (proposer_index as usize) <= self.bits.len()
            && self.bits[proposer_index as usize - 1]
    }

    /// Number of set bits.
    pub fn count_set(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Committee size this vector covers.
    pub fn node_count(&self) -> u64 {
        self.bits.len() as u64
    }
}
