//! Error types for the proposal store.

use crate::ports::KvStoreError;
use shared_types::{BlockId, ProposerIndex};
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`crate::ProposalStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A different proposal already occupies the key.
    #[error("conflicting proposal for block {block_id} proposer {proposer_index}")]
    Conflict {
        /// Block height of the slot.
        block_id: BlockId,
        /// Proposer slot within the block.
        proposer_index: ProposerIndex,
    },

    /// The block is below the retention floor.
    #[error("block {block_id} below retention floor {floor}")]
    StaleBlock {
        /// Rejected block height.
        block_id: BlockId,
        /// Current retention floor.
        floor: BlockId,
    },

    /// A committee index outside `1..=N`.
    #[error("committee index {index} outside 1..={node_count}")]
    UnknownIndex {
        /// Offending index.
        index: u64,
        /// Committee size.
        node_count: u64,
    },

    /// The key-value engine failed.
    #[error("key-value store failed")]
    Kv(#[from] KvStoreError),

    /// A stored value no longer decodes; persistent state is corrupt.
    #[error("stored value corrupt: {reason}")]
    Corrupt {
        /// What failed to decode.
        reason: String,
        /// Decoder error, when one exists.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Whether the error indicates corrupted persistent state, the one
    /// condition the node treats as fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}
