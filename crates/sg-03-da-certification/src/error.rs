//! Error types for DA certification.

use shared_crypto::CryptoError;
use shared_types::{BlockId, ProposerIndex, SignerIndex};
use thiserror::Error;

/// Result type alias for certification operations.
pub type Result<T> = std::result::Result<T, DaError>;

/// Errors surfaced while collecting and aggregating DA shares.
#[derive(Debug, Error)]
pub enum DaError {
    /// The same signer submitted a second share for one key.
    #[error(
        "signer {signer_index} already contributed a share for block {block_id} proposer {proposer_index}"
    )]
    DuplicateShare {
        /// Offending signer.
        signer_index: SignerIndex,
        /// Block of the share set.
        block_id: BlockId,
        /// Proposer slot of the share set.
        proposer_index: ProposerIndex,
    },

    /// A share names a signer outside the committee.
    #[error("signer index {signer_index} outside committee of {node_count}")]
    UnknownSigner {
        /// Offending index.
        signer_index: SignerIndex,
        /// Committee size.
        node_count: u64,
    },

    /// A share failed individual verification.
    #[error("share from signer {signer_index} does not verify")]
    InvalidShare {
        /// Offending signer.
        signer_index: SignerIndex,
    },

    /// The aggregate over exactly-t shares failed verification; the set was
    /// discarded and the key re-opened.
    #[error(
        "aggregate of {share_count} shares for block {block_id} proposer {proposer_index} failed verification; set discarded"
    )]
    InvalidShareSet {
        /// Block of the share set.
        block_id: BlockId,
        /// Proposer slot of the share set.
        proposer_index: ProposerIndex,
        /// How many shares were aggregated.
        share_count: usize,
    },

    /// The signing suite refused an operation.
    #[error("crypto suite failed")]
    Crypto(#[from] CryptoError),
}
