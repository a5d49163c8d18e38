//! Error types for the transport.

use sg_01_proposal_codec::CodecError;
use sg_02_proposal_store::StoreError;
use sg_03_da_certification::DaError;
use shared_crypto::CryptoError;
use shared_types::BlockId;
use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors surfaced by the server core, peer client and proposer loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure; the connection is aborted and the peer retries.
    #[error("network i/o failed")]
    Network(#[from] std::io::Error),

    /// The bytes on the wire were not a valid message.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The proposal store refused the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The DA aggregator refused the operation.
    #[error(transparent)]
    Da(#[from] DaError),

    /// The signing suite refused the operation.
    #[error("crypto suite failed")]
    Crypto(#[from] CryptoError),

    /// The message violated the connection protocol.
    #[error("protocol violation: {reason}")]
    Protocol {
        /// What the peer got wrong.
        reason: String,
    },

    /// The referenced block is already committed.
    #[error("stale block {block_id}, last committed {last_committed}")]
    StaleBlock {
        /// Rejected block height.
        block_id: BlockId,
        /// Last committed height at the time.
        last_committed: BlockId,
    },

    /// The referenced block is too far ahead.
    #[error("future block {block_id}, last committed {last_committed}")]
    FutureBlock {
        /// Rejected block height.
        block_id: BlockId,
        /// Last committed height at the time.
        last_committed: BlockId,
    },

    /// A peer answered a push with a non-success status.
    #[error("peer {peer} replied {status}: {reason}")]
    PeerRejected {
        /// Peer address.
        peer: String,
        /// Status code in the reply.
        status: String,
        /// Reason the peer gave, if any.
        reason: String,
    },
}

impl TransportError {
    /// Whether the error is fatal to the node rather than to one
    /// connection. Only corrupted persistent state qualifies.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Store(e) if e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_not_fatal() {
        let err = TransportError::Protocol {
            reason: "garbage".into(),
        };
        assert!(!err.is_fatal());

        let err = TransportError::Store(StoreError::Corrupt {
            reason: "bad bytes".into(),
            cause: None,
        });
        assert!(err.is_fatal());
    }
}
