//! The signing-suite port.
//!
//! Two signature families are in play: ECDSA binds a proposal to its
//! proposer, and threshold BLS shares certify data availability. The core
//! never touches key material; it resolves peers by committee index through
//! this trait.

use serde::{Deserialize, Serialize};
use shared_types::{Hash, ProposerIndex, SignerIndex};
use thiserror::Error;

/// Result type alias for suite operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors surfaced by a signing suite.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The local signing key is unavailable or rejected the request.
    #[error("signing failed: {reason}")]
    SigningFailed {
        /// Suite-specific description.
        reason: String,
    },

    /// An aggregate was requested over an unusable share set.
    #[error("cannot aggregate {share_count} shares: {reason}")]
    BadShareSet {
        /// Number of shares handed to the aggregator.
        share_count: usize,
        /// Why the set was rejected.
        reason: String,
    },
}

/// One signer's BLS contribution over a proposal hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigShare {
    /// 1-based committee index of the signer.
    pub signer_index: SignerIndex,
    /// Opaque share bytes; only the suite interprets them.
    pub data: Vec<u8>,
}

impl SigShare {
    /// Hex rendering of the share bytes for wire headers.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

/// An aggregated threshold signature, verifiable against the committee
/// public key alone.
///
/// The signer list is carried alongside the aggregate the way threshold
/// schemes carry a participation bitmap; verifiers that do not need it may
/// ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSignature {
    /// 1-based indexes of the contributing signers, ascending.
    pub signers: Vec<SignerIndex>,
    /// Opaque aggregate bytes.
    pub data: Vec<u8>,
}

/// Signature operations the consensus core depends on.
///
/// Production: an HSM- or library-backed suite provided by the host.
/// Testing/devnet: [`crate::ToySha256Suite`].
pub trait CryptoSuite: Send + Sync {
    /// Produce the local node's ECDSA signature over a proposal hash.
    fn sign_ecdsa(&self, hash: &Hash) -> Result<String>;

    /// Verify an ECDSA signature against the public key of the committee
    /// member at `proposer_index`.
    fn verify_ecdsa(&self, hash: &Hash, signature: &str, proposer_index: ProposerIndex) -> bool;

    /// Produce the local node's BLS share over a proposal hash.
    fn sign_bls_share(&self, hash: &Hash) -> Result<SigShare>;

    /// Verify a BLS share against the share public key of the committee
    /// member at `signer_index`.
    fn verify_bls_share(&self, hash: &Hash, share: &SigShare, signer_index: SignerIndex) -> bool;

    /// Aggregate exactly-threshold shares into one threshold signature.
    fn aggregate_bls(&self, hash: &Hash, shares: &[SigShare]) -> Result<ThresholdSignature>;

    /// Verify a threshold signature against the committee public key.
    fn verify_bls_aggregate(&self, hash: &Hash, aggregate: &ThresholdSignature) -> bool;
}
