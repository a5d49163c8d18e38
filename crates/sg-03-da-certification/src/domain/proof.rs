//! The data-availability proof.

use serde::{Deserialize, Serialize};
use shared_crypto::{CryptoSuite, ThresholdSignature};
use shared_types::{BlockId, Hash, ProposerIndex};

/// Certifies that at least `t` committee members received and acknowledged
/// one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaProof {
    /// Block the certified proposal is for.
    pub block_id: BlockId,
    /// Proposer slot of the certified proposal.
    pub proposer_index: ProposerIndex,
    /// Hash of the certified proposal.
    pub proposal_hash: Hash,
    /// Aggregated threshold signature over the hash.
    pub threshold_signature: ThresholdSignature,
}

impl DaProof {
    /// Check the aggregate against the committee public key.
    pub fn verify(&self, suite: &dyn CryptoSuite) -> bool {
        suite.verify_bls_aggregate(&self.proposal_hash, &self.threshold_signature)
    }

    /// Number of contributing signers.
    pub fn signer_count(&self) -> usize {
        self.threshold_signature.signers.len()
    }
}
