//! Deterministic stand-in suite for devnets and tests.
//!
//! **NOT FOR PRODUCTION.** Every "key" is derived from a shared committee
//! seed, so any holder of the seed can sign for any index. What it does
//! preserve is exactly what the core relies on: signatures are
//! deterministic, bound to `(seed, index, hash)`, and an aggregate only
//! verifies when every contributing share was genuine.

use crate::hashing::sha256;
use crate::suite::{CryptoError, CryptoSuite, Result, SigShare, ThresholdSignature};
use shared_types::{Hash, ProposerIndex, SignerIndex};

const ECDSA_TAG: &[u8] = b"toy:ecdsa:v1";
const SHARE_TAG: &[u8] = b"toy:bls-share:v1";
const AGGREGATE_TAG: &[u8] = b"toy:bls-agg:v1";

/// SHA-256-based stand-in for the ECDSA + threshold-BLS suite.
#[derive(Debug, Clone)]
pub struct ToySha256Suite {
    committee_seed: u64,
    local_index: SignerIndex,
}

impl ToySha256Suite {
    /// A suite for the committee member at `local_index` (1-based), keyed
    /// off a committee-wide seed.
    pub fn new(committee_seed: u64, local_index: SignerIndex) -> Self {
        Self {
            committee_seed,
            local_index,
        }
    }

    /// The committee index this suite signs as.
    pub fn local_index(&self) -> SignerIndex {
        self.local_index
    }

    fn member_secret(&self, index: SignerIndex) -> Hash {
        let mut preimage = Vec::with_capacity(16);
        preimage.extend_from_slice(&self.committee_seed.to_le_bytes());
        preimage.extend_from_slice(&index.to_le_bytes());
        sha256(&preimage)
    }

    fn ecdsa_digest(&self, hash: &Hash, index: ProposerIndex) -> String {
        let mut preimage = Vec::with_capacity(ECDSA_TAG.len() + 64);
        preimage.extend_from_slice(ECDSA_TAG);
        preimage.extend_from_slice(&self.member_secret(index));
        preimage.extend_from_slice(hash);
        hex::encode(sha256(&preimage))
    }

    fn share_digest(&self, hash: &Hash, index: SignerIndex) -> Vec<u8> {
        let mut preimage = Vec::with_capacity(SHARE_TAG.len() + 64);
        preimage.extend_from_slice(SHARE_TAG);
        preimage.extend_from_slice(&self.member_secret(index));
        preimage.extend_from_slice(hash);
        sha256(&preimage).to_vec()
    }

    fn aggregate_digest(&self, hash: &Hash, shares: &[(SignerIndex, &[u8])]) -> Vec<u8> {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(AGGREGATE_TAG);
        preimage.extend_from_slice(hash);
        for (index, data) in shares {
            preimage.extend_from_slice(&index.to_le_bytes());
            preimage.extend_from_slice(data);
        }
        sha256(&preimage).to_vec()
    }
}

impl CryptoSuite for ToySha256Suite {
    fn sign_ecdsa(&self, hash: &Hash) -> Result<String> {
        Ok(self.ecdsa_digest(hash, self.local_index))
    }

    fn verify_ecdsa(&self, hash: &Hash, signature: &str, proposer_index: ProposerIndex) -> bool {
        self.ecdsa_digest(hash, proposer_index) == signature
    }

    fn sign_bls_share(&self, hash: &Hash) -> Result<SigShare> {
        Ok(SigShare {
            signer_index: self.local_index,
            data: self.share_digest(hash, self.local_index),
        })
    }

    fn verify_bls_share(&self, hash: &Hash, share: &SigShare, signer_index: SignerIndex) -> bool {
        share.signer_index == signer_index && self.share_digest(hash, signer_index) == share.data
    }

    fn aggregate_bls(&self, hash: &Hash, shares: &[SigShare]) -> Result<ThresholdSignature> {
        if shares.is_empty() {
            return Err(CryptoError::BadShareSet {
                share_count: 0,
                reason: "empty share set".to_string(),
            });
        }

        let mut sorted: Vec<(SignerIndex, &[u8])> = shares
            .iter()
            .map(|s| (s.signer_index, s.data.as_slice()))
            .collect();
        sorted.sort_by_key(|(index, _)| *index);

        for pair in sorted.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(CryptoError::BadShareSet {
                    share_count: shares.len(),
                    reason: format!("duplicate signer index {}", pair[0].0),
                });
            }
        }

        Ok(ThresholdSignature {
            signers: sorted.iter().map(|(index, _)| *index).collect(),
            data: self.aggregate_digest(hash, &sorted),
        })
    }

    fn verify_bls_aggregate(&self, hash: &Hash, aggregate: &ThresholdSignature) -> bool {
        if aggregate.signers.is_empty() {
            return false;
        }

        // Rebuild what the aggregate of genuine shares would look like; a
        // single tampered share changes the digest.
        let expected: Vec<(SignerIndex, Vec<u8>)> = aggregate
            .signers
            .iter()
            .map(|&index| (index, self.share_digest(hash, index)))
            .collect();
        let borrowed: Vec<(SignerIndex, &[u8])> = expected
            .iter()
            .map(|(index, data)| (*index, data.as_slice()))
            .collect();

        self.aggregate_digest(hash, &borrowed) == aggregate.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(index: SignerIndex) -> ToySha256Suite {
        ToySha256Suite::new(42, index)
    }

    #[test]
    fn test_ecdsa_roundtrip() {
        let s = suite(3);
        let hash = sha256(b"proposal");
        let sig = s.sign_ecdsa(&hash).unwrap();

        assert!(s.verify_ecdsa(&hash, &sig, 3));
        assert!(!s.verify_ecdsa(&hash, &sig, 2));
        assert!(!s.verify_ecdsa(&sha256(b"other"), &sig, 3));
    }

    #[test]
    fn test_ecdsa_verifiable_by_other_members() {
        let signer = suite(1);
        let verifier = suite(4);
        let hash = sha256(b"proposal");
        let sig = signer.sign_ecdsa(&hash).unwrap();

        assert!(verifier.verify_ecdsa(&hash, &sig, 1));
    }

    #[test]
    fn test_bls_share_roundtrip() {
        let s = suite(2);
        let hash = sha256(b"proposal");
        let share = s.sign_bls_share(&hash).unwrap();

        assert_eq!(share.signer_index, 2);
        assert!(s.verify_bls_share(&hash, &share, 2));
        assert!(!s.verify_bls_share(&hash, &share, 3));
    }

    #[test]
    fn test_aggregate_verifies() {
        let hash = sha256(b"proposal");
        let shares: Vec<SigShare> = (1..=3)
            .map(|i| suite(i).sign_bls_share(&hash).unwrap())
            .collect();

        let verifier = suite(4);
        let aggregate = verifier.aggregate_bls(&hash, &shares).unwrap();
        assert_eq!(aggregate.signers, vec![1, 2, 3]);
        assert!(verifier.verify_bls_aggregate(&hash, &aggregate));
    }

    #[test]
    fn test_aggregate_rejects_tampered_share() {
        let hash = sha256(b"proposal");
        let mut shares: Vec<SigShare> = (1..=3)
            .map(|i| suite(i).sign_bls_share(&hash).unwrap())
            .collect();
        shares[1].data[0] ^= 0xFF;

        let verifier = suite(4);
        let aggregate = verifier.aggregate_bls(&hash, &shares).unwrap();
        assert!(!verifier.verify_bls_aggregate(&hash, &aggregate));
    }

    #[test]
    fn test_aggregate_rejects_duplicates_and_empty() {
        let hash = sha256(b"proposal");
        let share = suite(1).sign_bls_share(&hash).unwrap();

        let verifier = suite(2);
        assert!(verifier.aggregate_bls(&hash, &[]).is_err());
        assert!(verifier
            .aggregate_bls(&hash, &[share.clone(), share])
            .is_err());
    }
}
