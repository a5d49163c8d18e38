//! The DA-proof aggregator service.

use crate::domain::{DaProof, ShareOutcome, ShareSet};
use crate::error::{DaError, Result};
use parking_lot::Mutex;
use shared_crypto::{CryptoSuite, SigShare};
use shared_types::{BlockId, Committee, Hash, ProposerIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

type SetKey = (BlockId, ProposerIndex);

/// Collects BLS shares per `(blockID, proposerIndex)` and emits the
/// aggregated [`DaProof`] on the `t-1 -> t` transition.
///
/// Work on one key is serialized by that key's mutex; distinct keys proceed
/// in parallel. Callers that also touch the proposal store must take the
/// store's lock first (fixed lock order).
pub struct DaProofAggregator<C: CryptoSuite> {
    committee: Committee,
    suite: Arc<C>,
    sets: Mutex<HashMap<SetKey, Arc<Mutex<ShareSet>>>>,
}

impl<C: CryptoSuite> DaProofAggregator<C> {
    /// An aggregator for one committee.
    pub fn new(committee: Committee, suite: Arc<C>) -> Self {
        Self {
            committee,
            suite,
            sets: Mutex::new(HashMap::new()),
        }
    }

    /// The committee this aggregator serves.
    pub fn committee(&self) -> Committee {
        self.committee
    }

    fn share_set(&self, key: SetKey) -> Arc<Mutex<ShareSet>> {
        let mut sets = self.sets.lock();
        Arc::clone(sets.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(ShareSet::new(
                key.0,
                key.1,
                self.committee.required_signers() as usize,
            )))
        }))
    }

    /// Submit one signer's share over `proposal_hash` for the key.
    ///
    /// Returns `Some(proof)` exactly once per key, when the t-th distinct
    /// share arrives and the aggregate verifies. Shares past the threshold
    /// return `None` without error; a duplicate signer is an error; an
    /// unverifiable aggregate discards the whole set and re-opens the key.
    pub fn add_share(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        proposal_hash: &Hash,
        share: SigShare,
    ) -> Result<Option<DaProof>> {
        if !self.committee.contains_index(share.signer_index) {
            return Err(DaError::UnknownSigner {
                signer_index: share.signer_index,
                node_count: self.committee.node_count(),
            });
        }

        let signer_index = share.signer_index;
        let set = self.share_set((block_id, proposer_index));
        let mut set = set.lock();

        match set.add(share)? {
            ShareOutcome::AlreadyComplete => {
                trace!(
                    block_id,
                    proposer_index,
                    signer_index,
                    "share past threshold, dropped"
                );
                Ok(None)
            }
            ShareOutcome::Accepted => {
                debug!(
                    block_id,
                    proposer_index,
                    signer_index,
                    collected = set.len(),
                    required = self.committee.required_signers(),
                    "DA share collected"
                );
                Ok(None)
            }
            ShareOutcome::ThresholdReached => {
                let shares = set.shares();
                let aggregate = self.suite.aggregate_bls(proposal_hash, &shares)?;

                if !self.suite.verify_bls_aggregate(proposal_hash, &aggregate) {
                    let share_count = set.len();
                    set.discard();
                    warn!(
                        block_id,
                        proposer_index,
                        share_count,
                        "aggregate failed verification, share set discarded"
                    );
                    return Err(DaError::InvalidShareSet {
                        block_id,
                        proposer_index,
                        share_count,
                    });
                }

                set.seal();
                info!(
                    block_id,
                    proposer_index,
                    signers = aggregate.signers.len(),
                    "DA proof emitted"
                );
                Ok(Some(DaProof {
                    block_id,
                    proposer_index,
                    proposal_hash: *proposal_hash,
                    threshold_signature: aggregate,
                }))
            }
        }
    }

    /// Number of shares currently collected for a key.
    pub fn share_count(&self, block_id: BlockId, proposer_index: ProposerIndex) -> usize {
        let set = self.share_set((block_id, proposer_index));
        let set = set.lock();
        set.len()
    }

    /// Whether the proof for a key has been emitted.
    pub fn is_complete(&self, block_id: BlockId, proposer_index: ProposerIndex) -> bool {
        let set = self.share_set((block_id, proposer_index));
        let set = set.lock();
        set.is_complete()
    }

    /// Drop share sets for blocks below `floor`; mirrors store pruning.
    pub fn prune_below(&self, floor: BlockId) {
        let mut sets = self.sets.lock();
        sets.retain(|(block_id, _), _| *block_id >= floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::{sha256, ToySha256Suite};

    const SEED: u64 = 21;

    fn aggregator() -> DaProofAggregator<ToySha256Suite> {
        // N=4 => t=3. The aggregator itself signs nothing; index 1 is
        // arbitrary.
        DaProofAggregator::new(Committee::new(4), Arc::new(ToySha256Suite::new(SEED, 1)))
    }

    fn share_from(signer: u64, hash: &Hash) -> SigShare {
        ToySha256Suite::new(SEED, signer)
            .sign_bls_share(hash)
            .unwrap()
    }

    #[test]
    fn test_threshold_emission_sequence() {
        let agg = aggregator();
        let hash = sha256(b"proposal");

        assert!(agg
            .add_share(9, 2, &hash, share_from(1, &hash))
            .unwrap()
            .is_none());
        assert!(agg
            .add_share(9, 2, &hash, share_from(2, &hash))
            .unwrap()
            .is_none());

        let proof = agg
            .add_share(9, 2, &hash, share_from(3, &hash))
            .unwrap()
            .expect("third share crosses t=3");
        assert_eq!(proof.block_id, 9);
        assert_eq!(proof.proposer_index, 2);
        assert_eq!(proof.threshold_signature.signers, vec![1, 2, 3]);
        assert!(proof.verify(&ToySha256Suite::new(SEED, 4)));

        // Post-threshold share: dropped without error, no second proof.
        assert!(agg
            .add_share(9, 2, &hash, share_from(4, &hash))
            .unwrap()
            .is_none());
        assert!(agg.is_complete(9, 2));
    }

    #[test]
    fn test_duplicate_share_rejected() {
        let agg = aggregator();
        let hash = sha256(b"proposal");

        agg.add_share(9, 2, &hash, share_from(1, &hash)).unwrap();
        assert!(matches!(
            agg.add_share(9, 2, &hash, share_from(1, &hash)),
            Err(DaError::DuplicateShare {
                signer_index: 1,
                ..
            })
        ));
        assert_eq!(agg.share_count(9, 2), 1);
    }

    #[test]
    fn test_unknown_signer_rejected() {
        let agg = aggregator();
        let hash = sha256(b"proposal");
        assert!(matches!(
            agg.add_share(9, 2, &hash, share_from(5, &hash)),
            Err(DaError::UnknownSigner {
                signer_index: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_keys_are_independent() {
        let agg = aggregator();
        let hash_a = sha256(b"proposal-a");
        let hash_b = sha256(b"proposal-b");

        agg.add_share(9, 1, &hash_a, share_from(1, &hash_a)).unwrap();
        agg.add_share(9, 2, &hash_b, share_from(1, &hash_b)).unwrap();

        assert_eq!(agg.share_count(9, 1), 1);
        assert_eq!(agg.share_count(9, 2), 1);
    }

    #[test]
    fn test_poisoned_set_discarded_and_reopened() {
        let agg = aggregator();
        let hash = sha256(b"proposal");

        agg.add_share(9, 2, &hash, share_from(1, &hash)).unwrap();
        agg.add_share(9, 2, &hash, share_from(2, &hash)).unwrap();

        // A share that individually decodes but was not produced over this
        // hash poisons the aggregate.
        let mut bad = share_from(3, &hash);
        bad.data[0] ^= 0xFF;
        assert!(matches!(
            agg.add_share(9, 2, &hash, bad),
            Err(DaError::InvalidShareSet { share_count: 3, .. })
        ));

        // The key re-opened empty; honest signers can retry to completion.
        assert_eq!(agg.share_count(9, 2), 0);
        agg.add_share(9, 2, &hash, share_from(1, &hash)).unwrap();
        agg.add_share(9, 2, &hash, share_from(2, &hash)).unwrap();
        let proof = agg
            .add_share(9, 2, &hash, share_from(3, &hash))
            .unwrap()
            .expect("retry succeeds");
        assert!(proof.verify(&ToySha256Suite::new(SEED, 1)));
    }

    #[test]
    fn test_prune_drops_old_sets() {
        let agg = aggregator();
        let hash = sha256(b"proposal");

        agg.add_share(3, 1, &hash, share_from(1, &hash)).unwrap();
        agg.add_share(8, 1, &hash, share_from(1, &hash)).unwrap();
        agg.prune_below(5);

        assert_eq!(agg.share_count(3, 1), 0);
        assert_eq!(agg.share_count(8, 1), 1);
    }
}
