//! Shared state behind every message handler.

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::metrics::TransportMetrics;
use crate::FUTURE_BLOCK_WINDOW;
use parking_lot::Mutex;
use sg_01_proposal_codec::{BlockProposal, FragmentAssembler, ProposalFragment};
use sg_02_proposal_store::{KeyValueStore, ProposalStore};
use sg_03_da_certification::{DaProof, DaProofAggregator};
use shared_crypto::{CryptoSuite, SigShare};
use shared_types::{BlockId, ChainId, Committee, ProposalVector, SignerIndex};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Everything the protocol handlers share: committee identity, the signing
/// suite, the store, the aggregator and the fragment reassembly cache.
pub struct ServerContext<C: CryptoSuite, K: KeyValueStore> {
    pub(crate) chain_id: ChainId,
    pub(crate) committee: Committee,
    pub(crate) local_signer_index: SignerIndex,
    pub(crate) suite: Arc<C>,
    pub(crate) store: Arc<ProposalStore<K>>,
    pub(crate) aggregator: Arc<DaProofAggregator<C>>,
    pub(crate) config: TransportConfig,
    pub(crate) metrics: Arc<TransportMetrics>,
    last_committed_block: AtomicU64,
    fragments: Mutex<HashMap<(BlockId, String), FragmentAssembler>>,
}

impl<C: CryptoSuite, K: KeyValueStore> ServerContext<C, K> {
    /// Wire up a context for one node.
    pub fn new(
        chain_id: ChainId,
        committee: Committee,
        local_signer_index: SignerIndex,
        suite: Arc<C>,
        store: Arc<ProposalStore<K>>,
        aggregator: Arc<DaProofAggregator<C>>,
        config: TransportConfig,
    ) -> Self {
        Self {
            chain_id,
            committee,
            local_signer_index,
            suite,
            store,
            aggregator,
            config,
            metrics: Arc::new(TransportMetrics::new()),
            last_committed_block: AtomicU64::new(0),
            fragments: Mutex::new(HashMap::new()),
        }
    }

    /// The committee this node belongs to.
    pub fn committee(&self) -> Committee {
        self.committee
    }

    /// This node's committee index.
    pub fn local_signer_index(&self) -> SignerIndex {
        self.local_signer_index
    }

    /// The proposal store.
    pub fn store(&self) -> &Arc<ProposalStore<K>> {
        &self.store
    }

    /// The DA aggregator.
    pub fn aggregator(&self) -> &Arc<DaProofAggregator<C>> {
        &self.aggregator
    }

    /// Transport counters.
    pub fn metrics(&self) -> &Arc<TransportMetrics> {
        &self.metrics
    }

    /// Transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Height below which inbound proposals are stale. Advanced by the
    /// agreement layer as blocks commit.
    pub fn last_committed_block(&self) -> BlockId {
        self.last_committed_block.load(Ordering::SeqCst)
    }

    /// Advance the committed-height gauge.
    pub fn set_last_committed_block(&self, block_id: BlockId) {
        self.last_committed_block.store(block_id, Ordering::SeqCst);
    }

    /// Reject blocks at or below the committed height, and blocks further
    /// than [`FUTURE_BLOCK_WINDOW`] ahead of it.
    pub(crate) fn check_block_window(&self, block_id: BlockId) -> Result<()> {
        let last_committed = self.last_committed_block();
        if block_id <= last_committed {
            return Err(TransportError::StaleBlock {
                block_id,
                last_committed,
            });
        }
        if block_id > last_committed + FUTURE_BLOCK_WINDOW {
            return Err(TransportError::FutureBlock {
                block_id,
                last_committed,
            });
        }
        Ok(())
    }

    /// Ingest a verified proposal and produce this node's DA share for it.
    ///
    /// Identical re-delivery still earns a share so the proposer can retry
    /// lost replies; a conflicting proposal surfaces as a store conflict.
    pub(crate) fn accept_proposal(&self, proposal: &BlockProposal) -> Result<SigShare> {
        if self.store.add_proposal(proposal)? {
            self.metrics.record_proposal_stored();
        } else {
            trace!(
                block_id = proposal.block_id(),
                proposer_index = proposal.proposer_index(),
                "proposal re-delivered, re-issuing share"
            );
        }

        let share = self.suite.sign_bls_share(proposal.hash())?;
        self.store.record_da_share(
            proposal.block_id(),
            proposal.proposer_index(),
            share.signer_index,
            &share.data,
        )?;
        self.metrics.record_share_collected();

        debug!(
            block_id = proposal.block_id(),
            proposer_index = proposal.proposer_index(),
            "proposal acknowledged with DA share"
        );
        Ok(share)
    }

    /// Feed one fragment into its set; returns the reassembled serialized
    /// proposal once the set completes.
    pub(crate) fn add_fragment(&self, fragment: ProposalFragment) -> Result<Option<Vec<u8>>> {
        let key = (fragment.block_id, fragment.proposal_hash_hex.clone());

        let mut fragments = self.fragments.lock();
        let assembler = match fragments.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(FragmentAssembler::for_fragment(&fragment)?),
        };
        assembler.add(&fragment)?;
        self.metrics.record_fragment_received();

        if assembler.is_complete() {
            if let Some(done) = fragments.remove(&key) {
                return Ok(Some(done.assemble()?));
            }
        }
        Ok(None)
    }

    /// Persist an emitted DA proof; returns the block's proposal vector
    /// when this proof crossed the per-block threshold.
    pub(crate) fn commit_proof(&self, proof: &DaProof) -> Result<Option<ProposalVector>> {
        let bytes = serde_json::to_vec(proof).map_err(|e| TransportError::Protocol {
            reason: format!("proof serialization failed: {e}"),
        })?;
        self.metrics.record_proof_emitted();
        Ok(self
            .store
            .add_da_proof(proof.block_id, proof.proposer_index, &bytes)?)
    }
}
