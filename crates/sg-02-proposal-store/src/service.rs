//! The proposal store service.

use crate::domain::{da_proof_key, da_share_key, proposal_key};
use crate::error::{Result, StoreError};
use crate::ports::KeyValueStore;
use parking_lot::Mutex;
use sg_01_proposal_codec::BlockProposal;
use shared_crypto::CryptoSuite;
use shared_types::{BlockId, Committee, Hash, ProposalVector, ProposerIndex, SignerIndex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// In-memory index of one block's slots; the serialized bytes live in the
/// key-value engine.
#[derive(Debug, Default)]
struct BlockEntry {
    /// Proposer slot -> hash of the stored proposal.
    proposals: BTreeMap<ProposerIndex, Hash>,
    /// Proposers with a committed DA proof.
    da_proofs: BTreeSet<ProposerIndex>,
    /// Set once the threshold vector for this block has been handed out.
    vector_emitted: bool,
}

/// Persistent, de-duplicating store keyed `(blockID, proposerIndex)`.
///
/// All mutation of one block is serialized by that block's mutex; distinct
/// blocks proceed in parallel. The store's lock is always taken before the
/// aggregator's per-key lock, never after.
pub struct ProposalStore<K: KeyValueStore> {
    committee: Committee,
    kv: Arc<K>,
    blocks: Mutex<BTreeMap<BlockId, Arc<Mutex<BlockEntry>>>>,
    retention_floor: Mutex<BlockId>,
}

impl<K: KeyValueStore> ProposalStore<K> {
    /// A store for one committee on top of a key-value engine.
    pub fn new(committee: Committee, kv: Arc<K>) -> Self {
        Self {
            committee,
            kv,
            blocks: Mutex::new(BTreeMap::new()),
            retention_floor: Mutex::new(0),
        }
    }

    /// The committee this store serves.
    pub fn committee(&self) -> Committee {
        self.committee
    }

    fn block_entry(&self, block_id: BlockId) -> Arc<Mutex<BlockEntry>> {
        let mut blocks = self.blocks.lock();
        Arc::clone(blocks.entry(block_id).or_default())
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if !self.committee.contains_index(index) {
            return Err(StoreError::UnknownIndex {
                index,
                node_count: self.committee.node_count(),
            });
        }
        Ok(())
    }

    fn check_retention(&self, block_id: BlockId) -> Result<()> {
        let floor = *self.retention_floor.lock();
        if block_id < floor {
            return Err(StoreError::StaleBlock { block_id, floor });
        }
        Ok(())
    }

    /// Ingest a proposal. Returns `true` when the slot was newly written,
    /// `false` when an identical proposal was already present.
    ///
    /// A different proposal under an occupied key is refused with
    /// [`StoreError::Conflict`]; the slot is never overwritten.
    pub fn add_proposal(&self, proposal: &BlockProposal) -> Result<bool> {
        self.check_index(proposal.proposer_index())?;
        self.check_retention(proposal.block_id())?;

        let bytes = proposal
            .serialize()
            .map_err(|e| StoreError::Corrupt {
                reason: "proposal would not serialize".to_string(),
                cause: Some(Box::new(e)),
            })?;

        let entry = self.block_entry(proposal.block_id());
        let mut entry = entry.lock();

        let key = proposal_key(proposal.block_id(), proposal.proposer_index());
        match self.kv.get(&key)? {
            Some(existing) if existing == **bytes => {
                trace!(
                    block_id = proposal.block_id(),
                    proposer_index = proposal.proposer_index(),
                    "identical proposal re-added, ignoring"
                );
                Ok(false)
            }
            Some(_) => Err(StoreError::Conflict {
                block_id: proposal.block_id(),
                proposer_index: proposal.proposer_index(),
            }),
            None => {
                self.kv.put(&key, &bytes)?;
                entry
                    .proposals
                    .insert(proposal.proposer_index(), *proposal.hash());
                debug!(
                    block_id = proposal.block_id(),
                    proposer_index = proposal.proposer_index(),
                    transactions = proposal.transaction_count(),
                    "proposal stored"
                );
                Ok(true)
            }
        }
    }

    /// Fetch and decode a stored proposal; `None` if the slot is empty.
    pub fn get_proposal(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        suite: &dyn CryptoSuite,
    ) -> Result<Option<BlockProposal>> {
        let entry = self.block_entry(block_id);
        let _guard = entry.lock();

        let Some(bytes) = self.kv.get(&proposal_key(block_id, proposer_index))? else {
            return Ok(None);
        };

        let proposal = BlockProposal::deserialize(&bytes, suite).map_err(|e| {
            StoreError::Corrupt {
                reason: format!(
                    "stored proposal for block {block_id} proposer {proposer_index} no longer decodes"
                ),
                cause: Some(Box::new(e)),
            }
        })?;
        Ok(Some(proposal))
    }

    /// Hash of the proposal in the slot, from the in-memory index.
    ///
    /// `None` when the slot is empty or was filled before the last restart;
    /// callers treat this as a fast cross-check, not an authority.
    pub fn get_proposal_hash(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
    ) -> Option<Hash> {
        let entry = self.block_entry(block_id);
        let entry = entry.lock();
        entry.proposals.get(&proposer_index).copied()
    }

    /// Whether a proposal occupies the slot.
    pub fn has_proposal(&self, block_id: BlockId, proposer_index: ProposerIndex) -> Result<bool> {
        let entry = self.block_entry(block_id);
        let _guard = entry.lock();
        Ok(self.kv.exists(&proposal_key(block_id, proposer_index))?)
    }

    /// Persist that `signer_index` contributed a DA share for the slot.
    pub fn record_da_share(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        signer_index: SignerIndex,
        share_bytes: &[u8],
    ) -> Result<()> {
        self.check_index(proposer_index)?;
        self.check_index(signer_index)?;
        self.check_retention(block_id)?;

        let entry = self.block_entry(block_id);
        let _guard = entry.lock();
        self.kv.put(
            &da_share_key(block_id, proposer_index, signer_index),
            share_bytes,
        )?;
        Ok(())
    }

    /// Whether `signer_index` already contributed a DA share for the slot.
    pub fn has_da_share(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        signer_index: SignerIndex,
    ) -> Result<bool> {
        let entry = self.block_entry(block_id);
        let _guard = entry.lock();
        Ok(self
            .kv
            .exists(&da_share_key(block_id, proposer_index, signer_index))?)
    }

    /// Commit a DA proof for the slot.
    ///
    /// Returns the block's [`ProposalVector`] exactly when this proof is the
    /// t-th distinct one for the block; earlier, later and duplicate proofs
    /// return `None`.
    pub fn add_da_proof(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        proof_bytes: &[u8],
    ) -> Result<Option<ProposalVector>> {
        self.check_index(proposer_index)?;
        self.check_retention(block_id)?;

        let entry = self.block_entry(block_id);
        let mut entry = entry.lock();

        if entry.da_proofs.contains(&proposer_index) {
            trace!(block_id, proposer_index, "duplicate DA proof, ignoring");
            return Ok(None);
        }

        self.kv
            .put(&da_proof_key(block_id, proposer_index), proof_bytes)?;
        entry.da_proofs.insert(proposer_index);
        debug!(
            block_id,
            proposer_index,
            proofs = entry.da_proofs.len(),
            "DA proof committed"
        );

        let required = self.committee.required_signers() as usize;
        if !entry.vector_emitted && entry.da_proofs.len() == required {
            entry.vector_emitted = true;
            info!(block_id, "DA proof threshold reached for block");
            return Ok(Some(ProposalVector::from_indices(
                self.committee.node_count(),
                entry.da_proofs.iter().copied(),
            )));
        }

        Ok(None)
    }

    /// Whether the slot holds a committed DA proof.
    pub fn has_da_proof(&self, block_id: BlockId, proposer_index: ProposerIndex) -> Result<bool> {
        let entry = self.block_entry(block_id);
        let _guard = entry.lock();
        Ok(self.kv.exists(&da_proof_key(block_id, proposer_index))?)
    }

    /// Fetch a committed DA proof's serialized bytes.
    pub fn get_da_proof(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
    ) -> Result<Option<Vec<u8>>> {
        let entry = self.block_entry(block_id);
        let _guard = entry.lock();
        Ok(self.kv.get(&da_proof_key(block_id, proposer_index))?)
    }

    /// Drop every block below `floor` and raise the retention floor.
    ///
    /// Each pruned block's mutex is held while its keys are deleted, so a
    /// concurrent reader either completes before the prune or observes the
    /// slot already empty — never a half-deleted block.
    pub fn prune_below(&self, floor: BlockId) -> Result<usize> {
        {
            let mut current = self.retention_floor.lock();
            if floor > *current {
                *current = floor;
            }
        }

        let doomed: Vec<(BlockId, Arc<Mutex<BlockEntry>>)> = {
            let blocks = self.blocks.lock();
            blocks
                .range(..floor)
                .map(|(id, entry)| (*id, Arc::clone(entry)))
                .collect()
        };

        for (block_id, entry) in &doomed {
            let _guard = entry.lock();
            for index in self.committee.signer_indexes() {
                self.kv.delete(&proposal_key(*block_id, index))?;
                self.kv.delete(&da_proof_key(*block_id, index))?;
                for signer in self.committee.signer_indexes() {
                    self.kv.delete(&da_share_key(*block_id, index, signer))?;
                }
            }
        }

        let mut blocks = self.blocks.lock();
        for (block_id, _) in &doomed {
            blocks.remove(block_id);
        }

        if !doomed.is_empty() {
            info!(floor, pruned = doomed.len(), "pruned stale blocks");
        }
        Ok(doomed.len())
    }
}
