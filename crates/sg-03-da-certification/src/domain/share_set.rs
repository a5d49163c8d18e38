//! The per-key share set state machine.

use crate::error::{DaError, Result};
use shared_crypto::SigShare;
use shared_types::{BlockId, ProposerIndex, SignerIndex};
use std::collections::BTreeMap;

/// What happened to a submitted share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Accepted; the set is still below threshold.
    Accepted,
    /// Accepted and the set just reached exactly `t` shares.
    ThresholdReached,
    /// The proof was already emitted for this key; the share was dropped.
    AlreadyComplete,
}

/// Up to `t` distinct `(signer, share)` pairs for one key.
///
/// The set only grows while open; once the emitted proof is confirmed the
/// set is sealed read-only, and a failed aggregate wipes it back to empty.
#[derive(Debug)]
pub struct ShareSet {
    block_id: BlockId,
    proposer_index: ProposerIndex,
    required: usize,
    shares: BTreeMap<SignerIndex, SigShare>,
    complete: bool,
}

impl ShareSet {
    /// An open, empty set for one key.
    pub fn new(block_id: BlockId, proposer_index: ProposerIndex, required: usize) -> Self {
        Self {
            block_id,
            proposer_index,
            required,
            shares: BTreeMap::new(),
            complete: false,
        }
    }

    /// Submit one share.
    pub fn add(&mut self, share: SigShare) -> Result<ShareOutcome> {
        if self.complete {
            return Ok(ShareOutcome::AlreadyComplete);
        }
        if self.shares.contains_key(&share.signer_index) {
            return Err(DaError::DuplicateShare {
                signer_index: share.signer_index,
                block_id: self.block_id,
                proposer_index: self.proposer_index,
            });
        }

        self.shares.insert(share.signer_index, share);
        if self.shares.len() == self.required {
            Ok(ShareOutcome::ThresholdReached)
        } else {
            Ok(ShareOutcome::Accepted)
        }
    }

    /// The collected shares in ascending signer order.
    pub fn shares(&self) -> Vec<SigShare> {
        self.shares.values().cloned().collect()
    }

    /// Number of collected shares.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether no share has been collected.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Whether the proof for this key has been emitted.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Seal the set after the emitted proof verified.
    pub fn seal(&mut self) {
        self.complete = true;
    }

    /// Discard everything and re-open the set; called when the aggregate of
    /// `t` shares failed verification.
    pub fn discard(&mut self) {
        self.shares.clear();
        self.complete = false;
    }
}
