//! The proposer loop.
//!
//! At the local node's turn it drains the pending pool, builds and signs a
//! proposal, pushes it to every peer (fragmented when oversized), collects
//! the returned DA shares and persists the emitted proof.

use crate::client::PeerClient;
use crate::config::PeerInfo;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::ports::{ProposerSchedule, TransactionSource};
use crate::server::ServerContext;
use sg_01_proposal_codec::{BlockProposal, TransactionList};
use sg_02_proposal_store::KeyValueStore;
use sg_03_da_certification::{DaError, DaProof};
use shared_crypto::{CryptoSuite, SigShare};
use shared_types::{BlockId, NodeId, SignerIndex, U256};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Drives proposal creation and dissemination for the local node.
pub struct ProposerLoop<C: CryptoSuite, K: KeyValueStore> {
    ctx: Arc<ServerContext<C, K>>,
    local_node_id: NodeId,
    peers: Vec<PeerInfo>,
    tx_source: Arc<dyn TransactionSource>,
    schedule: Arc<dyn ProposerSchedule>,
    lifecycle: Arc<Lifecycle>,
}

impl<C: CryptoSuite, K: KeyValueStore> ProposerLoop<C, K> {
    /// Wire up a proposer loop sharing the server's context.
    pub fn new(
        ctx: Arc<ServerContext<C, K>>,
        local_node_id: NodeId,
        peers: Vec<PeerInfo>,
        tx_source: Arc<dyn TransactionSource>,
        schedule: Arc<dyn ProposerSchedule>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            ctx,
            local_node_id,
            peers,
            tx_source,
            schedule,
            lifecycle,
        }
    }

    /// Run one turn for `block_id`.
    ///
    /// Returns `Ok(None)` when the turn belongs to another proposer, and the
    /// emitted [`DaProof`] once `t` shares (the local one included) arrive
    /// and aggregate.
    pub fn propose_block(&self, block_id: BlockId, state_root: U256) -> Result<Option<DaProof>> {
        let local_index = self.ctx.local_signer_index();
        if self.schedule.proposer_for(block_id) != local_index {
            return Ok(None);
        }

        let drained = self
            .tx_source
            .pending_transactions(self.ctx.config().drain_limit);
        let (timestamp_sec, timestamp_ms) = wall_clock();

        let proposal = BlockProposal::build(
            self.ctx.chain_id,
            self.local_node_id,
            block_id,
            local_index,
            TransactionList::from_raw(drained),
            state_root,
            timestamp_sec,
            timestamp_ms,
            self.ctx.suite.as_ref(),
        )?;
        info!(
            block_id,
            transactions = proposal.transaction_count(),
            "authored proposal"
        );

        self.ctx.store().add_proposal(&proposal)?;
        let hash = *proposal.hash();

        // The local share counts toward the threshold like any peer's.
        let own_share = self.ctx.suite.sign_bls_share(&hash)?;
        self.ctx
            .store()
            .record_da_share(block_id, local_index, own_share.signer_index, &own_share.data)?;
        let mut emitted =
            self.ctx
                .aggregator()
                .add_share(block_id, local_index, &hash, own_share)?;

        let total_fragments = self.fragment_count(&proposal)?;
        let (share_tx, share_rx) = mpsc::channel::<(SignerIndex, Result<SigShare>)>();

        thread::scope(|scope| -> Result<()> {
            for peer in &self.peers {
                if peer.index == local_index {
                    continue;
                }
                let share_tx = share_tx.clone();
                let proposal = &proposal;
                scope.spawn(move || {
                    let client = PeerClient::new(peer.addr, self.ctx.config().clone());
                    let outcome = if total_fragments > 1 {
                        client.push_fragments(proposal, total_fragments)
                    } else {
                        client.push_proposal(proposal)
                    };
                    let _ = share_tx.send((peer.index, outcome));
                });
            }
            drop(share_tx);

            while let Ok((peer_index, outcome)) = share_rx.recv() {
                if self.lifecycle.exit_requested() {
                    break;
                }
                let share = match outcome {
                    Ok(share) => share,
                    Err(e) => {
                        warn!(peer_index, error = %e, "peer push failed");
                        continue;
                    }
                };

                if !self.ctx.suite.verify_bls_share(&hash, &share, peer_index) {
                    warn!(peer_index, "peer returned an unverifiable share");
                    continue;
                }
                self.ctx
                    .store()
                    .record_da_share(block_id, local_index, share.signer_index, &share.data)?;
                self.ctx.metrics().record_share_collected();

                match self
                    .ctx
                    .aggregator()
                    .add_share(block_id, local_index, &hash, share)
                {
                    Ok(Some(proof)) => emitted = Some(proof),
                    Ok(None) => {}
                    Err(e @ DaError::DuplicateShare { .. }) => {
                        debug!(peer_index, error = %e, "duplicate share from peer");
                    }
                    Err(e @ DaError::InvalidShareSet { .. }) => {
                        warn!(error = %e, "share set discarded mid-collection");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        })?;

        if let Some(proof) = &emitted {
            self.ctx.commit_proof(proof)?;
            info!(block_id, signers = proof.signer_count(), "DA proof certified");
        } else {
            warn!(block_id, "turn ended without a DA proof");
        }
        Ok(emitted)
    }

    /// Serve block turns from `turns` until the channel closes or shutdown.
    ///
    /// The orchestrating agreement layer feeds `(blockID, stateRoot)` pairs
    /// as heights open.
    pub fn run(&self, turns: &mpsc::Receiver<(BlockId, U256)>) {
        self.lifecycle.wait_for_start();
        debug!("proposer loop entered");

        loop {
            if self.lifecycle.exit_requested() {
                break;
            }
            match turns.recv_timeout(Duration::from_millis(200)) {
                Ok((block_id, state_root)) => {
                    match self.propose_block(block_id, state_root) {
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => {
                            self.lifecycle.exit_on_fatal_error(&e.to_string());
                            break;
                        }
                        Err(e) => warn!(block_id, error = %e, "proposal turn failed"),
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!("proposer loop exited");
    }

    fn fragment_count(&self, proposal: &BlockProposal) -> Result<u64> {
        let serialized_len = proposal.serialize()?.len() as u64;
        if serialized_len <= self.ctx.config().fragment_threshold {
            return Ok(1);
        }
        let size = self.ctx.config().fragment_size.max(1);
        Ok(serialized_len.div_ceil(size))
    }
}

/// Wall clock as `(seconds, millisecond remainder)`.
fn wall_clock() -> (u64, u32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs(), now.subsec_millis())
}
