//! # Signet Chain - Node Runtime
//!
//! Wires the proposal codec, store, DA aggregator and transport into one
//! running node.
//!
//! ## Wiring
//!
//! ```text
//! ProposerLoop ──serialize──→ peers' ProposalServer
//!       │                            │ store + sign share
//!       │←──────── DA shares ────────┘
//!       │ aggregate at t = 2N/3+1
//!       ↓
//!   DaProof ──→ ProposalStore ──→ ProposalVector at t proofs
//! ```
//!
//! The runtime signs with the toy suite and persists through the in-memory
//! store adapter; production deployments plug a real ECDSA + threshold-BLS
//! suite and a durable key-value engine into the same seams.

#![warn(clippy::all)]

use anyhow::Context;
use serde::Deserialize;
use sg_02_proposal_store::{InMemoryKvStore, ProposalStore};
use sg_03_da_certification::DaProofAggregator;
use sg_04_proposal_transport::ports::{
    PendingQueueSource, RoundRobinSchedule, TransactionSource,
};
use sg_04_proposal_transport::{
    Lifecycle, PeerInfo, ProposalServer, ProposerLoop, ServerContext, TransportConfig,
};
use shared_crypto::ToySha256Suite;
use shared_types::{BlockId, ChainId, Committee, NodeId, SignerIndex, U256};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use tracing::info;

/// Node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Chain this node serves.
    pub chain_id: ChainId,
    /// This node's network identity.
    pub node_id: NodeId,
    /// Committee size `N`.
    pub committee_size: u64,
    /// This node's 1-based committee index.
    pub local_index: SignerIndex,
    /// Shared seed of the devnet toy suite.
    pub committee_seed: u64,
    /// The other committee members' proposal servers.
    pub peers: Vec<PeerInfo>,
    /// Transport tuning.
    pub transport: TransportConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            node_id: 1,
            committee_size: 1,
            local_index: 1,
            committee_seed: 42,
            peers: Vec::new(),
            transport: TransportConfig::default(),
        }
    }
}

/// A running node: server, proposer loop and their shared state.
pub struct Node {
    lifecycle: Arc<Lifecycle>,
    ctx: Arc<ServerContext<ToySha256Suite, InMemoryKvStore>>,
    pool: Arc<PendingQueueSource>,
    server: Option<ProposalServer>,
    proposer_thread: Option<JoinHandle<()>>,
    turns: mpsc::Sender<(BlockId, U256)>,
}

impl Node {
    /// Construct and spawn everything; threads idle until [`Node::start`].
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let committee = Committee::new(config.committee_size);
        let suite = Arc::new(ToySha256Suite::new(config.committee_seed, config.local_index));
        let kv = Arc::new(InMemoryKvStore::new());
        let store = Arc::new(ProposalStore::new(committee, kv));
        let aggregator = Arc::new(DaProofAggregator::new(committee, Arc::clone(&suite)));

        let ctx = Arc::new(ServerContext::new(
            config.chain_id,
            committee,
            config.local_index,
            suite,
            store,
            aggregator,
            config.transport.clone(),
        ));

        let lifecycle = Arc::new(Lifecycle::new());
        let server = ProposalServer::start(&config.transport, Arc::clone(&ctx), Arc::clone(&lifecycle))
            .context("starting the proposal server")?;

        let pool = Arc::new(PendingQueueSource::new());
        let schedule = Arc::new(RoundRobinSchedule::new(config.committee_size));
        let proposer = ProposerLoop::new(
            Arc::clone(&ctx),
            config.node_id,
            config.peers.clone(),
            Arc::clone(&pool) as Arc<dyn TransactionSource>,
            schedule,
            Arc::clone(&lifecycle),
        );

        let (turns, turn_rx) = mpsc::channel();
        let proposer_thread = std::thread::spawn(move || proposer.run(&turn_rx));

        info!(
            chain_id = config.chain_id,
            local_index = config.local_index,
            committee_size = config.committee_size,
            "node wired"
        );

        Ok(Self {
            lifecycle,
            ctx,
            pool,
            server: Some(server),
            proposer_thread: Some(proposer_thread),
            turns,
        })
    }

    /// Open the start gate; the listener, workers and proposer loop begin.
    pub fn start(&self) {
        self.lifecycle.signal_start();
        info!("node started");
    }

    /// Queue a raw transaction for the next local proposal.
    pub fn submit_transaction(&self, tx: Vec<u8>) {
        self.pool.submit(tx);
    }

    /// Announce that block `block_id` opened with the given prior state
    /// root; the proposer loop acts when the turn is local.
    pub fn begin_block(&self, block_id: BlockId, state_root: U256) -> bool {
        self.turns.send((block_id, state_root)).is_ok()
    }

    /// The shared server context (store, aggregator, metrics).
    pub fn context(&self) -> &Arc<ServerContext<ToySha256Suite, InMemoryKvStore>> {
        &self.ctx
    }

    /// The lifecycle handle, for external signal plumbing.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Address the proposal server bound.
    pub fn server_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.as_ref().map(ProposalServer::local_addr)
    }

    /// Request exit and join every thread.
    pub fn shutdown(&mut self) {
        self.lifecycle.request_exit();
        if let Some(handle) = self.proposer_thread.take() {
            let _ = handle.join();
        }
        if let Some(mut server) = self.server.take() {
            server.shutdown();
        }
        info!("node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.transport.bind_addr = "127.0.0.1:0".parse().unwrap();
        config
    }

    #[test]
    fn test_single_node_committee_self_certifies() {
        let mut node = Node::new(test_config()).unwrap();
        node.start();

        node.submit_transaction(b"devnet tx".to_vec());
        assert!(node.begin_block(1, U256::zero()));

        // N=1 => t=1: the proposer's own share completes the proof.
        let store = Arc::clone(node.context().store());
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !store.has_da_proof(1, 1).unwrap() {
            assert!(
                std::time::Instant::now() < deadline,
                "block 1 never certified"
            );
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        node.shutdown();
    }

    #[test]
    fn test_shutdown_joins_cleanly_without_traffic() {
        let mut node = Node::new(test_config()).unwrap();
        node.start();

        let started = std::time::Instant::now();
        node.shutdown();
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
