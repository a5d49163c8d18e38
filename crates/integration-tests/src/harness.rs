//! Shared fixtures: committee peers listening on ephemeral localhost ports.

use sg_01_proposal_codec::{BlockProposal, TransactionList};
use sg_02_proposal_store::{InMemoryKvStore, ProposalStore};
use sg_03_da_certification::DaProofAggregator;
use sg_04_proposal_transport::{
    Lifecycle, PeerInfo, ProposalServer, ServerContext, TransportConfig,
};
use shared_crypto::ToySha256Suite;
use shared_types::{BlockId, ChainId, Committee, ProposerIndex, SignerIndex, U256};
use std::net::SocketAddr;
use std::sync::Arc;

/// Devnet committee seed shared by every fixture suite.
pub const SEED: u64 = 77;

/// Chain id used across fixtures.
pub const CHAIN_ID: ChainId = 1;

/// Fixed creation time for deterministic fixture proposals.
pub const TS: u64 = 1_600_000_000;

/// A transport configuration bound to an ephemeral localhost port.
pub fn test_transport_config() -> TransportConfig {
    let mut config = TransportConfig::default();
    config.bind_addr = "127.0.0.1:0".parse().expect("static addr parses");
    config.worker_count = 2;
    config
}

/// One committee member with a live proposal server.
pub struct TestPeer {
    /// Lifecycle driving the peer's threads.
    pub lifecycle: Arc<Lifecycle>,
    /// Shared handler state (store, aggregator, metrics).
    pub ctx: Arc<ServerContext<ToySha256Suite, InMemoryKvStore>>,
    /// The running server.
    pub server: ProposalServer,
}

impl TestPeer {
    /// Spawn a member of an `n`-strong committee at `index`, already
    /// started.
    pub fn spawn(n: u64, index: SignerIndex) -> Self {
        Self::spawn_with_config(n, index, test_transport_config())
    }

    /// Same, with custom transport tuning.
    pub fn spawn_with_config(n: u64, index: SignerIndex, config: TransportConfig) -> Self {
        let committee = Committee::new(n);
        let suite = Arc::new(ToySha256Suite::new(SEED, index));
        let store = Arc::new(ProposalStore::new(
            committee,
            Arc::new(InMemoryKvStore::new()),
        ));
        let aggregator = Arc::new(DaProofAggregator::new(committee, Arc::clone(&suite)));

        let ctx = Arc::new(ServerContext::new(
            CHAIN_ID,
            committee,
            index,
            suite,
            store,
            aggregator,
            config.clone(),
        ));
        let lifecycle = Arc::new(Lifecycle::new());
        let server = ProposalServer::start(&config, Arc::clone(&ctx), Arc::clone(&lifecycle))
            .expect("test server starts");
        lifecycle.signal_start();

        Self {
            lifecycle,
            ctx,
            server,
        }
    }

    /// Address the peer's server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// This peer as a dial target.
    pub fn peer_info(&self, index: SignerIndex) -> PeerInfo {
        PeerInfo {
            index,
            addr: self.addr(),
        }
    }
}

/// A signed fixture proposal authored by the member at `proposer_index`.
pub fn build_proposal(
    block_id: BlockId,
    proposer_index: ProposerIndex,
    payloads: &[&[u8]],
) -> BlockProposal {
    let suite = ToySha256Suite::new(SEED, proposer_index);
    BlockProposal::build(
        CHAIN_ID,
        100 + proposer_index,
        block_id,
        proposer_index,
        TransactionList::from_raw(payloads.iter().map(|p| p.to_vec())),
        U256::from(3),
        TS,
        0,
        &suite,
    )
    .expect("fixture proposal is well-formed")
}
