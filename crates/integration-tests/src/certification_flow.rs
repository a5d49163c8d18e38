//! Whole-flow certification: proposer loop, peer servers, DA shares,
//! emitted proofs.

use crate::harness::{build_proposal, test_transport_config, TestPeer, CHAIN_ID, SEED};
use sg_02_proposal_store::{InMemoryKvStore, ProposalStore};
use sg_03_da_certification::DaProofAggregator;
use sg_04_proposal_transport::ports::{
    PendingQueueSource, RoundRobinSchedule, TransactionSource,
};
use sg_04_proposal_transport::{
    Lifecycle, PeerClient, ProposerLoop, ServerContext, TransportConfig,
};
use shared_crypto::{CryptoSuite, ToySha256Suite};
use shared_types::{Committee, U256};
use std::sync::Arc;

/// A proposer-side fixture without its own server: context, pool, loop.
struct TestProposer {
    ctx: Arc<ServerContext<ToySha256Suite, InMemoryKvStore>>,
    pool: Arc<PendingQueueSource>,
    proposer: ProposerLoop<ToySha256Suite, InMemoryKvStore>,
}

fn proposer_against(peers: &[(&TestPeer, u64)], config: TransportConfig) -> TestProposer {
    let committee = Committee::new(4);
    let suite = Arc::new(ToySha256Suite::new(SEED, 1));
    let store = Arc::new(ProposalStore::new(
        committee,
        Arc::new(InMemoryKvStore::new()),
    ));
    let aggregator = Arc::new(DaProofAggregator::new(committee, Arc::clone(&suite)));
    let ctx = Arc::new(ServerContext::new(
        CHAIN_ID, committee, 1, suite, store, aggregator, config,
    ));

    let pool = Arc::new(PendingQueueSource::new());
    let lifecycle = Arc::new(Lifecycle::new());
    lifecycle.signal_start();

    let proposer = ProposerLoop::new(
        Arc::clone(&ctx),
        101,
        peers.iter().map(|(peer, index)| peer.peer_info(*index)).collect(),
        Arc::clone(&pool) as Arc<dyn TransactionSource>,
        Arc::new(RoundRobinSchedule::new(4)),
        lifecycle,
    );

    TestProposer {
        ctx,
        pool,
        proposer,
    }
}

#[test]
fn test_committee_certifies_local_proposal() {
    // N=4, t=3: the proposer's own share plus two live peers reach the
    // threshold; the fourth member stays offline.
    let peer2 = TestPeer::spawn(4, 2);
    let peer3 = TestPeer::spawn(4, 3);
    let fixture = proposer_against(&[(&peer2, 2), (&peer3, 3)], test_transport_config());

    fixture.pool.submit(b"transfer:a->b".to_vec());
    fixture.pool.submit(b"transfer:b->c".to_vec());

    // Round-robin gives block 4 to index 1.
    let proof = fixture
        .proposer
        .propose_block(4, U256::from(9))
        .unwrap()
        .expect("threshold reached");

    assert_eq!(proof.block_id, 4);
    assert_eq!(proof.proposer_index, 1);
    assert_eq!(proof.signer_count(), 3);
    assert!(proof.verify(&ToySha256Suite::new(SEED, 2)));

    // Everyone involved persisted what the protocol requires of them.
    assert!(fixture.ctx.store().has_proposal(4, 1).unwrap());
    assert!(fixture.ctx.store().has_da_proof(4, 1).unwrap());
    assert!(peer2.ctx.store().has_proposal(4, 1).unwrap());
    assert!(peer3.ctx.store().has_proposal(4, 1).unwrap());

    let stored = peer2
        .ctx
        .store()
        .get_proposal(4, 1, &ToySha256Suite::new(SEED, 2))
        .unwrap()
        .expect("peer kept the proposal");
    assert_eq!(stored.transaction_count(), 2);
}

#[test]
fn test_not_our_turn_is_a_noop() {
    let peer2 = TestPeer::spawn(4, 2);
    let fixture = proposer_against(&[(&peer2, 2)], test_transport_config());

    // Block 5 belongs to index 2, not the local index 1.
    let outcome = fixture.proposer.propose_block(5, U256::zero()).unwrap();
    assert!(outcome.is_none());
    assert!(!fixture.ctx.store().has_proposal(5, 1).unwrap());
}

#[test]
fn test_oversized_proposal_travels_as_fragments() {
    let peer2 = TestPeer::spawn(4, 2);
    let peer3 = TestPeer::spawn(4, 3);

    // Force the fragment path for anything beyond ~256 bytes.
    let mut config = test_transport_config();
    config.fragment_threshold = 256;
    config.fragment_size = 128;
    let fixture = proposer_against(&[(&peer2, 2), (&peer3, 3)], config);

    fixture.pool.submit(vec![0xC3; 2000]);

    let proof = fixture
        .proposer
        .propose_block(4, U256::zero())
        .unwrap()
        .expect("threshold reached over fragments");
    assert_eq!(proof.signer_count(), 3);

    assert!(peer2.ctx.metrics().fragments_received.load(std::sync::atomic::Ordering::Relaxed) > 1);
    let stored = peer2
        .ctx
        .store()
        .get_proposal(4, 1, &ToySha256Suite::new(SEED, 3))
        .unwrap()
        .expect("reassembled and stored");
    assert_eq!(stored.transactions().items()[0].data(), &[0xC3; 2000][..]);
}

#[test]
fn test_da_share_push_aggregates_remotely() {
    // A peer can also aggregate shares pushed directly to it.
    let collector = TestPeer::spawn(4, 1);
    let proposal = build_proposal(2, 2, &[b"tx"]);
    let hash = proposal.hash();

    let client = PeerClient::new(collector.addr(), test_transport_config());
    for signer in [2u64, 3] {
        let share = ToySha256Suite::new(SEED, signer)
            .sign_bls_share(hash)
            .unwrap();
        client.send_da_share(2, 2, hash, &share).unwrap();
    }
    assert!(!collector.ctx.store().has_da_proof(2, 2).unwrap());

    let share4 = ToySha256Suite::new(SEED, 4).sign_bls_share(hash).unwrap();
    client.send_da_share(2, 2, hash, &share4).unwrap();
    assert!(collector.ctx.store().has_da_proof(2, 2).unwrap());

    // Past the threshold, further shares are silently dropped.
    let dup = ToySha256Suite::new(SEED, 2).sign_bls_share(hash).unwrap();
    assert!(client.send_da_share(2, 2, hash, &dup).is_ok());
}
