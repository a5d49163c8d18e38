//! Server-core scenarios over real localhost sockets.

use crate::harness::{build_proposal, test_transport_config, TestPeer};
use sg_04_proposal_transport::{PeerClient, TransportError};
use shared_crypto::{CryptoSuite, ToySha256Suite};
use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};

fn client_for(peer: &TestPeer) -> PeerClient {
    PeerClient::new(peer.addr(), test_transport_config())
}

#[test]
fn test_shutdown_joins_without_peer_traffic() {
    // Park the listener inside a blocking accept with no pending
    // connections, and the workers on the queue condvar. Requesting exit
    // must bring every thread home without any peer traffic: the shutdown
    // path's own loopback wake is the only thing that touches the socket.
    let mut peer = TestPeer::spawn(4, 2);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(peer.ctx.metrics().connections_accepted.load(
        std::sync::atomic::Ordering::Relaxed
    ), 0, "no connection may arrive before shutdown");

    let started = Instant::now();
    peer.server.shutdown();
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "shutdown took {:?}",
        started.elapsed()
    );
    assert!(peer.lifecycle.exit_requested());
}

#[test]
fn test_push_earns_peer_share() {
    let peer = TestPeer::spawn(4, 2);
    let proposal = build_proposal(1, 1, &[b"tx-a", b"tx-b"]);

    let share = client_for(&peer).push_proposal(&proposal).unwrap();
    assert_eq!(share.signer_index, 2);

    let verifier = ToySha256Suite::new(crate::harness::SEED, 1);
    assert!(verifier.verify_bls_share(proposal.hash(), &share, 2));

    assert!(peer.ctx.store().has_proposal(1, 1).unwrap());
    assert!(peer.ctx.store().has_da_share(1, 1, 2).unwrap());
}

#[test]
fn test_identical_repush_reissues_share() {
    let peer = TestPeer::spawn(4, 2);
    let proposal = build_proposal(1, 1, &[b"tx"]);
    let client = client_for(&peer);

    let first = client.push_proposal(&proposal).unwrap();
    let second = client.push_proposal(&proposal).unwrap();
    assert_eq!(first, second);
    assert_eq!(peer.ctx.metrics().get_proposals_stored(), 1);
}

#[test]
fn test_conflicting_push_rejected() {
    let peer = TestPeer::spawn(4, 2);
    let client = client_for(&peer);

    client.push_proposal(&build_proposal(1, 1, &[b"tx"])).unwrap();
    let outcome = client.push_proposal(&build_proposal(1, 1, &[b"other tx"]));
    assert!(matches!(
        outcome,
        Err(TransportError::PeerRejected { status, .. }) if status == "REJECTED"
    ));
}

#[test]
fn test_stale_and_future_blocks_dropped() {
    let peer = TestPeer::spawn(4, 2);
    peer.ctx.set_last_committed_block(10);
    let client = client_for(&peer);

    let stale = client.push_proposal(&build_proposal(5, 2, &[]));
    assert!(matches!(
        stale,
        Err(TransportError::PeerRejected { status, .. }) if status == "STALE"
    ));

    let future = client.push_proposal(&build_proposal(300, 1, &[]));
    assert!(matches!(
        future,
        Err(TransportError::PeerRejected { status, .. }) if status == "FUTURE"
    ));

    assert!(!peer.ctx.store().has_proposal(5, 2).unwrap());
    assert!(!peer.ctx.store().has_proposal(300, 1).unwrap());
}

#[test]
fn test_missing_transactions_roundtrip() {
    let peer = TestPeer::spawn(4, 2);
    let proposal = build_proposal(1, 1, &[b"alpha", b"beta", b"gamma"]);
    let client = client_for(&peer);
    client.push_proposal(&proposal).unwrap();

    let partials = proposal.create_partial_hashes();
    let fetched = client
        .request_missing_transactions(1, 1, &[partials[2], partials[0]])
        .unwrap();
    assert_eq!(fetched, vec![b"gamma".to_vec(), b"alpha".to_vec()]);
}

#[test]
fn test_missing_transactions_for_absent_proposal() {
    let peer = TestPeer::spawn(4, 2);
    let proposal = build_proposal(1, 1, &[b"alpha"]);
    let partials = proposal.create_partial_hashes();

    let outcome = client_for(&peer).request_missing_transactions(1, 1, &partials);
    assert!(matches!(
        outcome,
        Err(TransportError::PeerRejected { status, .. }) if status == "NOT_FOUND"
    ));
}

#[test]
fn test_garbage_closes_connection_but_not_server() {
    let peer = TestPeer::spawn(4, 2);

    // A header that is not JSON: the worker drops the connection.
    {
        let mut raw = TcpStream::connect(peer.addr()).unwrap();
        let garbage = b"{this is not json}";
        raw.write_all(&(garbage.len() as u64).to_le_bytes()).unwrap();
        raw.write_all(garbage).unwrap();
        raw.flush().unwrap();
    }
    std::thread::sleep(Duration::from_millis(100));

    // The pool is still serving fresh connections.
    let share = client_for(&peer)
        .push_proposal(&build_proposal(1, 1, &[b"tx"]))
        .unwrap();
    assert_eq!(share.signer_index, 2);
}
