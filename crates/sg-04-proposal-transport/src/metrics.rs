//! Metrics collection for the transport.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process transport counters.
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Connections accepted by the listener.
    pub connections_accepted: AtomicU64,

    /// Connections rejected because the queue was full.
    pub connections_rejected: AtomicU64,

    /// Messages routed to a handler.
    pub messages_dispatched: AtomicU64,

    /// Connections torn down on a protocol error.
    pub protocol_errors: AtomicU64,

    /// Proposals newly written to the store.
    pub proposals_stored: AtomicU64,

    /// Fragments accepted into an assembler.
    pub fragments_received: AtomicU64,

    /// DA shares collected from peers or signed locally.
    pub shares_collected: AtomicU64,

    /// DA proofs emitted by the aggregator.
    pub proofs_emitted: AtomicU64,
}

impl TransportMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted connection.
    pub fn record_connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection rejected under backpressure.
    pub fn record_connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dispatched message.
    pub fn record_message_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection lost to a protocol error.
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a proposal newly stored.
    pub fn record_proposal_stored(&self) {
        self.proposals_stored.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted fragment.
    pub fn record_fragment_received(&self) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a collected DA share.
    pub fn record_share_collected(&self) {
        self.shares_collected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted DA proof.
    pub fn record_proof_emitted(&self) {
        self.proofs_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Proposals newly stored so far.
    pub fn get_proposals_stored(&self) -> u64 {
        self.proposals_stored.load(Ordering::Relaxed)
    }

    /// Proofs emitted so far.
    pub fn get_proofs_emitted(&self) -> u64 {
        self.proofs_emitted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = TransportMetrics::new();
        metrics.record_proposal_stored();
        metrics.record_proposal_stored();
        metrics.record_proof_emitted();

        assert_eq!(metrics.get_proposals_stored(), 2);
        assert_eq!(metrics.get_proofs_emitted(), 1);
    }
}
