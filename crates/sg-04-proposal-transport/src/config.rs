//! Transport configuration.

use serde::Deserialize;
use shared_types::SignerIndex;
use std::net::SocketAddr;
use std::time::Duration;

/// One peer of the local node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerInfo {
    /// 1-based committee index of the peer.
    pub index: SignerIndex,
    /// Address its proposal server listens on.
    pub addr: SocketAddr,
}

/// Runtime configuration for the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Address the proposal server binds.
    pub bind_addr: SocketAddr,

    /// Worker threads draining the connection queue; sized roughly to the
    /// committee, since at most one inbound push per peer is useful at a
    /// time.
    pub worker_count: usize,

    /// Bound on queued, not-yet-served connections. A full queue rejects
    /// new connections so memory stays bounded under a connect flood.
    pub queue_capacity: usize,

    /// Upper bound on a message's JSON header length.
    pub max_header_len: u64,

    /// Upper bound on a whole serialized proposal.
    pub max_message_size: u64,

    /// Serialized proposals larger than this are pushed as fragments.
    pub fragment_threshold: u64,

    /// Slice size for fragmented pushes.
    pub fragment_size: u64,

    /// Most transactions drained from the pending pool per proposal.
    pub drain_limit: usize,

    /// Outbound connect timeout.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:14880".parse().expect("static addr parses"),
            worker_count: 4,
            queue_capacity: 256,
            max_header_len: 8 * 1024 * 1024,
            max_message_size: 32 * 1024 * 1024,
            fragment_threshold: 1024 * 1024,
            fragment_size: 64 * 1024,
            drain_limit: 1024,
            connect_timeout_ms: 2_000,
        }
    }
}

impl TransportConfig {
    /// Outbound connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
