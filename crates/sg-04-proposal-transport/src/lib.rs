//! # Signet Chain - Proposal Transport (Subsystem 04)
//!
//! Blocking TCP plumbing for proposal dissemination and DA-share return.
//!
//! ## Threading Model
//!
//! Native OS threads only, no cooperative tasks:
//!
//! - one listener thread per server socket, feeding a bounded connection
//!   queue guarded by a mutex + condvar;
//! - a fixed worker pool draining the queue, one connection at a time;
//! - one proposer-loop thread;
//! - one short-lived client thread per outbound peer push.
//!
//! Cancellation is a single process-wide exit flag ([`Lifecycle`]): every
//! loop re-checks it after each blocking call and each condvar wake. The
//! listener blocks in `accept`; shutdown wakes it with one loopback
//! connection, so exit never waits on peer traffic. Threads are joined
//! before the server handle is dropped.
//!
//! ## Module Structure
//!
//! - [`server`]: listener, connection queue, worker pool, dispatch
//! - [`client`]: outbound peer connections
//! - [`proposer`]: the proposer loop
//! - [`messages`]: transport JSON headers and status codes
//! - [`ports`]: transaction source and proposer schedule seams

#![warn(clippy::all)]

pub mod client;
pub mod messages;
pub mod ports;
pub mod proposer;
pub mod server;

mod config;
mod error;
mod lifecycle;
mod metrics;
mod wire;

pub use client::PeerClient;
pub use config::{PeerInfo, TransportConfig};
pub use error::{Result, TransportError};
pub use lifecycle::Lifecycle;
pub use metrics::TransportMetrics;
pub use proposer::ProposerLoop;
pub use server::{ProposalServer, ServerContext};

/// How far past the last committed block a proposal may reach before it is
/// dropped as premature. Buffering of such proposals belongs to the
/// orchestrator, not the transport.
pub const FUTURE_BLOCK_WINDOW: u64 = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_future_window() {
        assert_eq!(FUTURE_BLOCK_WINDOW, 256);
    }
}
