//! The TCP server core: listener, bounded queue, worker pool.

mod connection;
mod context;
mod dispatch;
mod queue;

pub use connection::ServerConnection;
pub use context::ServerContext;
pub use dispatch::ProtocolDispatcher;

use crate::config::TransportConfig;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::metrics::TransportMetrics;
use queue::ConnectionQueue;
use sg_02_proposal_store::KeyValueStore;
use shared_crypto::CryptoSuite;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Backoff after a failed `accept` so a persistent socket error cannot spin
/// the listener hot.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Bound on the shutdown path's loopback wake connection.
const WAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// The proposal server: one listener thread feeding a bounded connection
/// queue, drained by a fixed worker pool.
///
/// All threads hold at the lifecycle's start gate until the node signals
/// readiness, and every one of them is joined before [`ProposalServer`]
/// drops. The listener blocks in `accept`; shutdown wakes it with one
/// loopback connection, so exit needs no peer traffic.
pub struct ProposalServer {
    lifecycle: Arc<Lifecycle>,
    queue: Arc<ConnectionQueue>,
    listener_thread: Option<JoinHandle<()>>,
    worker_threads: Vec<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ProposalServer {
    /// Bind the configured address and spawn the listener and workers.
    ///
    /// The threads idle at the start gate until
    /// [`Lifecycle::signal_start`] runs.
    pub fn start<C, K>(
        config: &TransportConfig,
        ctx: Arc<ServerContext<C, K>>,
        lifecycle: Arc<Lifecycle>,
    ) -> Result<Self>
    where
        C: CryptoSuite + 'static,
        K: KeyValueStore + 'static,
    {
        let listener = TcpListener::bind(config.bind_addr)?;
        let local_addr = listener.local_addr()?;

        let queue = Arc::new(ConnectionQueue::new(config.queue_capacity));
        let dispatcher = Arc::new(ProtocolDispatcher::standard(Arc::clone(&ctx)));
        let metrics = Arc::clone(ctx.metrics());

        let mut worker_threads = Vec::with_capacity(config.worker_count.max(1));
        for worker_id in 0..config.worker_count.max(1) {
            let queue = Arc::clone(&queue);
            let dispatcher = Arc::clone(&dispatcher);
            let lifecycle = Arc::clone(&lifecycle);
            let metrics = Arc::clone(&metrics);
            worker_threads.push(thread::spawn(move || {
                worker_loop(worker_id, &queue, &dispatcher, &lifecycle, &metrics)
            }));
        }

        let listener_thread = {
            let queue = Arc::clone(&queue);
            let lifecycle = Arc::clone(&lifecycle);
            thread::spawn(move || accept_loop(listener, &queue, &lifecycle, &metrics))
        };

        info!(%local_addr, workers = worker_threads.len(), "proposal server started");

        Ok(Self {
            lifecycle,
            queue,
            listener_thread: Some(listener_thread),
            worker_threads,
            local_addr,
        })
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request exit and join every thread.
    pub fn shutdown(&mut self) {
        self.lifecycle.request_exit();
        self.queue.close();
        self.wake_listener();

        if let Some(handle) = self.listener_thread.take() {
            if handle.join().is_err() {
                warn!("listener thread panicked during shutdown");
            }
        }
        for handle in self.worker_threads.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        trace!("proposal server stopped");
    }

    /// The listener sits in a blocking `accept`; one loopback connection to
    /// our own port makes it return and observe the exit flag.
    fn wake_listener(&self) {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        match TcpStream::connect_timeout(&addr, WAKE_TIMEOUT) {
            Ok(_) => {}
            Err(e) => debug!(error = %e, "listener wake connection failed"),
        }
    }
}

impl Drop for ProposalServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(
    listener: TcpListener,
    queue: &ConnectionQueue,
    lifecycle: &Lifecycle,
    metrics: &TransportMetrics,
) {
    lifecycle.wait_for_start();
    trace!("listener loop entered");

    loop {
        // Before blocking again, and right after every accept return.
        if lifecycle.exit_requested() {
            break;
        }

        match listener.accept() {
            Ok((stream, peer_addr)) => {
                // The wake connection from shutdown lands here too.
                if lifecycle.exit_requested() {
                    break;
                }
                metrics.record_connection_accepted();
                let connection = ServerConnection::new(stream, peer_addr.ip());
                if !queue.push(connection) {
                    metrics.record_connection_rejected();
                    warn!(%peer_addr, "connection queue full, rejecting");
                }
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_RETRY_DELAY);
            }
        }
    }

    trace!("listener loop exited");
}

fn worker_loop(
    worker_id: usize,
    queue: &ConnectionQueue,
    dispatcher: &ProtocolDispatcher,
    lifecycle: &Lifecycle,
    metrics: &TransportMetrics,
) {
    lifecycle.wait_for_start();
    trace!(worker_id, "worker loop entered");

    while !lifecycle.exit_requested() {
        let Some(mut connection) = queue.pop(lifecycle) else {
            break;
        };
        let peer_ip = connection.peer_ip();

        if let Err(e) = dispatcher.serve(&mut connection) {
            metrics.record_protocol_error();
            warn!(worker_id, %peer_ip, error = %e, "connection closed on error");
            if e.is_fatal() {
                lifecycle.exit_on_fatal_error(&e.to_string());
            }
        }
        // The connection drops here, closing the socket either way.
    }

    trace!(worker_id, "worker loop exited");
}
