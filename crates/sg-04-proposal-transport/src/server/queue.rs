//! The bounded incoming-connection queue.

use crate::lifecycle::Lifecycle;
use crate::server::connection::ServerConnection;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// FIFO of accepted-but-unserved connections, fed by the listener and
/// drained by the worker pool.
#[derive(Debug)]
pub(crate) struct ConnectionQueue {
    inner: Mutex<VecDeque<ServerConnection>>,
    cond: Condvar,
    capacity: usize,
    closed: AtomicBool,
}

impl ConnectionQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue one connection and wake a worker. Returns `false` (dropping
    /// the connection) when the queue is full or closed; the peer retries.
    pub(crate) fn push(&self, connection: ServerConnection) -> bool {
        let mut queue = self.inner.lock();
        if self.closed.load(Ordering::SeqCst) || queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(connection);
        self.cond.notify_one();
        true
    }

    /// Block until a connection is available. Returns `None` once the queue
    /// is closed or shutdown is requested; the exit flag is re-checked after
    /// every condvar wake.
    pub(crate) fn pop(&self, lifecycle: &Lifecycle) -> Option<ServerConnection> {
        let mut queue = self.inner.lock();
        loop {
            if let Some(connection) = queue.pop_front() {
                return Some(connection);
            }
            if self.closed.load(Ordering::SeqCst) || lifecycle.exit_requested() {
                return None;
            }
            self.cond.wait(&mut queue);
        }
    }

    /// Close the queue and wake every waiting worker.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock();
        self.cond.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
