//! # Outbound Ports (Driven Ports)
//!
//! Seams to the transaction pool and the proposer schedule. Both live
//! outside this core: the pool belongs to the pending-queue subsystem and
//! the schedule to the agreement layer.

use parking_lot::Mutex;
use shared_types::{BlockId, ProposerIndex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of pending transactions for the proposer loop.
pub trait TransactionSource: Send + Sync {
    /// Drain up to `limit` pending transactions, in pool order.
    fn pending_transactions(&self, limit: usize) -> Vec<Vec<u8>>;
}

/// Maps a block height to the committee member whose turn it is.
pub trait ProposerSchedule: Send + Sync {
    /// 1-based index of the proposer for `block_id`.
    fn proposer_for(&self, block_id: BlockId) -> ProposerIndex;
}

/// Rotating schedule: block `B` belongs to `(B mod N) + 1`.
#[derive(Debug, Clone, Copy)]
pub struct RoundRobinSchedule {
    node_count: u64,
}

impl RoundRobinSchedule {
    /// A schedule over a committee of `node_count` members.
    pub fn new(node_count: u64) -> Self {
        debug_assert!(node_count > 0);
        Self { node_count }
    }
}

impl ProposerSchedule for RoundRobinSchedule {
    fn proposer_for(&self, block_id: BlockId) -> ProposerIndex {
        block_id % self.node_count + 1
    }
}

/// A simple FIFO pool fed by the host; doubles as the production adapter
/// until a real pending queue is wired in.
#[derive(Debug, Default)]
pub struct PendingQueueSource {
    queue: Mutex<VecDeque<Vec<u8>>>,
}

impl PendingQueueSource {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue one raw transaction.
    pub fn submit(&self, tx: Vec<u8>) {
        self.queue.lock().push_back(tx);
    }

    /// Number of queued transactions.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl TransactionSource for PendingQueueSource {
    fn pending_transactions(&self, limit: usize) -> Vec<Vec<u8>> {
        let mut queue = self.queue.lock();
        let take = limit.min(queue.len());
        queue.drain(..take).collect()
    }
}

/// Deterministic transaction generator for tests and devnet load drills.
#[derive(Debug)]
pub struct TestTransactionGenerator {
    counter: AtomicU64,
    tx_size: usize,
}

impl TestTransactionGenerator {
    /// A generator producing `tx_size`-byte transactions.
    pub fn new(tx_size: usize) -> Self {
        Self {
            counter: AtomicU64::new(0),
            tx_size,
        }
    }
}

impl TransactionSource for TestTransactionGenerator {
    fn pending_transactions(&self, limit: usize) -> Vec<Vec<u8>> {
        (0..limit)
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                let mut tx = format!("generated-tx:{n}:").into_bytes();
                tx.resize(self.tx_size.max(tx.len()), 0x5A);
                tx
            })
            .collect()
    }
}
