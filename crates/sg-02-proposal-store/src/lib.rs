//! # Signet Chain - Proposal Store (Subsystem 02)
//!
//! At-most-once ingestion of block proposals and the DA bookkeeping that
//! hangs off them, on top of an abstract key-value engine.
//!
//! ## Critical Invariants
//!
//! 1. **At-most-once**: a `(blockID, proposerIndex)` slot is written once;
//!    identical re-insertion is a no-op, conflicting re-insertion is an
//!    error.
//! 2. **Threshold emission**: the per-block [`ProposalVector`] is emitted
//!    exactly when the t-th distinct proposer gains a DA proof.
//! 3. **Prune safety**: pruning never races a concurrent reader of the same
//!    block; both go through the block's mutex.
//!
//! ## Module Structure
//!
//! - [`ports`]: the [`ports::KeyValueStore`] driven port and its in-memory
//!   test adapter
//! - [`domain`]: key-space layout
//! - [`service`]: the [`ProposalStore`] itself

#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

mod error;

pub use error::{Result, StoreError};
pub use ports::{InMemoryKvStore, KeyValueStore, KvStoreError};
pub use service::ProposalStore;
