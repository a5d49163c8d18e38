//! # Signet Chain - Shared Types
//!
//! Core identifiers and committee arithmetic shared by every subsystem.
//!
//! ## Clusters
//!
//! - **Identity**: `ChainId`, `NodeId`, `BlockId`, `ProposerIndex`,
//!   `SignerIndex`
//! - **Digests**: [`Hash`] (full SHA-256), [`PartialHash`] (first 16 bytes,
//!   the compact transaction identifier)
//! - **Committee**: [`Committee`] (size `N`, threshold `t = 2N/3 + 1`),
//!   [`ProposalVector`] (one bit per proposer)

#![warn(clippy::all)]

mod committee;
mod entities;

pub use committee::Committee;
pub use entities::{
    BlockId, ChainId, Hash, NodeId, PartialHash, ProposalVector, ProposerIndex, SignerIndex, U256,
    HASH_LEN, PARTIAL_HASH_LEN,
};

/// Lower bound on proposal wall-clock timestamps (2019-01-01T00:00:00Z).
///
/// Proposals stamped before this are rejected outright; the committee must
/// agree on this value.
pub const EARLIEST_VALID_TIMESTAMP: u64 = 1_546_300_800;
