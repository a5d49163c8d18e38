//! # Signet Chain - DA Certification (Subsystem 03)
//!
//! Collects threshold BLS signature shares per `(blockID, proposerIndex)`
//! and emits a [`DaProof`] — a single aggregated signature witnessing that
//! at least `t = 2N/3 + 1` committee members received the proposal.
//!
//! ## Critical Invariants
//!
//! 1. **Monotone**: a share set never shrinks while open; the proof is
//!    emitted exactly once, on the `t-1 -> t` transition.
//! 2. **Enough/too-much**: shares past `t` are silently dropped; a second
//!    share from the same signer is an error.
//! 3. **Poisoned sets heal**: when the aggregate of `t` shares fails
//!    verification, the whole set is discarded and the key re-opened.
//!
//! ## Module Structure
//!
//! - [`domain`]: [`DaProof`] and the [`domain::ShareSet`] state machine
//! - [`service`]: the per-key [`DaProofAggregator`]

#![warn(clippy::all)]

pub mod domain;
pub mod service;

mod error;

pub use domain::{DaProof, ShareOutcome, ShareSet};
pub use error::{DaError, Result};
pub use service::DaProofAggregator;
