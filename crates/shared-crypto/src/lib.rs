//! # Signet Chain - Shared Crypto
//!
//! SHA-256 helpers plus the [`CryptoSuite`] port behind which the actual
//! signature primitives live. The consensus core only ever calls the port;
//! production deployments plug in a hardware- or library-backed suite, and
//! [`ToySha256Suite`] provides a deterministic stand-in for devnets and
//! tests.

#![warn(clippy::all)]

mod hashing;
mod suite;
mod toy;

pub use hashing::{partial_hash, sha256, sha256_pair};
pub use suite::{CryptoError, CryptoSuite, SigShare, ThresholdSignature};
pub use toy::ToySha256Suite;
