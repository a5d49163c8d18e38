//! # Integration Tests
//!
//! Cross-subsystem scenarios: real sockets, real threads, whole-flow
//! certification. Unit-level properties live with their owning crates;
//! here the pieces run together.

#![warn(clippy::all)]

pub mod harness;

#[cfg(test)]
mod certification_flow;
#[cfg(test)]
mod transport_flow;
