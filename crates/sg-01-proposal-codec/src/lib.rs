//! # Signet Chain - Proposal Codec (Subsystem 01)
//!
//! The deterministic binary form of a block proposal and everything needed
//! to move one across the wire.
//!
//! ## Wire Envelope
//!
//! ```text
//! u64 LE header-length ‖ header JSON ‖ '<' transactions '>'
//! ```
//!
//! The JSON header carries every scalar field of the proposal; large
//! integers travel as decimal strings and the state root as 64 lowercase hex
//! characters. This encoding is a compatibility contract with peer nodes —
//! it must round-trip bit-for-bit and is never "improved" to native JSON
//! numbers.
//!
//! ## Critical Invariants
//!
//! 1. `deserialize(serialize(p))` is hash-equal to `p`.
//! 2. Any single-byte corruption of a serialized proposal fails with a
//!    parse or signature error, never a wrong proposal.
//! 3. The canonical content hash covers the scalar fields, the state root's
//!    hex rendering, and — only for non-empty blocks — the transaction
//!    Merkle root.
//! 4. Fragments are ceiling-divided slices of the serialized form; the
//!    assembler reproduces the exact original bytes or refuses.
//!
//! ## Module Structure
//!
//! - [`envelope`]: length-prefixed framing shared with the transport
//! - [`domain`]: transactions, Merkle root, header, proposal, fragments

#![warn(clippy::all)]

pub mod domain;
pub mod envelope;

mod error;

pub use domain::{
    BlockProposal, FragmentAssembler, ProposalFragment, ProposalHeader, Transaction,
    TransactionList, PROPOSAL_MESSAGE_TYPE,
};
pub use error::{CodecError, Result};

/// Upper bound on the JSON header length accepted from the wire.
pub const MAX_HEADER_LEN: u64 = 8 * 1024 * 1024;
