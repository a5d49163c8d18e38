//! Store domain: key-space layout.

mod keys;

pub use keys::{da_proof_key, da_share_key, proposal_key};
