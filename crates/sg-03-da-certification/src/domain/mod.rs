//! Certification domain entities.

mod proof;
mod share_set;

pub use proof::DaProof;
pub use share_set::{ShareOutcome, ShareSet};
