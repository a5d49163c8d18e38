//! Key-space layout.
//!
//! Every logical domain gets its own ASCII prefix so a misdirected read can
//! never alias across domains, and so operators can eyeball keys in debug
//! dumps.

use shared_types::{BlockId, ProposerIndex, SignerIndex};

/// Key of a serialized proposal.
pub fn proposal_key(block_id: BlockId, proposer_index: ProposerIndex) -> Vec<u8> {
    format!("proposal:{block_id}:{proposer_index}").into_bytes()
}

/// Key marking that `signer_index` contributed a DA share for the slot.
pub fn da_share_key(
    block_id: BlockId,
    proposer_index: ProposerIndex,
    signer_index: SignerIndex,
) -> Vec<u8> {
    format!("dashare:{block_id}:{proposer_index}:{signer_index}").into_bytes()
}

/// Key of a committed DA proof.
pub fn da_proof_key(block_id: BlockId, proposer_index: ProposerIndex) -> Vec<u8> {
    format!("daproof:{block_id}:{proposer_index}").into_bytes()
}
