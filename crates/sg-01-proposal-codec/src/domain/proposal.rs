//! The block proposal entity.

use crate::domain::fragment::{FragmentAssembler, ProposalFragment};
use crate::domain::header::{ProposalHeader, PROPOSAL_MESSAGE_TYPE};
use crate::domain::transaction_list::TransactionList;
use crate::envelope;
use crate::error::{CodecError, Result};
use parking_lot::Mutex;
use shared_crypto::CryptoSuite;
use shared_types::{
    BlockId, ChainId, Hash, NodeId, PartialHash, ProposerIndex, U256, EARLIEST_VALID_TIMESTAMP,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A candidate block authored by one committee member for one height.
///
/// The content hash is computed once at construction; the serialized wire
/// form is computed lazily and memoized, since the same bytes are pushed to
/// every peer and stored verbatim.
#[derive(Debug)]
pub struct BlockProposal {
    chain_id: ChainId,
    proposer_node_id: NodeId,
    block_id: BlockId,
    proposer_index: ProposerIndex,
    timestamp_sec: u64,
    timestamp_ms: u32,
    state_root: U256,
    transactions: TransactionList,
    hash: Hash,
    signature: String,
    serialized: Mutex<Option<Arc<Vec<u8>>>>,
}

impl PartialEq for BlockProposal {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.signature == other.signature
    }
}

impl Eq for BlockProposal {}

#[allow(clippy::too_many_arguments)]
impl BlockProposal {
    /// Construct and sign a fresh local proposal.
    pub fn build(
        chain_id: ChainId,
        proposer_node_id: NodeId,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        transactions: TransactionList,
        state_root: U256,
        timestamp_sec: u64,
        timestamp_ms: u32,
        suite: &dyn CryptoSuite,
    ) -> Result<Self> {
        let mut proposal = Self::assemble(
            chain_id,
            proposer_node_id,
            block_id,
            proposer_index,
            transactions,
            state_root,
            timestamp_sec,
            timestamp_ms,
            String::new(),
        )?;
        proposal.signature = suite
            .sign_ecdsa(&proposal.hash)
            .map_err(|e| CodecError::signature(format!("local signing failed: {e}")))?;
        Ok(proposal)
    }

    /// Reconstruct a proposal that already carries its proposer's signature.
    ///
    /// The signature is NOT verified here; [`BlockProposal::deserialize`]
    /// verifies wire input, and trusted local reloads skip the check.
    pub fn with_signature(
        chain_id: ChainId,
        proposer_node_id: NodeId,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        transactions: TransactionList,
        state_root: U256,
        timestamp_sec: u64,
        timestamp_ms: u32,
        signature: String,
    ) -> Result<Self> {
        Self::assemble(
            chain_id,
            proposer_node_id,
            block_id,
            proposer_index,
            transactions,
            state_root,
            timestamp_sec,
            timestamp_ms,
            signature,
        )
    }

    fn assemble(
        chain_id: ChainId,
        proposer_node_id: NodeId,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        transactions: TransactionList,
        state_root: U256,
        timestamp_sec: u64,
        timestamp_ms: u32,
        signature: String,
    ) -> Result<Self> {
        if timestamp_sec <= EARLIEST_VALID_TIMESTAMP {
            return Err(CodecError::invalid_argument(format!(
                "timestamp {timestamp_sec} predates the validity floor {EARLIEST_VALID_TIMESTAMP}"
            )));
        }
        if proposer_index == 0 {
            return Err(CodecError::invalid_argument(
                "proposer index is 1-based, got 0",
            ));
        }

        let hash = derive_hash(
            chain_id,
            proposer_node_id,
            block_id,
            proposer_index,
            &transactions,
            &state_root,
            timestamp_sec,
            timestamp_ms,
        );

        Ok(Self {
            chain_id,
            proposer_node_id,
            block_id,
            proposer_index,
            timestamp_sec,
            timestamp_ms,
            state_root,
            transactions,
            hash,
            signature,
            serialized: Mutex::new(None),
        })
    }

    /// Canonical content hash.
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Content hash as lowercase hex.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Proposer's ECDSA signature over [`BlockProposal::hash`].
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Chain id.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Node id of the proposer.
    pub fn proposer_node_id(&self) -> NodeId {
        self.proposer_node_id
    }

    /// Block height.
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// 1-based committee position of the proposer.
    pub fn proposer_index(&self) -> ProposerIndex {
        self.proposer_index
    }

    /// Wall-clock seconds at creation.
    pub fn timestamp_sec(&self) -> u64 {
        self.timestamp_sec
    }

    /// Millisecond remainder at creation.
    pub fn timestamp_ms(&self) -> u32 {
        self.timestamp_ms
    }

    /// Prior state commitment.
    pub fn state_root(&self) -> U256 {
        self.state_root
    }

    /// The ordered transactions.
    pub fn transactions(&self) -> &TransactionList {
        &self.transactions
    }

    /// Number of transactions.
    pub fn transaction_count(&self) -> u64 {
        self.transactions.len() as u64
    }

    /// The wire header for this proposal.
    pub fn header(&self) -> ProposalHeader {
        ProposalHeader {
            msg_type: PROPOSAL_MESSAGE_TYPE.to_string(),
            chain_id: self.chain_id,
            proposer_node_id: self.proposer_node_id,
            block_id: self.block_id,
            proposer_index: self.proposer_index,
            transaction_count: self.transaction_count(),
            timestamp_sec: self.timestamp_sec,
            timestamp_ms: self.timestamp_ms,
            state_root: self.state_root,
            tx_sizes: self.transactions.sizes(),
            signature: self.signature.clone(),
        }
    }

    /// The full wire form, memoized after the first call.
    pub fn serialize(&self) -> Result<Arc<Vec<u8>>> {
        let mut memo = self.serialized.lock();
        if let Some(bytes) = memo.as_ref() {
            return Ok(Arc::clone(bytes));
        }

        let header_json = serde_json::to_vec(&self.header())
            .map_err(|e| CodecError::parse_with("header serialization failed", e))?;
        let payload = self.transactions.serialize_framed();
        let bytes = Arc::new(envelope::encode(&header_json, &payload));

        debug_assert_eq!(bytes[envelope::LENGTH_PREFIX_LEN], envelope::HEADER_OPEN);
        debug_assert_eq!(bytes.last().copied(), Some(envelope::PAYLOAD_CLOSE));

        *memo = Some(Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Parse a wire message back into a proposal, verifying the proposer's
    /// ECDSA signature through `suite`.
    pub fn deserialize(bytes: &[u8], suite: &dyn CryptoSuite) -> Result<Self> {
        let (header_bytes, payload) = envelope::split(bytes)?;

        let header: ProposalHeader = serde_json::from_slice(header_bytes)
            .map_err(|e| CodecError::parse_with("proposal header JSON rejected", e))?;

        if header.msg_type != PROPOSAL_MESSAGE_TYPE {
            return Err(CodecError::parse(format!(
                "unexpected message type {:?}",
                header.msg_type
            )));
        }
        if header.transaction_count != header.tx_sizes.len() as u64 {
            return Err(CodecError::parse(format!(
                "transactionCount {} disagrees with {} txSizes entries",
                header.transaction_count,
                header.tx_sizes.len()
            )));
        }

        let transactions = TransactionList::deserialize_framed(&header.tx_sizes, payload)?;

        let proposal = Self::assemble(
            header.chain_id,
            header.proposer_node_id,
            header.block_id,
            header.proposer_index,
            transactions,
            header.state_root,
            header.timestamp_sec,
            header.timestamp_ms,
            header.signature,
        )
        .map_err(|e| CodecError::parse_with("proposal fields rejected", e))?;

        if !suite.verify_ecdsa(&proposal.hash, &proposal.signature, proposal.proposer_index) {
            return Err(CodecError::signature(format!(
                "proposer {} signature does not verify for block {}",
                proposal.proposer_index, proposal.block_id
            )));
        }

        // Keep the exact received bytes so re-serialization is bit-identical.
        *proposal.serialized.lock() = Some(Arc::new(bytes.to_vec()));

        Ok(proposal)
    }

    /// Reassemble a proposal from a complete fragment set.
    pub fn defragment(fragments: &FragmentAssembler, suite: &dyn CryptoSuite) -> Result<Self> {
        let bytes = fragments.assemble()?;
        Self::deserialize(&bytes, suite)
    }

    /// The 16-byte partial hash of every transaction, in order.
    ///
    /// Peers quote these back to request transactions they lack.
    pub fn create_partial_hashes(&self) -> Vec<PartialHash> {
        self.transactions
            .items()
            .iter()
            .map(|t| t.partial_hash())
            .collect()
    }

    /// Cut the `index`-th of `total_fragments` equal slices out of the
    /// serialized form (1-based; the last fragment carries the remainder).
    pub fn fragment(&self, total_fragments: u64, index: u64) -> Result<ProposalFragment> {
        if total_fragments == 0 {
            return Err(CodecError::invalid_argument("total fragment count is 0"));
        }
        if index == 0 || index > total_fragments {
            return Err(CodecError::invalid_argument(format!(
                "fragment index {index} outside 1..={total_fragments}"
            )));
        }

        let bytes = self.serialize()?;
        let len = bytes.len() as u64;
        let standard = if len % total_fragments == 0 {
            len / total_fragments
        } else {
            len / total_fragments + 1
        };

        let start = (standard * (index - 1)).min(len) as usize;
        let end = if index == total_fragments {
            len as usize
        } else {
            (standard * index).min(len) as usize
        };

        let mut data = Vec::with_capacity(end - start + 2);
        data.push(envelope::PAYLOAD_OPEN);
        data.extend_from_slice(&bytes[start..end]);
        data.push(envelope::PAYLOAD_CLOSE);

        Ok(ProposalFragment {
            block_id: self.block_id,
            total_fragments,
            index,
            total_bytes: len,
            proposal_hash_hex: self.hash_hex(),
            data,
        })
    }
}

/// SHA-256 over the canonical field order.
///
/// Fixed-width integers feed in little-endian; the state root feeds as the
/// 64-char hex ASCII of its big-endian bytes (a peer-compatibility quirk,
/// not an accident); the Merkle root is appended only for non-empty blocks.
#[allow(clippy::too_many_arguments)]
fn derive_hash(
    chain_id: ChainId,
    proposer_node_id: NodeId,
    block_id: BlockId,
    proposer_index: ProposerIndex,
    transactions: &TransactionList,
    state_root: &U256,
    timestamp_sec: u64,
    timestamp_ms: u32,
) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(proposer_index.to_le_bytes());
    hasher.update(proposer_node_id.to_le_bytes());
    hasher.update(chain_id.to_le_bytes());
    hasher.update(block_id.to_le_bytes());
    hasher.update((transactions.len() as u64).to_le_bytes());
    hasher.update(timestamp_sec.to_le_bytes());
    hasher.update(timestamp_ms.to_le_bytes());

    let mut root_be = [0u8; 32];
    state_root.to_big_endian(&mut root_be);
    hasher.update(hex::encode(root_be).as_bytes());

    if let Some(merkle_root) = transactions.merkle_root() {
        hasher.update(merkle_root);
    }

    let digest = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::ToySha256Suite;

    const TS: u64 = 1_600_000_000;

    fn suite() -> ToySha256Suite {
        ToySha256Suite::new(7, 3)
    }

    fn empty_proposal() -> BlockProposal {
        BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::empty(),
            U256::zero(),
            TS,
            0,
            &suite(),
        )
        .unwrap()
    }

    fn proposal_with_txs(raws: &[&[u8]]) -> BlockProposal {
        BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::from_raw(raws.iter().map(|r| r.to_vec())),
            U256::from(5),
            TS,
            125,
            &suite(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_proposal_envelope_shape() {
        let p = empty_proposal();
        let bytes = p.serialize().unwrap();
        let header_len = serde_json::to_vec(&p.header()).unwrap().len();

        assert_eq!(bytes.len(), 8 + header_len + 2);
        assert_eq!(bytes[8], b'{');
        assert_eq!(bytes[8 + header_len], b'<');
        assert_eq!(*bytes.last().unwrap(), b'>');
    }

    #[test]
    fn test_roundtrip_empty() {
        let p = empty_proposal();
        let bytes = p.serialize().unwrap();
        let back = BlockProposal::deserialize(&bytes, &suite()).unwrap();

        assert_eq!(back.hash(), p.hash());
        assert_eq!(back.transaction_count(), 0);
        assert_eq!(*back.serialize().unwrap(), *bytes);
    }

    #[test]
    fn test_roundtrip_with_transactions() {
        let p = proposal_with_txs(&[b"first", b"second tx", b"x"]);
        let bytes = p.serialize().unwrap();
        let back = BlockProposal::deserialize(&bytes, &suite()).unwrap();

        assert_eq!(back.hash(), p.hash());
        assert_eq!(back.transactions(), p.transactions());
        assert_eq!(back.state_root(), U256::from(5));
    }

    #[test]
    fn test_serialize_is_memoized() {
        let p = proposal_with_txs(&[b"tx"]);
        let first = p.serialize().unwrap();
        let second = p.serialize().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_hash_deterministic_across_instances() {
        let a = proposal_with_txs(&[b"tx-a", b"tx-b"]);
        let b = proposal_with_txs(&[b"tx-a", b"tx-b"]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_feeds_state_root_as_hex_text() {
        // With stateRoot = 1, the exact ASCII "000...001" must be hashed.
        let p = BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::empty(),
            U256::from(1),
            TS,
            0,
            &suite(),
        )
        .unwrap();

        let mut hasher = Sha256::new();
        hasher.update(3u64.to_le_bytes());
        hasher.update(7u64.to_le_bytes());
        hasher.update(1u64.to_le_bytes());
        hasher.update(42u64.to_le_bytes());
        hasher.update(0u64.to_le_bytes());
        hasher.update(TS.to_le_bytes());
        hasher.update(0u32.to_le_bytes());
        hasher.update(format!("{}1", "0".repeat(63)).as_bytes());

        let digest = hasher.finalize();
        assert_eq!(&p.hash()[..], &digest[..]);
    }

    #[test]
    fn test_hash_includes_merkle_root_only_when_nonempty() {
        let empty = empty_proposal();
        let full = BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::from_raw([b"tx".to_vec()]),
            U256::zero(),
            TS,
            0,
            &suite(),
        )
        .unwrap();
        assert_ne!(empty.hash(), full.hash());

        // Same fields, different transactions => different merkle root.
        let other = BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::from_raw([b"ty".to_vec()]),
            U256::zero(),
            TS,
            0,
            &suite(),
        )
        .unwrap();
        assert_ne!(full.hash(), other.hash());
    }

    #[test]
    fn test_corruption_always_detected() {
        let p = proposal_with_txs(&[b"alpha", b"beta"]);
        let bytes = p.serialize().unwrap();

        // Flip one byte at a time over a sample of offsets, including the
        // prefix, header, framing and payload regions.
        let step = (bytes.len() / 64).max(1);
        for offset in (0..bytes.len()).step_by(step) {
            let mut corrupt = bytes.to_vec();
            corrupt[offset] ^= 0x01;
            let outcome = BlockProposal::deserialize(&corrupt, &suite());
            assert!(
                matches!(
                    outcome,
                    Err(CodecError::Parse { .. }) | Err(CodecError::Signature { .. })
                ),
                "corruption at offset {offset} was not rejected"
            );
        }
    }

    #[test]
    fn test_deserialize_rejects_wrong_signer() {
        let p = proposal_with_txs(&[b"tx"]);
        let bytes = p.serialize().unwrap();

        // A committee on a different seed resolves different keys.
        let foreign = ToySha256Suite::new(999, 3);
        assert!(matches!(
            BlockProposal::deserialize(&bytes, &foreign),
            Err(CodecError::Signature { .. })
        ));
    }

    #[test]
    fn test_rejects_prehistoric_timestamp() {
        let err = BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::empty(),
            U256::zero(),
            EARLIEST_VALID_TIMESTAMP,
            0,
            &suite(),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));
    }

    #[test]
    fn test_partial_hashes_match_transactions() {
        let p = proposal_with_txs(&[b"one", b"two"]);
        let partials = p.create_partial_hashes();
        assert_eq!(partials.len(), 2);
        assert_eq!(&partials[0][..], &p.transactions().items()[0].hash()[..16]);
    }
}
