//! Ordered transaction list with Merkle root.

use crate::domain::transaction::Transaction;
use crate::envelope::{PAYLOAD_CLOSE, PAYLOAD_OPEN};
use crate::error::{CodecError, Result};
use shared_crypto::sha256_pair;
use shared_types::Hash;

/// The ordered transactions of one proposal.
///
/// Serialization is the raw concatenation of the transaction bytes; the
/// per-transaction lengths travel separately in the proposal header's
/// `txSizes` array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionList {
    items: Vec<Transaction>,
}

impl TransactionList {
    /// Wrap already-constructed transactions.
    pub fn new(items: Vec<Transaction>) -> Self {
        Self { items }
    }

    /// Build a list from raw byte vectors.
    pub fn from_raw<I: IntoIterator<Item = Vec<u8>>>(raws: I) -> Self {
        Self {
            items: raws.into_iter().map(Transaction::new).collect(),
        }
    }

    /// The empty list.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Transactions in order.
    pub fn items(&self) -> &[Transaction] {
        &self.items
    }

    /// Number of transactions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Per-transaction byte lengths, in list order.
    pub fn sizes(&self) -> Vec<u64> {
        self.items.iter().map(Transaction::byte_len).collect()
    }

    /// Raw concatenation of all transaction bytes.
    pub fn concatenated_bytes(&self) -> Vec<u8> {
        let total: usize = self.items.iter().map(|t| t.data().len()).sum();
        let mut out = Vec::with_capacity(total);
        for tx in &self.items {
            out.extend_from_slice(tx.data());
        }
        out
    }

    /// Concatenation framed with the `<` / `>` payload sentinels.
    pub fn serialize_framed(&self) -> Vec<u8> {
        let total: usize = self.items.iter().map(|t| t.data().len()).sum();
        let mut out = Vec::with_capacity(total + 2);
        out.push(PAYLOAD_OPEN);
        for tx in &self.items {
            out.extend_from_slice(tx.data());
        }
        out.push(PAYLOAD_CLOSE);
        out
    }

    /// Rebuild a list from a framed payload and the declared sizes.
    pub fn deserialize_framed(sizes: &[u64], framed: &[u8]) -> Result<Self> {
        if framed.len() < 2 {
            return Err(CodecError::parse("transaction payload below framing size"));
        }
        if framed[0] != PAYLOAD_OPEN || framed[framed.len() - 1] != PAYLOAD_CLOSE {
            return Err(CodecError::parse("transaction payload framing missing"));
        }

        let inner = &framed[1..framed.len() - 1];
        let declared: u64 = sizes
            .iter()
            .try_fold(0u64, |acc, &s| acc.checked_add(s))
            .ok_or_else(|| CodecError::parse("transaction sizes overflow"))?;
        if declared != inner.len() as u64 {
            return Err(CodecError::parse(format!(
                "transaction sizes declare {declared} bytes, payload carries {}",
                inner.len()
            )));
        }

        let mut items = Vec::with_capacity(sizes.len());
        let mut offset = 0usize;
        for &size in sizes {
            let size = size as usize;
            items.push(Transaction::new(inner[offset..offset + size].to_vec()));
            offset += size;
        }

        Ok(Self { items })
    }

    /// Merkle root over the full transaction hashes, or `None` for an empty
    /// list.
    ///
    /// The tree is balanced binary: the leaf level is padded to the next
    /// power of two by duplicating the last leaf, then reduced pairwise.
    pub fn merkle_root(&self) -> Option<Hash> {
        if self.items.is_empty() {
            return None;
        }

        let mut level: Vec<Hash> = self.items.iter().map(|t| *t.hash()).collect();
        let target = level.len().next_power_of_two();
        while level.len() < target {
            let last = *level.last().unwrap_or(&[0u8; 32]);
            level.push(last);
        }

        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| sha256_pair(&pair[0], &pair[1]))
                .collect();
        }

        Some(level[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::sha256;

    fn list(raws: &[&[u8]]) -> TransactionList {
        TransactionList::from_raw(raws.iter().map(|r| r.to_vec()))
    }

    #[test]
    fn test_framed_roundtrip() {
        let l = list(&[b"aa", b"bbb", b"c"]);
        let framed = l.serialize_framed();
        assert_eq!(framed[0], b'<');
        assert_eq!(*framed.last().unwrap(), b'>');

        let back = TransactionList::deserialize_framed(&l.sizes(), &framed).unwrap();
        assert_eq!(back, l);
    }

    #[test]
    fn test_empty_list_framing() {
        let l = TransactionList::empty();
        assert_eq!(l.serialize_framed(), b"<>");
        let back = TransactionList::deserialize_framed(&[], b"<>").unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_deserialize_rejects_size_mismatch() {
        let l = list(&[b"aa", b"bbb"]);
        let framed = l.serialize_framed();
        assert!(TransactionList::deserialize_framed(&[2, 2], &framed).is_err());
        assert!(TransactionList::deserialize_framed(&[2, 3, 1], &framed).is_err());
    }

    #[test]
    fn test_deserialize_rejects_missing_framing() {
        let l = list(&[b"aa"]);
        let mut framed = l.serialize_framed();
        framed[0] = b'(';
        assert!(TransactionList::deserialize_framed(&l.sizes(), &framed).is_err());
    }

    #[test]
    fn test_merkle_root_empty_is_none() {
        assert!(TransactionList::empty().merkle_root().is_none());
    }

    #[test]
    fn test_merkle_root_single_leaf() {
        let l = list(&[b"only"]);
        // One leaf is already a power of two; the root is the leaf hash.
        assert_eq!(l.merkle_root().unwrap(), sha256(b"only"));
    }

    #[test]
    fn test_merkle_root_duplicates_last_leaf() {
        let three = list(&[b"a", b"b", b"c"]);
        let four = list(&[b"a", b"b", b"c", b"c"]);
        assert_eq!(three.merkle_root(), four.merkle_root());
    }

    #[test]
    fn test_merkle_root_two_leaves() {
        let l = list(&[b"a", b"b"]);
        let expected = sha256_pair(&sha256(b"a"), &sha256(b"b"));
        assert_eq!(l.merkle_root().unwrap(), expected);
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        assert_ne!(
            list(&[b"a", b"b"]).merkle_root(),
            list(&[b"b", b"a"]).merkle_root()
        );
    }
}
