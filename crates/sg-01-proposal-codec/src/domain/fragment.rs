//! Proposal fragments and their reassembly.
//!
//! Oversized proposals are cut into `ceil(len / n)`-byte slices; each slice
//! travels framed with `<` and `>` plus enough metadata to rebuild the
//! original byte-for-byte.

use crate::envelope::{PAYLOAD_CLOSE, PAYLOAD_OPEN};
use crate::error::{CodecError, Result};
use shared_types::BlockId;

/// One framed slice of a serialized proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalFragment {
    /// Block the sliced proposal is for.
    pub block_id: BlockId,
    /// How many fragments the proposal was cut into.
    pub total_fragments: u64,
    /// 1-based position of this fragment.
    pub index: u64,
    /// Length of the whole serialized proposal.
    pub total_bytes: u64,
    /// Hex of the proposal hash, identifying the set.
    pub proposal_hash_hex: String,
    /// `<` ‖ slice ‖ `>`.
    pub data: Vec<u8>,
}

impl ProposalFragment {
    /// The slice without its framing sentinels.
    pub fn slice(&self) -> Result<&[u8]> {
        if self.data.len() < 2
            || self.data[0] != PAYLOAD_OPEN
            || self.data[self.data.len() - 1] != PAYLOAD_CLOSE
        {
            return Err(CodecError::invalid_state(format!(
                "fragment {}/{} framing missing",
                self.index, self.total_fragments
            )));
        }
        Ok(&self.data[1..self.data.len() - 1])
    }
}

/// Collects the fragments of one proposal and reproduces the original
/// serialized bytes once all of them arrived.
#[derive(Debug)]
pub struct FragmentAssembler {
    block_id: BlockId,
    total_fragments: u64,
    total_bytes: u64,
    proposal_hash_hex: String,
    slots: Vec<Option<Vec<u8>>>,
    received: usize,
}

impl FragmentAssembler {
    /// An empty assembler with the set's declared metadata.
    pub fn new(
        block_id: BlockId,
        total_fragments: u64,
        total_bytes: u64,
        proposal_hash_hex: String,
    ) -> Result<Self> {
        if total_fragments == 0 {
            return Err(CodecError::invalid_argument("total fragment count is 0"));
        }
        Ok(Self {
            block_id,
            total_fragments,
            total_bytes,
            proposal_hash_hex,
            slots: vec![None; total_fragments as usize],
            received: 0,
        })
    }

    /// An assembler seeded from the first fragment of a set.
    pub fn for_fragment(fragment: &ProposalFragment) -> Result<Self> {
        Self::new(
            fragment.block_id,
            fragment.total_fragments,
            fragment.total_bytes,
            fragment.proposal_hash_hex.clone(),
        )
    }

    /// Block this set belongs to.
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Hex of the proposal hash this set reassembles into.
    pub fn proposal_hash_hex(&self) -> &str {
        &self.proposal_hash_hex
    }

    /// Declared fragment count.
    pub fn total_fragments(&self) -> u64 {
        self.total_fragments
    }

    /// Accept one fragment. Re-delivery of an identical fragment is a
    /// no-op; anything inconsistent with the set's metadata is refused.
    pub fn add(&mut self, fragment: &ProposalFragment) -> Result<()> {
        if fragment.index == 0 || fragment.index > self.total_fragments {
            return Err(CodecError::invalid_state(format!(
                "fragment index {} outside 1..={}",
                fragment.index, self.total_fragments
            )));
        }
        if fragment.block_id != self.block_id
            || fragment.total_fragments != self.total_fragments
            || fragment.total_bytes != self.total_bytes
            || fragment.proposal_hash_hex != self.proposal_hash_hex
        {
            return Err(CodecError::invalid_state(format!(
                "fragment {} metadata disagrees with its set",
                fragment.index
            )));
        }

        let slice = fragment.slice()?;
        let slot = &mut self.slots[fragment.index as usize - 1];
        match slot {
            Some(existing) if existing.as_slice() == slice => Ok(()),
            Some(_) => Err(CodecError::invalid_state(format!(
                "fragment {} re-delivered with different bytes",
                fragment.index
            ))),
            None => {
                *slot = Some(slice.to_vec());
                self.received += 1;
                Ok(())
            }
        }
    }

    /// Whether every declared fragment has arrived.
    pub fn is_complete(&self) -> bool {
        self.received == self.total_fragments as usize
    }

    /// Indexes still outstanding.
    pub fn missing(&self) -> Vec<u64> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i as u64 + 1)
            .collect()
    }

    /// Concatenate the stripped fragments back into the serialized proposal.
    pub fn assemble(&self) -> Result<Vec<u8>> {
        if !self.is_complete() {
            return Err(CodecError::invalid_state(format!(
                "fragments missing: {:?}",
                self.missing()
            )));
        }

        let mut out = Vec::with_capacity(self.total_bytes as usize);
        for slot in &self.slots {
            if let Some(slice) = slot {
                out.extend_from_slice(slice);
            }
        }

        if out.len() as u64 != self.total_bytes {
            return Err(CodecError::invalid_state(format!(
                "assembled {} bytes, set declared {}",
                out.len(),
                self.total_bytes
            )));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::proposal::BlockProposal;
    use crate::domain::transaction_list::TransactionList;
    use shared_crypto::ToySha256Suite;
    use shared_types::U256;

    fn suite() -> ToySha256Suite {
        ToySha256Suite::new(7, 3)
    }

    fn proposal_of_roughly(len: usize) -> BlockProposal {
        // One fat transaction gets the serialized form near `len` bytes.
        BlockProposal::build(
            1,
            7,
            42,
            3,
            TransactionList::from_raw([vec![0xAB; len]]),
            U256::zero(),
            1_600_000_000,
            0,
            &suite(),
        )
        .unwrap()
    }

    fn exactly_1000_byte_proposal() -> BlockProposal {
        // Pad the transaction until the envelope lands on exactly 1000.
        let base = proposal_of_roughly(0);
        let overhead = base.serialize().unwrap().len();
        // Adding n payload bytes grows the envelope by n plus the growth of
        // the decimal size entry in txSizes; search the exact padding.
        for pad in (1000 - overhead - 8)..(1000 - overhead + 8) {
            let p = proposal_of_roughly(pad);
            if p.serialize().unwrap().len() == 1000 {
                return p;
            }
        }
        panic!("could not hit 1000 bytes");
    }

    #[test]
    fn test_thousand_byte_ceiling_split() {
        let p = exactly_1000_byte_proposal();

        let f1 = p.fragment(3, 1).unwrap();
        let f2 = p.fragment(3, 2).unwrap();
        let f3 = p.fragment(3, 3).unwrap();

        // ceil(1000/3) = 334 for the first two, remainder 332 for the last;
        // framing adds two bytes to each.
        assert_eq!(f1.slice().unwrap().len(), 334);
        assert_eq!(f2.slice().unwrap().len(), 334);
        assert_eq!(f3.slice().unwrap().len(), 332);
        assert_eq!(f3.data.len(), 334);

        let mut assembler = FragmentAssembler::for_fragment(&f1).unwrap();
        assembler.add(&f1).unwrap();
        assembler.add(&f2).unwrap();
        assembler.add(&f3).unwrap();

        assert_eq!(assembler.assemble().unwrap(), *p.serialize().unwrap());
    }

    #[test]
    fn test_defragment_roundtrip() {
        let p = proposal_of_roughly(700);
        let total = 4;

        let mut assembler = None;
        // Deliberately out of order.
        for index in [3, 1, 4, 2] {
            let f = p.fragment(total, index).unwrap();
            let a = match assembler.as_mut() {
                Some(a) => a,
                None => {
                    assembler = Some(FragmentAssembler::for_fragment(&f).unwrap());
                    assembler.as_mut().unwrap()
                }
            };
            a.add(&f).unwrap();
        }

        let back = BlockProposal::defragment(&assembler.unwrap(), &suite()).unwrap();
        assert_eq!(back.hash(), p.hash());
    }

    #[test]
    fn test_missing_fragment_refused() {
        let p = proposal_of_roughly(500);
        let f1 = p.fragment(3, 1).unwrap();
        let f3 = p.fragment(3, 3).unwrap();

        let mut assembler = FragmentAssembler::for_fragment(&f1).unwrap();
        assembler.add(&f1).unwrap();
        assembler.add(&f3).unwrap();

        assert!(!assembler.is_complete());
        assert_eq!(assembler.missing(), vec![2]);
        assert!(matches!(
            assembler.assemble(),
            Err(CodecError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_mismatched_metadata_refused() {
        let p = proposal_of_roughly(500);
        let other = proposal_of_roughly(501);

        let f1 = p.fragment(2, 1).unwrap();
        let alien = other.fragment(2, 2).unwrap();

        let mut assembler = FragmentAssembler::for_fragment(&f1).unwrap();
        assembler.add(&f1).unwrap();
        assert!(matches!(
            assembler.add(&alien),
            Err(CodecError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_out_of_range_index_refused() {
        let p = proposal_of_roughly(100);
        assert!(p.fragment(0, 1).is_err());
        assert!(p.fragment(3, 0).is_err());
        assert!(p.fragment(3, 4).is_err());

        let f = p.fragment(2, 1).unwrap();
        let mut assembler = FragmentAssembler::for_fragment(&f).unwrap();
        let mut bad = f.clone();
        bad.index = 3;
        assert!(assembler.add(&bad).is_err());
    }

    #[test]
    fn test_identical_redelivery_is_noop() {
        let p = proposal_of_roughly(300);
        let f = p.fragment(2, 1).unwrap();

        let mut assembler = FragmentAssembler::for_fragment(&f).unwrap();
        assembler.add(&f).unwrap();
        assembler.add(&f).unwrap();
        assert_eq!(assembler.missing(), vec![2]);
    }

    #[test]
    fn test_single_fragment_set() {
        let p = proposal_of_roughly(50);
        let f = p.fragment(1, 1).unwrap();

        let mut assembler = FragmentAssembler::for_fragment(&f).unwrap();
        assembler.add(&f).unwrap();
        assert_eq!(assembler.assemble().unwrap(), *p.serialize().unwrap());
    }
}
