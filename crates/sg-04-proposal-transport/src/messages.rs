//! Transport message headers.
//!
//! Every connection speaks the same envelope as a serialized proposal:
//! `u64 LE length ‖ JSON header ‖ '<' payload '>'`. The header's `type`
//! field routes to a handler. Status replies are header-only. As on the
//! proposal header, 64-bit integers travel as decimal strings.

use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use sg_01_proposal_codec::ProposalFragment;
use shared_crypto::SigShare;
use shared_types::{BlockId, Hash, ProposerIndex, SignerIndex};

/// Header `type` for a fragment of an oversized proposal.
pub const FRAGMENT_MESSAGE_TYPE: &str = "BlockFragment";

/// Header `type` for a pushed DA signature share.
pub const DA_SHARE_MESSAGE_TYPE: &str = "DAShare";

/// Header `type` for a missing-transactions request.
pub const MISSING_TRANSACTIONS_MESSAGE_TYPE: &str = "MissingTransactions";

/// Header `type` for a status reply.
pub const STATUS_MESSAGE_TYPE: &str = "Status";

/// Outcome of one request, quoted back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Accepted; more of the same exchange is expected.
    #[serde(rename = "PROCEED")]
    Proceed,
    /// Accepted and finished.
    #[serde(rename = "SUCCESS")]
    Success,
    /// Refused; the request was valid protocol but unacceptable.
    #[serde(rename = "REJECTED")]
    Rejected,
    /// Refused; the referenced block is already committed.
    #[serde(rename = "STALE")]
    Stale,
    /// Refused; the referenced block is too far ahead.
    #[serde(rename = "FUTURE")]
    Future,
    /// The referenced object is not held by this node.
    #[serde(rename = "NOT_FOUND")]
    NotFound,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConnectionStatus::Proceed => "PROCEED",
            ConnectionStatus::Success => "SUCCESS",
            ConnectionStatus::Rejected => "REJECTED",
            ConnectionStatus::Stale => "STALE",
            ConnectionStatus::Future => "FUTURE",
            ConnectionStatus::NotFound => "NOT_FOUND",
        };
        f.write_str(text)
    }
}

/// Status reply header; header-only on the wire.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHeader {
    /// Always [`STATUS_MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Outcome code.
    pub status: ConnectionStatus,

    /// Human-readable refusal reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Hex of the responder's DA share, on a successful proposal push.
    #[serde(rename = "sigShare", default, skip_serializing_if = "Option::is_none")]
    pub sig_share_hex: Option<String>,

    /// Committee index of the responder that signed `sigShare`.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(
        rename = "signerIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signer_index: Option<SignerIndex>,

    /// Transaction sizes of a missing-transactions reply payload.
    #[serde(rename = "txSizes", default, skip_serializing_if = "Option::is_none")]
    pub tx_sizes: Option<Vec<u64>>,
}

impl StatusHeader {
    /// A bare status with no attachments.
    pub fn plain(status: ConnectionStatus) -> Self {
        Self {
            msg_type: STATUS_MESSAGE_TYPE.to_string(),
            status,
            reason: None,
            sig_share_hex: None,
            signer_index: None,
            tx_sizes: None,
        }
    }

    /// A refusal with a reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::plain(ConnectionStatus::Rejected)
        }
    }

    /// A success carrying the responder's DA share.
    pub fn success_with_share(share: &SigShare) -> Self {
        Self {
            sig_share_hex: Some(share.to_hex()),
            signer_index: Some(share.signer_index),
            ..Self::plain(ConnectionStatus::Success)
        }
    }

    /// Extract the attached DA share, if the reply carries one.
    pub fn take_share(&self) -> Result<Option<SigShare>> {
        match (&self.sig_share_hex, self.signer_index) {
            (Some(hex_text), Some(signer_index)) => {
                let data = hex::decode(hex_text).map_err(|_| TransportError::Protocol {
                    reason: "sigShare is not valid hex".to_string(),
                })?;
                Ok(Some(SigShare { signer_index, data }))
            }
            (None, None) => Ok(None),
            _ => Err(TransportError::Protocol {
                reason: "sigShare and signerIndex must travel together".to_string(),
            }),
        }
    }
}

/// Header of one proposal fragment; the framed slice is the payload.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentHeader {
    /// Always [`FRAGMENT_MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Block of the fragmented proposal.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "blockID")]
    pub block_id: BlockId,

    /// Declared fragment count of the set.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "totalFragments")]
    pub total_fragments: u64,

    /// 1-based position of this fragment.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "fragmentIndex")]
    pub index: u64,

    /// Length of the whole serialized proposal.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "totalBytes")]
    pub total_bytes: u64,

    /// Hex of the proposal hash identifying the set.
    #[serde(rename = "proposalHash")]
    pub proposal_hash_hex: String,

    /// Length of this message's framed payload.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "fragmentSize")]
    pub fragment_size: u64,
}

impl FragmentHeader {
    /// Header describing `fragment`.
    pub fn for_fragment(fragment: &ProposalFragment) -> Self {
        Self {
            msg_type: FRAGMENT_MESSAGE_TYPE.to_string(),
            block_id: fragment.block_id,
            total_fragments: fragment.total_fragments,
            index: fragment.index,
            total_bytes: fragment.total_bytes,
            proposal_hash_hex: fragment.proposal_hash_hex.clone(),
            fragment_size: fragment.data.len() as u64,
        }
    }

    /// Rebuild the fragment from this header and its framed payload.
    pub fn into_fragment(self, data: Vec<u8>) -> ProposalFragment {
        ProposalFragment {
            block_id: self.block_id,
            total_fragments: self.total_fragments,
            index: self.index,
            total_bytes: self.total_bytes,
            proposal_hash_hex: self.proposal_hash_hex,
            data,
        }
    }
}

/// Header of a pushed DA share; the payload is the empty frame `<>`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaShareHeader {
    /// Always [`DA_SHARE_MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Block of the certified proposal.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "blockID")]
    pub block_id: BlockId,

    /// Proposer slot of the certified proposal.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "proposerIndex")]
    pub proposer_index: ProposerIndex,

    /// Committee index of the signer.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "signerIndex")]
    pub signer_index: SignerIndex,

    /// Hex of the proposal hash the share signs.
    #[serde(rename = "proposalHash")]
    pub proposal_hash_hex: String,

    /// Hex of the share bytes.
    #[serde(rename = "sigShare")]
    pub sig_share_hex: String,
}

/// Header of a missing-transactions request; the payload is the requested
/// 16-byte partial hashes, concatenated and framed.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingTransactionsHeader {
    /// Always [`MISSING_TRANSACTIONS_MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Block of the proposal holding the transactions.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "blockID")]
    pub block_id: BlockId,

    /// Proposer slot of the proposal holding the transactions.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "proposerIndex")]
    pub proposer_index: ProposerIndex,

    /// Number of partial hashes in the payload.
    #[serde_as(as = "DisplayFromStr")]
    pub count: u64,
}

/// Decode a 64-char hex proposal hash from a header field.
pub fn parse_hash_hex(text: &str) -> Result<Hash> {
    let bytes = hex::decode(text).map_err(|_| TransportError::Protocol {
        reason: "proposal hash is not valid hex".to_string(),
    })?;
    bytes.try_into().map_err(|_| TransportError::Protocol {
        reason: "proposal hash is not 32 bytes".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_share_roundtrip() {
        let share = SigShare {
            signer_index: 3,
            data: vec![0xDE, 0xAD],
        };
        let header = StatusHeader::success_with_share(&share);
        let json = serde_json::to_string(&header).unwrap();
        assert!(json.contains(r#""sigShare":"dead""#));
        assert!(json.contains(r#""signerIndex":"3""#));

        let back: StatusHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(back.take_share().unwrap().unwrap(), share);
    }

    #[test]
    fn test_plain_status_omits_optionals() {
        let json = serde_json::to_string(&StatusHeader::plain(ConnectionStatus::Proceed)).unwrap();
        assert!(!json.contains("sigShare"));
        assert!(!json.contains("reason"));
        assert!(json.contains(r#""status":"PROCEED""#));
    }

    #[test]
    fn test_take_share_rejects_half_attachment() {
        let mut header = StatusHeader::plain(ConnectionStatus::Success);
        header.signer_index = Some(2);
        assert!(header.take_share().is_err());
    }

    #[test]
    fn test_fragment_header_roundtrip() {
        let fragment = ProposalFragment {
            block_id: 9,
            total_fragments: 3,
            index: 2,
            total_bytes: 1000,
            proposal_hash_hex: "ab".repeat(32),
            data: b"<slice>".to_vec(),
        };
        let header = FragmentHeader::for_fragment(&fragment);
        assert_eq!(header.fragment_size, 7);

        let json = serde_json::to_vec(&header).unwrap();
        let back: FragmentHeader = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.into_fragment(b"<slice>".to_vec()), fragment);
    }

    #[test]
    fn test_parse_hash_hex_bounds() {
        assert!(parse_hash_hex(&"ab".repeat(32)).is_ok());
        assert!(parse_hash_hex("zz").is_err());
        assert!(parse_hash_hex("abcd").is_err());
    }
}
