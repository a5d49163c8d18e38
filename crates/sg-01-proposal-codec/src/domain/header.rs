//! The JSON proposal header.
//!
//! Field names and encodings are a wire contract shared with peers:
//! 64-bit integers are decimal strings, the state root is 64 lowercase hex
//! characters with no prefix, and `txSizes` is a native JSON int array.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use shared_types::{BlockId, ChainId, NodeId, ProposerIndex, U256};

/// Header `type` value for a pushed block proposal.
pub const PROPOSAL_MESSAGE_TYPE: &str = "BlockProposal";

/// The wire header of a serialized proposal.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalHeader {
    /// Message discriminator, always [`PROPOSAL_MESSAGE_TYPE`].
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Chain the proposal belongs to.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "schainID")]
    pub chain_id: ChainId,

    /// Node id of the proposer.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "proposerNodeID")]
    pub proposer_node_id: NodeId,

    /// Block height.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "blockID")]
    pub block_id: BlockId,

    /// 1-based committee position of the proposer.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "proposerIndex")]
    pub proposer_index: ProposerIndex,

    /// Number of transactions in the payload.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "transactionCount")]
    pub transaction_count: u64,

    /// Wall-clock seconds.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "timeStamp")]
    pub timestamp_sec: u64,

    /// Wall-clock millisecond remainder.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(rename = "timeStampMs")]
    pub timestamp_ms: u32,

    /// Prior state commitment, big-endian hex.
    #[serde(rename = "stateRoot", with = "state_root_hex")]
    pub state_root: U256,

    /// Per-transaction byte lengths; the payload is cut by these.
    #[serde(rename = "txSizes")]
    pub tx_sizes: Vec<u64>,

    /// Proposer's ECDSA signature over the proposal hash.
    pub signature: String,
}

/// The state root travels as exactly 64 lowercase hex characters; peers hash
/// this rendering, so it is validated strictly on input.
mod state_root_hex {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use shared_types::U256;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        serializer.serialize_str(&hex::encode(buf))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.len() != 64 {
            return Err(D::Error::custom(format!(
                "state root must be 64 hex chars, got {}",
                text.len()
            )));
        }
        if !text
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(D::Error::custom("state root must be lowercase hex"));
        }
        U256::from_str_radix(&text, 16).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProposalHeader {
        ProposalHeader {
            msg_type: PROPOSAL_MESSAGE_TYPE.to_string(),
            chain_id: 1,
            proposer_node_id: 7,
            block_id: 42,
            proposer_index: 3,
            transaction_count: 2,
            timestamp_sec: 1_600_000_000,
            timestamp_ms: 250,
            state_root: U256::from(1),
            tx_sizes: vec![10, 20],
            signature: "aabb".to_string(),
        }
    }

    #[test]
    fn test_integers_travel_as_decimal_strings() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains(r#""schainID":"1""#));
        assert!(json.contains(r#""blockID":"42""#));
        assert!(json.contains(r#""timeStamp":"1600000000""#));
        assert!(json.contains(r#""timeStampMs":"250""#));
        // txSizes stays a native int array.
        assert!(json.contains(r#""txSizes":[10,20]"#));
    }

    #[test]
    fn test_state_root_is_64_hex_chars() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains(&format!(r#""stateRoot":"{}1""#, "0".repeat(63))));
    }

    #[test]
    fn test_roundtrip() {
        let header = sample();
        let json = serde_json::to_vec(&header).unwrap();
        let back: ProposalHeader = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn test_rejects_short_or_uppercase_state_root() {
        let mut json = serde_json::to_string(&sample()).unwrap();
        json = json.replace(&"0".repeat(63), &"0".repeat(62));
        assert!(serde_json::from_str::<ProposalHeader>(&json).is_err());

        let mut json = serde_json::to_string(&sample()).unwrap();
        json = json.replace(&format!("{}1", "0".repeat(63)), &format!("{}A", "0".repeat(63)));
        assert!(serde_json::from_str::<ProposalHeader>(&json).is_err());
    }

    #[test]
    fn test_rejects_numeric_ids() {
        // Peers must send decimal strings; a bare number is a different node
        // speaking a different dialect.
        let json = serde_json::to_string(&sample())
            .unwrap()
            .replace(r#""schainID":"1""#, r#""schainID":1"#);
        assert!(serde_json::from_str::<ProposalHeader>(&json).is_err());
    }
}
