//! Outbound peer connections.

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::messages::{
    ConnectionStatus, DaShareHeader, FragmentHeader, MissingTransactionsHeader, StatusHeader,
    DA_SHARE_MESSAGE_TYPE, FRAGMENT_MESSAGE_TYPE, MISSING_TRANSACTIONS_MESSAGE_TYPE,
};
use crate::wire::WireStream;
use sg_01_proposal_codec::envelope::{PAYLOAD_CLOSE, PAYLOAD_OPEN};
use sg_01_proposal_codec::BlockProposal;
use shared_crypto::SigShare;
use shared_types::{BlockId, Hash, PartialHash, ProposerIndex};
use std::net::SocketAddr;
use tracing::debug;

/// A client for one peer's proposal server. Connections are per-exchange:
/// connect, speak, read the reply, close.
#[derive(Debug, Clone)]
pub struct PeerClient {
    addr: SocketAddr,
    config: TransportConfig,
}

impl PeerClient {
    /// A client for the peer at `addr`.
    pub fn new(addr: SocketAddr, config: TransportConfig) -> Self {
        Self { addr, config }
    }

    /// Peer address this client connects to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn rejected(&self, status: &StatusHeader) -> TransportError {
        TransportError::PeerRejected {
            peer: self.addr.to_string(),
            status: status.status.to_string(),
            reason: status.reason.clone().unwrap_or_default(),
        }
    }

    fn expect_share(&self, status: StatusHeader) -> Result<SigShare> {
        if status.status != ConnectionStatus::Success {
            return Err(self.rejected(&status));
        }
        status.take_share()?.ok_or_else(|| TransportError::Protocol {
            reason: "success reply carried no DA share".to_string(),
        })
    }

    /// Push a whole serialized proposal and collect the peer's DA share.
    pub fn push_proposal(&self, proposal: &BlockProposal) -> Result<SigShare> {
        let mut wire = WireStream::connect(self.addr, self.config.connect_timeout())?;
        wire.write_raw(&proposal.serialize()?)?;

        let status: StatusHeader = wire.read_header_as(self.config.max_header_len)?;
        let share = self.expect_share(status)?;
        debug!(
            peer = %self.addr,
            block_id = proposal.block_id(),
            signer_index = share.signer_index,
            "proposal acknowledged"
        );
        Ok(share)
    }

    /// Push a proposal as `total_fragments` slices over one connection and
    /// collect the peer's DA share from the final reply.
    pub fn push_fragments(
        &self,
        proposal: &BlockProposal,
        total_fragments: u64,
    ) -> Result<SigShare> {
        let mut wire = WireStream::connect(self.addr, self.config.connect_timeout())?;

        let mut last_status = None;
        for index in 1..=total_fragments {
            let fragment = proposal.fragment(total_fragments, index)?;
            let header = FragmentHeader::for_fragment(&fragment);
            wire.write_message(&header, &fragment.data)?;

            let status: StatusHeader = wire.read_header_as(self.config.max_header_len)?;
            match status.status {
                ConnectionStatus::Proceed => {}
                ConnectionStatus::Success => {
                    last_status = Some(status);
                    break;
                }
                _ => return Err(self.rejected(&status)),
            }
        }

        let status = last_status.ok_or_else(|| TransportError::Protocol {
            reason: "fragment set completed without a success reply".to_string(),
        })?;
        self.expect_share(status)
    }

    /// Deliver a DA share to a peer that aggregates for this slot.
    pub fn send_da_share(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        proposal_hash: &Hash,
        share: &SigShare,
    ) -> Result<ConnectionStatus> {
        let mut wire = WireStream::connect(self.addr, self.config.connect_timeout())?;
        let header = DaShareHeader {
            msg_type: DA_SHARE_MESSAGE_TYPE.to_string(),
            block_id,
            proposer_index,
            signer_index: share.signer_index,
            proposal_hash_hex: hex::encode(proposal_hash),
            sig_share_hex: share.to_hex(),
        };
        wire.write_message(&header, &[PAYLOAD_OPEN, PAYLOAD_CLOSE])?;

        let status: StatusHeader = wire.read_header_as(self.config.max_header_len)?;
        match status.status {
            ConnectionStatus::Success | ConnectionStatus::Proceed => Ok(status.status),
            _ => Err(self.rejected(&status)),
        }
    }

    /// Fetch transactions of a stored proposal by their partial hashes.
    pub fn request_missing_transactions(
        &self,
        block_id: BlockId,
        proposer_index: ProposerIndex,
        partial_hashes: &[PartialHash],
    ) -> Result<Vec<Vec<u8>>> {
        let mut wire = WireStream::connect(self.addr, self.config.connect_timeout())?;

        let header = MissingTransactionsHeader {
            msg_type: MISSING_TRANSACTIONS_MESSAGE_TYPE.to_string(),
            block_id,
            proposer_index,
            count: partial_hashes.len() as u64,
        };
        let mut payload = Vec::with_capacity(partial_hashes.len() * 16 + 2);
        payload.push(PAYLOAD_OPEN);
        for partial in partial_hashes {
            payload.extend_from_slice(partial);
        }
        payload.push(PAYLOAD_CLOSE);
        wire.write_message(&header, &payload)?;

        let status: StatusHeader = wire.read_header_as(self.config.max_header_len)?;
        if status.status != ConnectionStatus::Success {
            return Err(self.rejected(&status));
        }
        let sizes = status.tx_sizes.clone().ok_or_else(|| TransportError::Protocol {
            reason: "missing-transactions reply lacks txSizes".to_string(),
        })?;

        let body_len = sizes
            .iter()
            .try_fold(2u64, |acc, &s| acc.checked_add(s))
            .ok_or_else(|| TransportError::Protocol {
                reason: "txSizes overflow".to_string(),
            })?;
        let framed = wire.read_framed_payload(body_len, self.config.max_message_size)?;

        let mut transactions = Vec::with_capacity(sizes.len());
        let mut offset = 1usize;
        for &size in &sizes {
            let size = size as usize;
            transactions.push(framed[offset..offset + size].to_vec());
            offset += size;
        }
        Ok(transactions)
    }
}
