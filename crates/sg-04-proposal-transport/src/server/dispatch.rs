//! Per-connection protocol: header dispatch and the standard handlers.

use crate::error::{Result, TransportError};
use crate::messages::{
    parse_hash_hex, ConnectionStatus, DaShareHeader, FragmentHeader, MissingTransactionsHeader,
    StatusHeader, DA_SHARE_MESSAGE_TYPE, FRAGMENT_MESSAGE_TYPE, MISSING_TRANSACTIONS_MESSAGE_TYPE,
};
use crate::metrics::TransportMetrics;
use crate::server::connection::ServerConnection;
use crate::server::context::ServerContext;
use sg_01_proposal_codec::{
    envelope, BlockProposal, ProposalHeader, Transaction, PROPOSAL_MESSAGE_TYPE,
};
use sg_02_proposal_store::{KeyValueStore, StoreError};
use sg_03_da_certification::DaError;
use shared_crypto::{CryptoSuite, SigShare};
use shared_types::PARTIAL_HASH_LEN;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One registered message handler.
///
/// The dispatcher has already consumed the header; the handler reads its
/// own payload, applies the operation and writes any reply. Returning an
/// error tears the connection down; replying with a status and returning
/// `Ok` keeps it usable.
pub(crate) trait MessageHandler: Send + Sync {
    fn handle(&self, conn: &mut ServerConnection, header_bytes: &[u8]) -> Result<()>;
}

/// Routes each message to the handler registered for its header `type`.
pub struct ProtocolDispatcher {
    handlers: HashMap<&'static str, Box<dyn MessageHandler>>,
    max_header_len: u64,
    metrics: Arc<TransportMetrics>,
}

impl ProtocolDispatcher {
    /// The standard protocol: proposals, fragments, DA shares and
    /// missing-transactions requests.
    pub fn standard<C, K>(ctx: Arc<ServerContext<C, K>>) -> Self
    where
        C: CryptoSuite + 'static,
        K: KeyValueStore + 'static,
    {
        let mut handlers: HashMap<&'static str, Box<dyn MessageHandler>> = HashMap::new();
        handlers.insert(
            PROPOSAL_MESSAGE_TYPE,
            Box::new(ProposalHandler {
                ctx: Arc::clone(&ctx),
            }),
        );
        handlers.insert(
            FRAGMENT_MESSAGE_TYPE,
            Box::new(FragmentHandler {
                ctx: Arc::clone(&ctx),
            }),
        );
        handlers.insert(
            DA_SHARE_MESSAGE_TYPE,
            Box::new(DaShareHandler {
                ctx: Arc::clone(&ctx),
            }),
        );
        handlers.insert(
            MISSING_TRANSACTIONS_MESSAGE_TYPE,
            Box::new(MissingTransactionsHandler {
                ctx: Arc::clone(&ctx),
            }),
        );

        Self {
            handlers,
            max_header_len: ctx.config.max_header_len,
            metrics: Arc::clone(&ctx.metrics),
        }
    }

    /// Serve one connection until the peer closes it or a fatal protocol
    /// error occurs.
    pub fn serve(&self, conn: &mut ServerConnection) -> Result<()> {
        loop {
            let Some(header_bytes) = conn.wire().read_header_bytes(self.max_header_len)? else {
                return Ok(());
            };

            let value: serde_json::Value = serde_json::from_slice(&header_bytes)
                .map_err(|e| TransportError::Protocol {
                    reason: format!("header is not JSON: {e}"),
                })?;
            let msg_type = value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| TransportError::Protocol {
                    reason: "header lacks a type field".to_string(),
                })?;

            match self.handlers.get(msg_type) {
                Some(handler) => {
                    self.metrics.record_message_dispatched();
                    handler.handle(conn, &header_bytes)?;
                }
                None => {
                    let reason = format!("unregistered message type {msg_type:?}");
                    conn.reply_status(&StatusHeader::rejected(&reason))?;
                    return Err(TransportError::Protocol { reason });
                }
            }
        }
    }
}

/// Drop stale/future blocks with a status reply; callers read the payload
/// first so the stream stays aligned. Returns `true` when the handler
/// should stop without an error.
fn reply_if_outside_window<C: CryptoSuite, K: KeyValueStore>(
    ctx: &ServerContext<C, K>,
    conn: &mut ServerConnection,
    block_id: u64,
) -> Result<bool> {
    match ctx.check_block_window(block_id) {
        Ok(()) => Ok(false),
        Err(TransportError::StaleBlock { last_committed, .. }) => {
            debug!(block_id, last_committed, "stale block dropped");
            conn.reply_status(&StatusHeader::plain(ConnectionStatus::Stale))?;
            Ok(true)
        }
        Err(TransportError::FutureBlock { last_committed, .. }) => {
            warn!(block_id, last_committed, "future block dropped");
            conn.reply_status(&StatusHeader::plain(ConnectionStatus::Future))?;
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

struct ProposalHandler<C: CryptoSuite, K: KeyValueStore> {
    ctx: Arc<ServerContext<C, K>>,
}

impl<C: CryptoSuite, K: KeyValueStore> ProposalHandler<C, K> {
    fn ingest(
        &self,
        conn: &mut ServerConnection,
        proposal: &BlockProposal,
    ) -> Result<()> {
        match self.ctx.accept_proposal(proposal) {
            Ok(share) => conn.reply_status(&StatusHeader::success_with_share(&share)),
            Err(TransportError::Store(StoreError::Conflict {
                block_id,
                proposer_index,
            })) => {
                warn!(
                    block_id,
                    proposer_index, "conflicting proposal refused"
                );
                conn.reply_status(&StatusHeader::rejected("conflicting proposal for slot"))
            }
            Err(e) => Err(e),
        }
    }
}

impl<C: CryptoSuite, K: KeyValueStore> MessageHandler for ProposalHandler<C, K> {
    fn handle(&self, conn: &mut ServerConnection, header_bytes: &[u8]) -> Result<()> {
        let header: ProposalHeader =
            serde_json::from_slice(header_bytes).map_err(|e| TransportError::Protocol {
                reason: format!("proposal header rejected: {e}"),
            })?;

        let payload_len = header
            .tx_sizes
            .iter()
            .try_fold(2u64, |acc, &s| acc.checked_add(s))
            .ok_or_else(|| TransportError::Protocol {
                reason: "txSizes overflow".to_string(),
            })?;
        let payload = conn
            .wire()
            .read_framed_payload(payload_len, self.ctx.config.max_message_size)?;

        if reply_if_outside_window(&self.ctx, conn, header.block_id)? {
            return Ok(());
        }
        if header.chain_id != self.ctx.chain_id {
            conn.reply_status(&StatusHeader::rejected("proposal is for another chain"))?;
            return Ok(());
        }

        let bytes = envelope::encode(header_bytes, &payload);
        let proposal = match BlockProposal::deserialize(&bytes, self.ctx.suite.as_ref()) {
            Ok(proposal) => proposal,
            Err(e) => {
                self.ctx.metrics.record_protocol_error();
                conn.reply_status(&StatusHeader::rejected(e.to_string()))?;
                return Err(e.into());
            }
        };

        self.ingest(conn, &proposal)
    }
}

struct FragmentHandler<C: CryptoSuite, K: KeyValueStore> {
    ctx: Arc<ServerContext<C, K>>,
}

impl<C: CryptoSuite, K: KeyValueStore> MessageHandler for FragmentHandler<C, K> {
    fn handle(&self, conn: &mut ServerConnection, header_bytes: &[u8]) -> Result<()> {
        let header: FragmentHeader =
            serde_json::from_slice(header_bytes).map_err(|e| TransportError::Protocol {
                reason: format!("fragment header rejected: {e}"),
            })?;

        if header.total_bytes > self.ctx.config.max_message_size {
            return Err(TransportError::Protocol {
                reason: format!(
                    "fragment set declares {} bytes, above bound {}",
                    header.total_bytes, self.ctx.config.max_message_size
                ),
            });
        }

        let payload = conn
            .wire()
            .read_framed_payload(header.fragment_size, self.ctx.config.max_message_size)?;

        if reply_if_outside_window(&self.ctx, conn, header.block_id)? {
            return Ok(());
        }

        let fragment = header.into_fragment(payload);
        match self.ctx.add_fragment(fragment)? {
            None => conn.reply_status(&StatusHeader::plain(ConnectionStatus::Proceed)),
            Some(bytes) => {
                let proposal = match BlockProposal::deserialize(&bytes, self.ctx.suite.as_ref()) {
                    Ok(proposal) => proposal,
                    Err(e) => {
                        self.ctx.metrics.record_protocol_error();
                        conn.reply_status(&StatusHeader::rejected(e.to_string()))?;
                        return Err(e.into());
                    }
                };

                match self.ctx.accept_proposal(&proposal) {
                    Ok(share) => conn.reply_status(&StatusHeader::success_with_share(&share)),
                    Err(TransportError::Store(StoreError::Conflict { .. })) => {
                        conn.reply_status(&StatusHeader::rejected("conflicting proposal for slot"))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

struct DaShareHandler<C: CryptoSuite, K: KeyValueStore> {
    ctx: Arc<ServerContext<C, K>>,
}

impl<C: CryptoSuite, K: KeyValueStore> MessageHandler for DaShareHandler<C, K> {
    fn handle(&self, conn: &mut ServerConnection, header_bytes: &[u8]) -> Result<()> {
        let header: DaShareHeader =
            serde_json::from_slice(header_bytes).map_err(|e| TransportError::Protocol {
                reason: format!("DA share header rejected: {e}"),
            })?;

        // The share travels in the header; the payload is the empty frame.
        conn.wire()
            .read_framed_payload(2, self.ctx.config.max_message_size)?;

        if reply_if_outside_window(&self.ctx, conn, header.block_id)? {
            return Ok(());
        }

        let hash = parse_hash_hex(&header.proposal_hash_hex)?;
        if let Some(stored) = self
            .ctx
            .store
            .get_proposal_hash(header.block_id, header.proposer_index)
        {
            if stored != hash {
                conn.reply_status(&StatusHeader::rejected(
                    "share hash disagrees with stored proposal",
                ))?;
                return Ok(());
            }
        }

        let share = SigShare {
            signer_index: header.signer_index,
            data: hex::decode(&header.sig_share_hex).map_err(|_| TransportError::Protocol {
                reason: "sigShare is not valid hex".to_string(),
            })?,
        };

        if !self
            .ctx
            .suite
            .verify_bls_share(&hash, &share, header.signer_index)
        {
            self.ctx.metrics.record_protocol_error();
            let err = DaError::InvalidShare {
                signer_index: header.signer_index,
            };
            conn.reply_status(&StatusHeader::rejected(err.to_string()))?;
            return Err(err.into());
        }

        match self.ctx.aggregator.add_share(
            header.block_id,
            header.proposer_index,
            &hash,
            share,
        ) {
            Ok(Some(proof)) => {
                self.ctx.metrics.record_share_collected();
                self.ctx.commit_proof(&proof)?;
                conn.reply_status(&StatusHeader::plain(ConnectionStatus::Success))
            }
            Ok(None) => {
                self.ctx.metrics.record_share_collected();
                conn.reply_status(&StatusHeader::plain(ConnectionStatus::Proceed))
            }
            Err(e @ DaError::DuplicateShare { .. }) => {
                debug!(error = %e, "duplicate DA share");
                conn.reply_status(&StatusHeader::rejected(e.to_string()))
            }
            Err(e @ DaError::InvalidShareSet { .. }) => {
                warn!(error = %e, "share set discarded");
                conn.reply_status(&StatusHeader::rejected(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

struct MissingTransactionsHandler<C: CryptoSuite, K: KeyValueStore> {
    ctx: Arc<ServerContext<C, K>>,
}

impl<C: CryptoSuite, K: KeyValueStore> MessageHandler for MissingTransactionsHandler<C, K> {
    fn handle(&self, conn: &mut ServerConnection, header_bytes: &[u8]) -> Result<()> {
        let header: MissingTransactionsHeader =
            serde_json::from_slice(header_bytes).map_err(|e| TransportError::Protocol {
                reason: format!("missing-transactions header rejected: {e}"),
            })?;

        let payload_len = header
            .count
            .checked_mul(PARTIAL_HASH_LEN as u64)
            .and_then(|n| n.checked_add(2))
            .ok_or_else(|| TransportError::Protocol {
                reason: "partial hash count overflow".to_string(),
            })?;
        let payload = conn
            .wire()
            .read_framed_payload(payload_len, self.ctx.config.max_message_size)?;

        let Some(proposal) = self.ctx.store.get_proposal(
            header.block_id,
            header.proposer_index,
            self.ctx.suite.as_ref(),
        )?
        else {
            conn.reply_status(&StatusHeader::plain(ConnectionStatus::NotFound))?;
            return Ok(());
        };

        let by_partial: HashMap<_, &Transaction> = proposal
            .transactions()
            .items()
            .iter()
            .map(|tx| (tx.partial_hash(), tx))
            .collect();

        let mut sizes = Vec::with_capacity(header.count as usize);
        let mut body = Vec::new();
        for requested in payload[1..payload.len() - 1].chunks(PARTIAL_HASH_LEN) {
            let mut partial = [0u8; PARTIAL_HASH_LEN];
            partial.copy_from_slice(requested);
            let Some(tx) = by_partial.get(&partial) else {
                conn.reply_status(&StatusHeader::rejected("unknown partial hash"))?;
                return Ok(());
            };
            sizes.push(tx.byte_len());
            body.extend_from_slice(tx.data());
        }

        let mut framed = Vec::with_capacity(body.len() + 2);
        framed.push(envelope::PAYLOAD_OPEN);
        framed.extend_from_slice(&body);
        framed.push(envelope::PAYLOAD_CLOSE);

        let mut reply = StatusHeader::plain(ConnectionStatus::Success);
        reply.tx_sizes = Some(sizes);
        conn.wire().write_message(&reply, &framed)
    }
}
