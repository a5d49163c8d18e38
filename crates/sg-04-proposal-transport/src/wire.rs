//! Blocking socket helpers shared by server and client.

use crate::error::{Result, TransportError};
use sg_01_proposal_codec::envelope::{
    HEADER_CLOSE, HEADER_OPEN, LENGTH_PREFIX_LEN, PAYLOAD_CLOSE, PAYLOAD_OPEN,
};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// A blocking TCP stream speaking the length-prefixed envelope.
#[derive(Debug)]
pub(crate) struct WireStream {
    stream: TcpStream,
}

impl WireStream {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub(crate) fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Ok(Self::new(stream))
    }

    /// Read the next message's header JSON.
    ///
    /// Returns `None` on a clean EOF before any byte of the next message;
    /// EOF inside a message is an error.
    pub(crate) fn read_header_bytes(&mut self, max_len: u64) -> Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        if !read_exact_or_eof(&mut self.stream, &mut prefix)? {
            return Ok(None);
        }

        let len = u64::from_le_bytes(prefix);
        if len < 2 || len > max_len {
            return Err(TransportError::Protocol {
                reason: format!("header length {len} outside 2..={max_len}"),
            });
        }

        let mut header = vec![0u8; len as usize];
        self.stream.read_exact(&mut header)?;

        if header[0] != HEADER_OPEN || header[header.len() - 1] != HEADER_CLOSE {
            return Err(TransportError::Protocol {
                reason: "header is not brace-delimited JSON".to_string(),
            });
        }

        Ok(Some(header))
    }

    /// Read and parse the next message's header into a typed struct.
    pub(crate) fn read_header_as<T: serde::de::DeserializeOwned>(
        &mut self,
        max_len: u64,
    ) -> Result<T> {
        let header = self
            .read_header_bytes(max_len)?
            .ok_or_else(|| TransportError::Protocol {
                reason: "peer closed before replying".to_string(),
            })?;
        serde_json::from_slice(&header).map_err(|e| TransportError::Protocol {
            reason: format!("reply header rejected: {e}"),
        })
    }

    /// Read a `<`-`>` framed payload of exactly `expected_len` bytes.
    pub(crate) fn read_framed_payload(&mut self, expected_len: u64, max_len: u64) -> Result<Vec<u8>> {
        if expected_len < 2 || expected_len > max_len {
            return Err(TransportError::Protocol {
                reason: format!("payload length {expected_len} outside 2..={max_len}"),
            });
        }

        let mut payload = vec![0u8; expected_len as usize];
        self.stream.read_exact(&mut payload)?;

        if payload[0] != PAYLOAD_OPEN || payload[payload.len() - 1] != PAYLOAD_CLOSE {
            return Err(TransportError::Protocol {
                reason: "payload sentinels missing".to_string(),
            });
        }

        Ok(payload)
    }

    /// Write pre-encoded message bytes.
    pub(crate) fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Write a header-only message (status replies).
    pub(crate) fn write_header_only<T: serde::Serialize>(&mut self, header: &T) -> Result<()> {
        let json = serde_json::to_vec(header).map_err(|e| TransportError::Protocol {
            reason: format!("header serialization failed: {e}"),
        })?;
        let mut message = Vec::with_capacity(LENGTH_PREFIX_LEN + json.len());
        message.extend_from_slice(&(json.len() as u64).to_le_bytes());
        message.extend_from_slice(&json);
        self.write_raw(&message)
    }

    /// Write a header plus a framed payload.
    pub(crate) fn write_message<T: serde::Serialize>(
        &mut self,
        header: &T,
        payload: &[u8],
    ) -> Result<()> {
        let json = serde_json::to_vec(header).map_err(|e| TransportError::Protocol {
            reason: format!("header serialization failed: {e}"),
        })?;
        self.write_raw(&sg_01_proposal_codec::envelope::encode(&json, payload))
    }
}

/// Fill `buf` from the stream. `Ok(false)` means the peer closed before the
/// first byte; closing mid-buffer is an error.
fn read_exact_or_eof(stream: &mut TcpStream, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "peer closed mid-message",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
