//! Length-prefixed wire framing.
//!
//! Every message is `u64 LE header-length ‖ header JSON ‖ payload`, where the
//! header opens with `{` and the payload — when present — is demarcated by
//! `<` and `>`. The sentinel bytes double as cheap corruption tripwires and
//! are verified before any JSON parsing happens.

use crate::error::{CodecError, Result};
use crate::MAX_HEADER_LEN;

/// Width of the little-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = std::mem::size_of::<u64>();

/// First byte of every JSON header.
pub const HEADER_OPEN: u8 = b'{';

/// Last byte of every JSON header.
pub const HEADER_CLOSE: u8 = b'}';

/// Opening payload sentinel.
pub const PAYLOAD_OPEN: u8 = b'<';

/// Closing payload sentinel.
pub const PAYLOAD_CLOSE: u8 = b'>';

/// Concatenate a header and a framed payload into one wire message.
///
/// `payload` must already carry its `<` and `>` sentinels.
pub fn encode(header_json: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + header_json.len() + payload.len());
    out.extend_from_slice(&(header_json.len() as u64).to_le_bytes());
    out.extend_from_slice(header_json);
    out.extend_from_slice(payload);
    out
}

/// Split a wire message into `(header JSON, framed payload)`.
///
/// Enforces the envelope contract: `header-length >= 2`,
/// `header-length + 8 <= total`, `{` at offset 8, `<` right after the
/// header, `>` as the final byte.
pub fn split(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    if bytes.len() < LENGTH_PREFIX_LEN + 2 {
        return Err(CodecError::parse(format!(
            "message too small: {} bytes",
            bytes.len()
        )));
    }

    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(&bytes[..LENGTH_PREFIX_LEN]);
    let header_len = u64::from_le_bytes(prefix);

    if header_len < 2 {
        return Err(CodecError::parse(format!(
            "header length {header_len} below minimum"
        )));
    }
    if header_len > MAX_HEADER_LEN {
        return Err(CodecError::parse(format!(
            "header length {header_len} exceeds bound {MAX_HEADER_LEN}"
        )));
    }
    // Payload must hold at least its two sentinels past the header.
    if header_len + (LENGTH_PREFIX_LEN as u64) + 2 > bytes.len() as u64 {
        return Err(CodecError::parse(format!(
            "header length {header_len} overruns {}-byte message",
            bytes.len()
        )));
    }

    let header_len = header_len as usize;
    let header = &bytes[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + header_len];
    let payload = &bytes[LENGTH_PREFIX_LEN + header_len..];

    if header[0] != HEADER_OPEN {
        return Err(CodecError::parse("header does not start with '{'"));
    }
    if payload[0] != PAYLOAD_OPEN {
        return Err(CodecError::parse("payload does not start with '<'"));
    }
    if *bytes.last().unwrap_or(&0) != PAYLOAD_CLOSE {
        return Err(CodecError::parse("payload does not end with '>'"));
    }

    Ok((header, payload))
}
