//! Error types for the proposal codec.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while encoding, decoding or reassembling proposals.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed envelope, framing, JSON or size bounds.
    #[error("parse failed: {reason}")]
    Parse {
        /// What was wrong with the bytes.
        reason: String,
        /// Underlying decoder error, when one exists.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A signature did not verify against the resolved public key.
    #[error("signature rejected: {reason}")]
    Signature {
        /// Which check failed.
        reason: String,
    },

    /// A fragment set cannot be assembled as declared.
    #[error("fragment set unusable: {reason}")]
    InvalidState {
        /// Which consistency check failed.
        reason: String,
    },

    /// A caller-supplied value is outside the valid domain.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Which argument and why.
        reason: String,
    },
}

impl CodecError {
    /// A parse error with no underlying cause.
    pub fn parse(reason: impl Into<String>) -> Self {
        CodecError::Parse {
            reason: reason.into(),
            cause: None,
        }
    }

    /// A parse error chaining the decoder error that produced it.
    pub fn parse_with(
        reason: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CodecError::Parse {
            reason: reason.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// A signature rejection.
    pub fn signature(reason: impl Into<String>) -> Self {
        CodecError::Signature {
            reason: reason.into(),
        }
    }

    /// A fragment-set consistency failure.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        CodecError::InvalidState {
            reason: reason.into(),
        }
    }

    /// A domain violation in caller input.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        CodecError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_parse_cause_chain() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CodecError::parse_with("bad header", inner);
        assert!(err.source().is_some());

        let bare = CodecError::parse("truncated");
        assert!(bare.source().is_none());
    }
}
