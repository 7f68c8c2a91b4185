//! Codec error types.

use thiserror::Error;

/// Result type for encoding and decoding.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while encoding or decoding protocol values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Bytes did not decode into the expected structure.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A text identifier could not be parsed.
    #[error("invalid identifier {input:?}: {reason}")]
    InvalidId {
        /// Input text.
        input: String,
        /// Parser message.
        reason: String,
    },
}
