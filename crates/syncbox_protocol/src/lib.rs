//! # syncbox protocol
//!
//! Data model and wire types shared by the sync engine and a remote
//! authority.
//!
//! This crate provides:
//! - [`QueueItem`] for pending outbox mutations
//! - [`Record`] sync metadata for local domain records
//! - [`BatchRequest`] / [`BatchResponse`] with CBOR codecs
//! - [`resolve`], the last-write-wins conflict rule
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod error;
mod messages;
mod operation;
mod record;
mod types;

pub use conflict::{resolve, Winner};
pub use error::{CodecError, CodecResult};
pub use messages::{BatchRequest, BatchResponse, ItemOutcome};
pub use operation::{Operation, QueueItem, QueueStatus};
pub use record::{Record, RecordSyncStatus, RecordVersion};
pub use types::{Fields, QueueItemId, RecordId, Timestamp};

/// Encodes any serializable value as CBOR.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn to_cbor<T: serde::Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a valid encoding of `T`.
pub fn from_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
