//! Batch messages exchanged with the remote authority.

use crate::error::CodecResult;
use crate::operation::QueueItem;
use crate::record::RecordVersion;
use crate::{from_cbor, to_cbor};
use serde::{Deserialize, Serialize};

/// A batch of queue items sent in one remote call, in `created_at` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Items to apply remotely.
    pub items: Vec<QueueItem>,
}

impl BatchRequest {
    /// Creates a batch request.
    pub fn new(items: Vec<QueueItem>) -> Self {
        Self { items }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

/// Per-item result of applying a batch remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The remote accepted the mutation.
    Success {
        /// Identifier the remote uses for the record, if it assigned one.
        server_id: Option<String>,
        /// The remote's own version of the record, when it differs from
        /// what was pushed (for example after a concurrent remote edit).
        remote: Option<RecordVersion>,
    },
    /// The remote rejected the mutation.
    Error {
        /// Rejection reason.
        message: String,
    },
}

impl ItemOutcome {
    /// Plain acknowledgement without a remote version.
    pub fn acknowledged(server_id: impl Into<String>) -> Self {
        ItemOutcome::Success {
            server_id: Some(server_id.into()),
            remote: None,
        }
    }

    /// Rejection with a message.
    pub fn error(message: impl Into<String>) -> Self {
        ItemOutcome::Error {
            message: message.into(),
        }
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// Outcomes for a batch, one per request item in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Per-item outcomes.
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchResponse {
    /// Creates a batch response.
    pub fn new(outcomes: Vec<ItemOutcome>) -> Self {
        Self { outcomes }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
