//! Queue items: the rows of the outbox.

use crate::types::{Fields, QueueItemId, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation a queue item replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Record was created locally.
    Create,
    /// Record was updated locally.
    Update,
    /// Record was soft-deleted locally.
    Delete,
}

impl Operation {
    /// Returns the lowercase tag used in logs and error entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Parses a lowercase tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "create" => Some(Operation::Create),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }

    /// Returns true if the operation carries field values the remote may
    /// answer with its own version of.
    pub fn writes_fields(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a queue item.
///
/// Transitions only move forward: `Pending -> Synced` or `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for delivery.
    Pending,
    /// Acknowledged by the remote authority.
    Synced,
    /// Retry budget exhausted; kept for diagnosis.
    Failed,
}

impl QueueStatus {
    /// Returns true if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueueStatus::Pending)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (QueueStatus::Pending, QueueStatus::Synced) | (QueueStatus::Pending, QueueStatus::Failed)
        )
    }

    /// Returns the lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Synced => "synced",
            QueueStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending mutation in the outbox.
///
/// `operation` and `payload` are fixed when the item is enqueued; the outbox
/// only ever rewrites the delivery bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Outbox-assigned identifier.
    pub id: QueueItemId,
    /// Record the mutation targets. The record may have been deleted since.
    pub record_id: RecordId,
    /// Mutation kind.
    pub operation: Operation,
    /// Snapshot of the record's fields at enqueue time.
    pub payload: Fields,
    /// Enqueue time; primary batching order.
    pub created_at: Timestamp,
    /// Delivery status.
    pub status: QueueStatus,
    /// Number of processing errors observed so far.
    pub retry_count: u32,
    /// Text of the most recent processing error.
    pub error_message: Option<String>,
    /// Time of acknowledgement.
    pub synced_at: Option<Timestamp>,
}

impl QueueItem {
    /// Creates a fresh pending item.
    pub fn new(
        id: QueueItemId,
        record_id: RecordId,
        operation: Operation,
        payload: Fields,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            record_id,
            operation,
            payload,
            created_at,
            status: QueueStatus::Pending,
            retry_count: 0,
            error_message: None,
            synced_at: None,
        }
    }

    /// Key that totally orders items for batching: `created_at`, then `id`.
    pub fn order_key(&self) -> (Timestamp, QueueItemId) {
        (self.created_at, self.id)
    }

    /// Returns true if the item is still eligible for delivery.
    pub fn is_pending(&self) -> bool {
        self.status == QueueStatus::Pending
    }
}
