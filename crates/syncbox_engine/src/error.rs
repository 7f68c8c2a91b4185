//! Error types for the sync engine.

use syncbox_protocol::{CodecError, Operation, QueueItemId, QueueStatus, RecordId, Timestamp};
use syncbox_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine.
///
/// Connectivity and per-item processing problems are not errors at this
/// level; they are recovered inside a cycle and reported as [`CycleError`]
/// entries. A `SyncError` escaping a cycle means the cycle was cut short.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Storage I/O failed. Fatal to the operation in progress.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A persisted row could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The transport could not complete a whole batch call.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// No queue item with this id exists.
    #[error("unknown queue item {0}")]
    UnknownQueueItem(QueueItemId),

    /// A status change that would move a queue item backwards.
    #[error("queue item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Queue item.
        id: QueueItemId,
        /// Current status.
        from: QueueStatus,
        /// Requested status.
        to: QueueStatus,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Another sync cycle is still running.
    #[error("a sync cycle is already in progress")]
    CycleInProgress,

    /// The recurring scheduler could not be started.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this is a storage fault.
    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Storage(_) | SyncError::Codec(_))
    }
}

/// One problem observed during a sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    /// The remote authority was unreachable; the cycle was aborted.
    Connectivity {
        /// When the probe failed.
        at: Timestamp,
    },
    /// The whole batch call failed, so this item failed with it.
    BatchTransport {
        /// Queue item.
        queue_item_id: QueueItemId,
        /// Target record.
        record_id: RecordId,
        /// Failed operation.
        operation: Operation,
        /// Transport message.
        message: String,
        /// Whether the retry budget is now exhausted.
        permanent: bool,
        /// When the failure was recorded.
        at: Timestamp,
    },
    /// The remote rejected this item.
    ItemProcessing {
        /// Queue item.
        queue_item_id: QueueItemId,
        /// Target record.
        record_id: RecordId,
        /// Failed operation.
        operation: Operation,
        /// Rejection message.
        message: String,
        /// Whether the retry budget is now exhausted.
        permanent: bool,
        /// When the failure was recorded.
        at: Timestamp,
    },
    /// A storage fault ended the cycle early.
    Storage {
        /// Storage message.
        message: String,
        /// When the fault surfaced.
        at: Timestamp,
    },
}

impl CycleError {
    /// Tag naming the failed operation, `connectivity` or `storage` for
    /// cycle-level entries.
    pub fn operation_tag(&self) -> &'static str {
        match self {
            CycleError::Connectivity { .. } => "connectivity",
            CycleError::Storage { .. } => "storage",
            CycleError::BatchTransport { operation, .. }
            | CycleError::ItemProcessing { operation, .. } => operation.as_str(),
        }
    }

    /// Record the entry refers to, if any.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            CycleError::BatchTransport { record_id, .. }
            | CycleError::ItemProcessing { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            CycleError::Connectivity { .. } => "remote authority unreachable",
            CycleError::Storage { message, .. }
            | CycleError::BatchTransport { message, .. }
            | CycleError::ItemProcessing { message, .. } => message,
        }
    }

    /// When the entry was recorded.
    pub fn at(&self) -> Timestamp {
        match self {
            CycleError::Connectivity { at }
            | CycleError::Storage { at, .. }
            | CycleError::BatchTransport { at, .. }
            | CycleError::ItemProcessing { at, .. } => *at,
        }
    }

    /// Returns true if the item behind this entry will not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            CycleError::BatchTransport { permanent, .. }
            | CycleError::ItemProcessing { permanent, .. } => *permanent,
            _ => false,
        }
    }
}
