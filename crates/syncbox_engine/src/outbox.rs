//! Durable outbox of pending mutations.

use crate::clock::Clock;
use crate::collection::LogCollection;
use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::sync::Arc;
use syncbox_protocol::{Fields, Operation, QueueItem, QueueItemId, QueueStatus, RecordId, Timestamp};
use syncbox_storage::{InMemoryBackend, StorageBackend};

/// Result of recording a processing error against a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Retry count after the increment.
    pub retry_count: u32,
    /// Whether the item became permanently failed.
    pub permanent: bool,
}

/// Item counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    /// Items awaiting delivery.
    pub pending: usize,
    /// Acknowledged items still archived in the log.
    pub synced: usize,
    /// Permanently failed items.
    pub failed: usize,
}

struct Inner {
    log: LogCollection<QueueItem>,
    next_id: u64,
    /// Highest `created_at` ever stamped, persisted items included.
    last_created_at: Timestamp,
}

/// Durable, ordered log of queue items.
///
/// # Invariants
///
/// - Item ids increase with every enqueue, including across reopen
/// - `created_at` strictly increases with every enqueue, including across
///   reopen with a clock that reads earlier than the persisted items
/// - `operation` and `payload` never change after enqueue
/// - Status only moves `pending -> synced` or `pending -> failed`
/// - `retry_count` never decreases and never exceeds `max_retries`
///
/// Synced items stay in the log as an archive; they are simply excluded from
/// [`OutboxStore::pending_items`].
pub struct OutboxStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl OutboxStore {
    /// Opens an outbox over `backend`, replaying any persisted items.
    ///
    /// # Errors
    ///
    /// Fails on storage I/O errors or a corrupted log.
    pub fn open<B>(backend: B, clock: Arc<dyn Clock>, max_retries: u32) -> SyncResult<Self>
    where
        B: StorageBackend + 'static,
    {
        let log = LogCollection::<QueueItem>::open("outbox", Box::new(backend))?;
        let next_id = log.last_key().map_or(1, |id| id.as_u64() + 1);
        let last_created_at = log
            .values()
            .map(|item| item.created_at)
            .max()
            .unwrap_or(Timestamp::ZERO);

        Ok(Self {
            inner: RwLock::new(Inner {
                log,
                next_id,
                last_created_at,
            }),
            clock,
            max_retries,
        })
    }

    /// Opens an empty outbox held in memory.
    pub fn in_memory(clock: Arc<dyn Clock>, max_retries: u32) -> SyncResult<Self> {
        Self::open(InMemoryBackend::new(), clock, max_retries)
    }

    /// Returns the retry ceiling.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Appends a new pending item and returns its id.
    ///
    /// The item is stamped with the clock reading, or one millisecond past
    /// the newest item already held if the clock reads earlier.
    ///
    /// # Errors
    ///
    /// Only storage faults; there is no business-level rejection.
    pub fn enqueue(
        &self,
        record_id: RecordId,
        operation: Operation,
        payload: Fields,
    ) -> SyncResult<QueueItemId> {
        let mut inner = self.inner.write();
        let id = QueueItemId::new(inner.next_id);
        let created_at = self
            .clock
            .now()
            .max(inner.last_created_at.saturating_add_millis(1));
        let item = QueueItem::new(id, record_id, operation, payload, created_at);

        inner.log.put(item)?;
        inner.next_id += 1;
        inner.last_created_at = created_at;

        tracing::debug!(queue_item = %id, record = %record_id, operation = %operation, "mutation enqueued");
        Ok(id)
    }

    /// Snapshot of all pending items, oldest first (ties by id).
    ///
    /// Items enqueued after the snapshot is taken are left for the next call.
    pub fn pending_items(&self) -> Vec<QueueItem> {
        self.items_with_status(QueueStatus::Pending)
    }

    /// Snapshot of items in `status`, ordered like [`Self::pending_items`].
    pub fn items_with_status(&self, status: QueueStatus) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self
            .inner
            .read()
            .log
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect();
        items.sort_by_key(QueueItem::order_key);
        items
    }

    /// Items whose retry budget is exhausted.
    pub fn failed_items(&self) -> Vec<QueueItem> {
        self.items_with_status(QueueStatus::Failed)
    }

    /// Looks up one item in any status.
    pub fn get(&self, id: QueueItemId) -> Option<QueueItem> {
        self.inner.read().log.get(&id).cloned()
    }

    /// Counts items by status.
    pub fn stats(&self) -> OutboxStats {
        let inner = self.inner.read();
        let mut stats = OutboxStats::default();
        for item in inner.log.values() {
            match item.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Synced => stats.synced += 1,
                QueueStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Marks an item as acknowledged.
    ///
    /// Returns `false` without writing anything if the item was already
    /// synced, so `synced_at` keeps its first value.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownQueueItem`], [`SyncError::InvalidTransition`] for
    /// a permanently failed item, or a storage fault.
    pub fn mark_synced(&self, id: QueueItemId) -> SyncResult<bool> {
        let mut inner = self.inner.write();
        let mut item = inner
            .log
            .get(&id)
            .cloned()
            .ok_or(SyncError::UnknownQueueItem(id))?;

        if item.status == QueueStatus::Synced {
            return Ok(false);
        }
        if !item.status.can_transition_to(QueueStatus::Synced) {
            return Err(SyncError::InvalidTransition {
                id,
                from: item.status,
                to: QueueStatus::Synced,
            });
        }

        item.status = QueueStatus::Synced;
        item.synced_at = Some(self.clock.now());
        inner.log.put(item)?;
        Ok(true)
    }

    /// Records a processing error against a pending item.
    ///
    /// Increments `retry_count` and stores `error`. Once the count reaches
    /// the ceiling the item becomes `failed` and leaves the pending set for
    /// good; otherwise it stays pending for the next cycle.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownQueueItem`], [`SyncError::InvalidTransition`] for
    /// an item that is no longer pending, or a storage fault.
    pub fn record_failure(&self, id: QueueItemId, error: &str) -> SyncResult<FailureOutcome> {
        let mut inner = self.inner.write();
        let mut item = inner
            .log
            .get(&id)
            .cloned()
            .ok_or(SyncError::UnknownQueueItem(id))?;

        if !item.status.can_transition_to(QueueStatus::Failed) {
            return Err(SyncError::InvalidTransition {
                id,
                from: item.status,
                to: QueueStatus::Failed,
            });
        }

        item.retry_count = item.retry_count.saturating_add(1);
        item.error_message = Some(error.to_string());
        let permanent = item.retry_count >= self.max_retries;
        if permanent {
            item.status = QueueStatus::Failed;
        }

        let outcome = FailureOutcome {
            retry_count: item.retry_count,
            permanent,
        };
        inner.log.put(item)?;
        Ok(outcome)
    }

    /// Total number of items held, in any status.
    pub fn len(&self) -> usize {
        self.inner.read().log.len()
    }

    /// Returns true if no item was ever enqueued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
