//! The record store seam and a log-backed implementation.

use crate::clock::Clock;
use crate::collection::LogCollection;
use crate::error::SyncResult;
use parking_lot::RwLock;
use std::sync::Arc;
use syncbox_protocol::{Fields, Record, RecordId, RecordSyncStatus, RecordVersion, Timestamp};
use syncbox_storage::{InMemoryBackend, StorageBackend};

/// Narrow interface the engine needs into the local record store.
///
/// The CRUD half belongs to the application; the engine only calls the
/// metadata writers. Writers tolerate missing records and return `Ok(false)`
/// because queue items reference records weakly.
pub trait RecordStore: Send + Sync {
    /// Creates a record with pending sync status.
    fn create(&self, fields: Fields) -> SyncResult<Record>;

    /// Returns a live (not soft-deleted) record.
    fn get(&self, id: RecordId) -> SyncResult<Option<Record>>;

    /// Replaces a live record's fields and marks it pending.
    fn update(&self, id: RecordId, fields: Fields) -> SyncResult<Option<Record>>;

    /// Soft-deletes a live record. Returns false if there was none.
    fn soft_delete(&self, id: RecordId) -> SyncResult<bool>;

    /// Every record, soft-deleted ones included.
    fn list(&self) -> SyncResult<Vec<Record>>;

    /// Records a successful reconciliation of the local version.
    fn mark_synced(&self, id: RecordId, server_id: Option<String>, at: Timestamp) -> SyncResult<bool>;

    /// Records a failed sync attempt.
    fn mark_error(&self, id: RecordId) -> SyncResult<bool>;

    /// Overwrites local fields with a winning remote version.
    fn apply_remote(
        &self,
        id: RecordId,
        remote: &RecordVersion,
        server_id: Option<String>,
        at: Timestamp,
    ) -> SyncResult<bool>;
}

/// Record store persisted in a frame log.
pub struct LogRecordStore {
    log: RwLock<LogCollection<Record>>,
    clock: Arc<dyn Clock>,
}

impl LogRecordStore {
    /// Opens a store over `backend`, replaying existing records.
    ///
    /// # Errors
    ///
    /// Fails on storage I/O errors or a corrupted log.
    pub fn open<B>(backend: B, clock: Arc<dyn Clock>) -> SyncResult<Self>
    where
        B: StorageBackend + 'static,
    {
        Ok(Self {
            log: RwLock::new(LogCollection::<Record>::open("records", Box::new(backend))?),
            clock,
        })
    }

    /// Opens an empty in-memory store.
    pub fn in_memory(clock: Arc<dyn Clock>) -> SyncResult<Self> {
        Self::open(InMemoryBackend::new(), clock)
    }

    /// Looks up a record whether or not it was soft-deleted.
    pub fn get_any(&self, id: RecordId) -> Option<Record> {
        self.log.read().get(&id).cloned()
    }

    fn modify<F>(&self, id: RecordId, live_only: bool, change: F) -> SyncResult<Option<Record>>
    where
        F: FnOnce(&mut Record),
    {
        let mut log = self.log.write();
        let Some(mut record) = log.get(&id).cloned() else {
            return Ok(None);
        };
        if live_only && record.is_deleted() {
            return Ok(None);
        }
        change(&mut record);
        log.put(record.clone())?;
        Ok(Some(record))
    }
}

impl RecordStore for LogRecordStore {
    fn create(&self, fields: Fields) -> SyncResult<Record> {
        let record = Record::new(RecordId::new(), fields, self.clock.now());
        self.log.write().put(record.clone())?;
        Ok(record)
    }

    fn get(&self, id: RecordId) -> SyncResult<Option<Record>> {
        Ok(self.log.read().get(&id).filter(|r| !r.is_deleted()).cloned())
    }

    fn update(&self, id: RecordId, fields: Fields) -> SyncResult<Option<Record>> {
        let now = self.clock.now();
        self.modify(id, true, |record| {
            record.fields = fields;
            record.updated_at = now;
            record.sync_status = RecordSyncStatus::Pending;
        })
    }

    fn soft_delete(&self, id: RecordId) -> SyncResult<bool> {
        let now = self.clock.now();
        let deleted = self.modify(id, true, |record| {
            record.deleted_at = Some(now);
            record.updated_at = now;
            record.sync_status = RecordSyncStatus::Pending;
        })?;
        Ok(deleted.is_some())
    }

    fn list(&self) -> SyncResult<Vec<Record>> {
        Ok(self.log.read().values().cloned().collect())
    }

    fn mark_synced(&self, id: RecordId, server_id: Option<String>, at: Timestamp) -> SyncResult<bool> {
        let updated = self.modify(id, false, |record| {
            record.sync_status = RecordSyncStatus::Synced;
            if server_id.is_some() {
                record.server_id = server_id;
            }
            record.last_synced_at = Some(at.max(record.updated_at));
        })?;
        Ok(updated.is_some())
    }

    fn mark_error(&self, id: RecordId) -> SyncResult<bool> {
        let updated = self.modify(id, false, |record| {
            record.sync_status = RecordSyncStatus::Error;
        })?;
        Ok(updated.is_some())
    }

    fn apply_remote(
        &self,
        id: RecordId,
        remote: &RecordVersion,
        server_id: Option<String>,
        at: Timestamp,
    ) -> SyncResult<bool> {
        let updated = self.modify(id, false, |record| {
            record.fields = remote.fields.clone();
            record.updated_at = remote.updated_at;
            record.sync_status = RecordSyncStatus::Synced;
            if server_id.is_some() {
                record.server_id = server_id;
            }
            record.last_synced_at = Some(at.max(remote.updated_at));
        })?;
        Ok(updated.is_some())
    }
}
