//! Keyed collections persisted as a replayable frame log.

use crate::error::SyncResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use syncbox_protocol::{from_cbor, to_cbor, QueueItem, QueueItemId, Record, RecordId};
use syncbox_storage::{frame, StorageBackend};

/// A row that can live in a [`LogCollection`].
pub(crate) trait Row: Serialize + DeserializeOwned + Clone {
    /// Primary key type.
    type Key: Ord + Copy;

    /// Returns the row's primary key.
    fn key(&self) -> Self::Key;
}

impl Row for QueueItem {
    type Key = QueueItemId;

    fn key(&self) -> QueueItemId {
        self.id
    }
}

impl Row for Record {
    type Key = RecordId;

    fn key(&self) -> RecordId {
        self.id
    }
}

/// An append-only log of full rows; the latest frame per key wins.
///
/// Every `put` is appended and synced before the in-memory index changes,
/// so what `get` returns is always durable.
pub(crate) struct LogCollection<T: Row> {
    name: &'static str,
    backend: Box<dyn StorageBackend>,
    rows: BTreeMap<T::Key, T>,
}

impl<T: Row> LogCollection<T> {
    /// Replays the backend and builds the index.
    pub(crate) fn open(name: &'static str, mut backend: Box<dyn StorageBackend>) -> SyncResult<Self> {
        let frames = frame::recover_frames(&mut backend)?;
        let frame_count = frames.len();

        let mut rows = BTreeMap::new();
        for body in frames {
            let row: T = from_cbor(&body)?;
            rows.insert(row.key(), row);
        }

        tracing::debug!(collection = name, frames = frame_count, rows = rows.len(), "log replayed");

        Ok(Self {
            name,
            backend,
            rows,
        })
    }

    /// Durably writes a row, replacing any previous version.
    pub(crate) fn put(&mut self, row: T) -> SyncResult<()> {
        let body = to_cbor(&row)?;
        let before = self.backend.size()?;

        let written = frame::append_frame(&mut self.backend, &body)
            .and_then(|_| self.backend.sync());
        if let Err(err) = written {
            // Leave no partial frame behind for the next append to follow.
            if let Err(undo) = self.backend.truncate(before) {
                tracing::error!(collection = self.name, error = %undo, "failed to roll back partial frame");
            }
            return Err(err.into());
        }

        self.rows.insert(row.key(), row);
        Ok(())
    }

    pub(crate) fn get(&self, key: &T::Key) -> Option<&T> {
        self.rows.get(key)
    }

    /// Rows in key order.
    pub(crate) fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub(crate) fn last_key(&self) -> Option<T::Key> {
        self.rows.keys().next_back().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }
}
