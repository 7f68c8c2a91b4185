//! Sync metadata carried by local domain records.

use crate::types::{Fields, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the most recent sync attempt touching a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSyncStatus {
    /// Local changes not yet acknowledged.
    Pending,
    /// Reconciled with the remote authority.
    Synced,
    /// Last attempt failed.
    Error,
}

impl fmt::Display for RecordSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordSyncStatus::Pending => "pending",
            RecordSyncStatus::Synced => "synced",
            RecordSyncStatus::Error => "error",
        })
    }
}

/// A version of a record's fields, stamped with its modification time.
///
/// This is what the conflict rule compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordVersion {
    /// Field values.
    pub fields: Fields,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl RecordVersion {
    /// Creates a version.
    pub fn new(fields: Fields, updated_at: Timestamp) -> Self {
        Self { fields, updated_at }
    }
}

/// A local domain record together with its sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Local identifier.
    pub id: RecordId,
    /// Domain field values.
    pub fields: Fields,
    /// Outcome of the latest sync attempt.
    pub sync_status: RecordSyncStatus,
    /// Identifier assigned by the remote authority.
    pub server_id: Option<String>,
    /// Time of the last successful reconciliation.
    pub last_synced_at: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last local modification time.
    pub updated_at: Timestamp,
    /// Soft-delete marker.
    pub deleted_at: Option<Timestamp>,
}

impl Record {
    /// Creates a new, never-synced record.
    pub fn new(id: RecordId, fields: Fields, now: Timestamp) -> Self {
        Self {
            id,
            fields,
            sync_status: RecordSyncStatus::Pending,
            server_id: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns the current field values as a comparable version.
    pub fn version(&self) -> RecordVersion {
        RecordVersion::new(self.fields.clone(), self.updated_at)
    }

    /// Returns true if the record was soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
