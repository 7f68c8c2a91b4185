//! Opening the stores kept in a data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncbox_engine::{Clock, LogRecordStore, OutboxStore, SyncConfig, SyncResult, SystemClock};
use syncbox_storage::FileBackend;

/// Outbox log file name.
pub const OUTBOX_FILE: &str = "outbox.log";

/// Record log file name.
pub const RECORDS_FILE: &str = "records.log";

/// The stores of one data directory.
pub struct Workspace {
    /// Clock shared by both stores.
    pub clock: Arc<dyn Clock>,
    /// Durable outbox.
    pub outbox: OutboxStore,
    /// Local record metadata.
    pub records: LogRecordStore,
}

pub fn outbox_path(dir: &Path) -> PathBuf {
    dir.join(OUTBOX_FILE)
}

pub fn records_path(dir: &Path) -> PathBuf {
    dir.join(RECORDS_FILE)
}

/// Returns true if `dir` holds at least one syncbox log.
pub fn exists(dir: &Path) -> bool {
    outbox_path(dir).exists() || records_path(dir).exists()
}

/// Opens (creating if needed) both stores under `dir`.
///
/// Opening replays the logs and truncates a torn tail.
pub fn open(dir: &Path) -> SyncResult<Workspace> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let outbox = OutboxStore::open(
        FileBackend::open_with_create_dirs(&outbox_path(dir))?,
        Arc::clone(&clock),
        SyncConfig::default().max_retries,
    )?;
    let records = LogRecordStore::open(
        FileBackend::open_with_create_dirs(&records_path(dir))?,
        Arc::clone(&clock),
    )?;
    Ok(Workspace {
        clock,
        outbox,
        records,
    })
}
