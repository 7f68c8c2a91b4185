//! Inspect command implementation.

use crate::workspace;
use serde::Serialize;
use std::path::Path;
use syncbox_engine::RecordStore;
use syncbox_protocol::RecordSyncStatus;
use syncbox_storage::{frame, FileBackend, StorageBackend};

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Outbox log statistics.
    pub outbox_log: LogStats,
    /// Record log statistics.
    pub records_log: LogStats,
    /// Queue items waiting for delivery.
    pub pending: usize,
    /// Queue items acknowledged.
    pub synced: usize,
    /// Queue items that exhausted their retries.
    pub failed: usize,
    /// Record counts by sync status.
    pub records: RecordCounts,
}

/// Statistics for one log file.
#[derive(Debug, Default, Serialize)]
pub struct LogStats {
    /// File size in bytes.
    pub size: u64,
    /// Number of intact frames.
    pub frames: usize,
    /// Whether the log ends in a torn frame.
    pub torn_tail: bool,
}

/// Record counts by sync status.
#[derive(Debug, Default, Serialize)]
pub struct RecordCounts {
    /// All records, deleted included.
    pub total: usize,
    /// Soft-deleted records.
    pub deleted: usize,
    /// Records with unsynced changes.
    pub pending: usize,
    /// Records in sync with the remote.
    pub synced: usize,
    /// Records whose last push was rejected.
    pub error: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics for the data directory at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !workspace::exists(path) {
        return Err(format!("No sync data found at {:?}", path).into());
    }

    // Scan before opening: opening repairs a torn tail.
    let outbox_log = log_stats(&workspace::outbox_path(path))?;
    let records_log = log_stats(&workspace::records_path(path))?;

    let ws = workspace::open(path)?;
    let stats = ws.outbox.stats();

    let mut records = RecordCounts::default();
    for record in ws.records.list()? {
        records.total += 1;
        if record.is_deleted() {
            records.deleted += 1;
        }
        match record.sync_status {
            RecordSyncStatus::Pending => records.pending += 1,
            RecordSyncStatus::Synced => records.synced += 1,
            RecordSyncStatus::Error => records.error += 1,
        }
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        outbox_log,
        records_log,
        pending: stats.pending,
        synced: stats.synced,
        failed: stats.failed,
        records,
    })
}

fn log_stats(path: &Path) -> Result<LogStats, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(LogStats::default());
    }
    let backend = FileBackend::open(path)?;
    let scan = frame::scan_frames(&backend)?;
    Ok(LogStats {
        size: backend.size()?,
        frames: scan.frames.len(),
        torn_tail: scan.torn_tail,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("syncbox data: {}", result.path);
    println!();
    println!("Logs:");
    for (name, log) in [("outbox", &result.outbox_log), ("records", &result.records_log)] {
        println!(
            "  {:<8} {} frames, {}{}",
            name,
            log.frames,
            format_bytes(log.size),
            if log.torn_tail { " (torn tail)" } else { "" }
        );
    }
    println!();
    println!("Outbox:");
    println!("  Pending: {}", result.pending);
    println!("  Synced:  {}", result.synced);
    println!("  Failed:  {}", result.failed);
    println!();
    println!("Records: {} ({} deleted)", result.records.total, result.records.deleted);
    println!("  Pending: {}", result.records.pending);
    println!("  Synced:  {}", result.records.synced);
    println!("  Error:   {}", result.records.error);
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}
