//! Pending and failed queue listings.

use crate::workspace;
use serde::Serialize;
use std::path::Path;
use syncbox_protocol::QueueItem;

/// One queue item as shown by the listings.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
    /// Queue item sequence number.
    pub id: u64,
    /// Target record.
    pub record_id: String,
    /// Mutation kind.
    pub operation: String,
    /// Enqueue time in milliseconds.
    pub created_at: u64,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Last rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&QueueItem> for QueueEntry {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id.as_u64(),
            record_id: item.record_id.to_string(),
            operation: item.operation.to_string(),
            created_at: item.created_at.as_millis(),
            retry_count: item.retry_count,
            error: item.error_message.clone(),
        }
    }
}

/// Runs the pending command.
pub fn run_pending(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let items = load(path, |outbox| outbox.pending_items())?;
    print(&items, format, "pending")
}

/// Runs the failed command.
pub fn run_failed(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let items = load(path, |outbox| outbox.failed_items())?;
    print(&items, format, "failed")
}

fn load(
    path: &Path,
    select: impl FnOnce(&syncbox_engine::OutboxStore) -> Vec<QueueItem>,
) -> Result<Vec<QueueEntry>, Box<dyn std::error::Error>> {
    if !workspace::exists(path) {
        return Err(format!("No sync data found at {:?}", path).into());
    }
    let ws = workspace::open(path)?;
    Ok(select(&ws.outbox).iter().map(QueueEntry::from).collect())
}

fn print(entries: &[QueueEntry], format: &str, label: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(entries)?),
        _ => {
            if entries.is_empty() {
                println!("No {label} items");
                return Ok(());
            }
            println!("{:<8} {:<36} {:<7} {:>15} {:>7}  Error", "Id", "Record", "Op", "Created", "Retries");
            for entry in entries {
                println!(
                    "{:<8} {:<36} {:<7} {:>15} {:>7}  {}",
                    format!("#{}", entry.id),
                    entry.record_id,
                    entry.operation,
                    entry.created_at,
                    entry.retry_count,
                    entry.error.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
