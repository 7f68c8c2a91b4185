//! Enqueue command implementation.

use crate::workspace;
use std::path::Path;
use syncbox_protocol::{Fields, Operation, QueueItemId, RecordId};

/// Runs the enqueue command.
pub fn run(
    path: &Path,
    record_id: RecordId,
    operation: Operation,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = enqueue(path, record_id, operation, payload)?;
    println!("Enqueued {} {} for record {}", id, operation, record_id);
    Ok(())
}

/// Appends one mutation to the outbox under `path`.
///
/// Only the outbox is written; the record log is left as it is.
pub fn enqueue(
    path: &Path,
    record_id: RecordId,
    operation: Operation,
    payload: &str,
) -> Result<QueueItemId, Box<dyn std::error::Error>> {
    let fields: Fields = serde_json::from_str(payload)
        .map_err(|e| format!("payload must be a JSON object: {e}"))?;
    let ws = workspace::open(path)?;
    Ok(ws.outbox.enqueue(record_id, operation, fields)?)
}
