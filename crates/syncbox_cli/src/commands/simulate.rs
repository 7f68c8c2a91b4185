//! Simulate command implementation.
//!
//! Runs one real sync cycle over the data directory, with an in-process
//! remote authority standing in for the server. The loopback transport goes
//! through the same CBOR batch codec as a networked one.

use crate::workspace;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use syncbox_engine::{
    HttpTransport, LoopbackClient, LoopbackServer, SyncConfig, SyncEngine, SyncReport,
};
use syncbox_protocol::RecordId;
use syncbox_remote::RemoteAuthority;

/// Base URL handed to the loopback transport.
const LOOPBACK_URL: &str = "http://loopback.local";

/// Simulation options.
#[derive(Debug, Default)]
pub struct Options {
    /// Records the remote rejects.
    pub reject: Vec<RecordId>,
    /// Batch size override.
    pub batch_size: Option<usize>,
    /// Whether the remote is unreachable.
    pub offline: bool,
}

/// Routes loopback requests into a [`RemoteAuthority`].
struct RemoteServer(Arc<RemoteAuthority>);

impl LoopbackServer for RemoteServer {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        self.0.handle_post(path, body).map_err(|e| e.to_string())
    }

    fn handle_get(&self, path: &str) -> Result<Vec<u8>, String> {
        self.0.handle_get(path).map_err(|e| e.to_string())
    }
}

/// Cycle summary printed by the command.
#[derive(Debug, Serialize)]
pub struct SimulateResult {
    /// Whether the cycle ran without item failures.
    pub success: bool,
    /// Whether the cycle was aborted by the reachability probe.
    pub aborted: bool,
    /// Items acknowledged.
    pub synced_items: u64,
    /// Item failures.
    pub failed_items: u64,
    /// Items that exhausted their retries.
    pub permanent_failures: u64,
    /// Conflicts resolved.
    pub conflicts_resolved: u64,
    /// Cycle duration in milliseconds.
    pub duration_ms: u128,
    /// Problems observed during the cycle.
    pub errors: Vec<ErrorEntry>,
}

/// One cycle error entry.
#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    /// `create`, `update`, `delete`, `connectivity` or `storage`.
    pub operation: String,
    /// Target record, when the entry is about one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Error message.
    pub message: String,
    /// Whether the item will not be retried.
    pub permanent: bool,
}

impl From<&SyncReport> for SimulateResult {
    fn from(report: &SyncReport) -> Self {
        Self {
            success: report.success,
            aborted: report.aborted,
            synced_items: report.synced_items,
            failed_items: report.failed_items,
            permanent_failures: report.permanent_failures,
            conflicts_resolved: report.conflicts_resolved,
            duration_ms: report.duration.as_millis(),
            errors: report
                .errors
                .iter()
                .map(|e| ErrorEntry {
                    operation: e.operation_tag().to_string(),
                    record_id: e.record_id().map(|id| id.to_string()),
                    message: e.message().to_string(),
                    permanent: e.is_permanent(),
                })
                .collect(),
        }
    }
}

/// Runs the simulate command.
pub fn run(path: &Path, options: &Options, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = simulate(path, options)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Runs one cycle over the stores under `path`.
pub fn simulate(path: &Path, options: &Options) -> Result<SimulateResult, Box<dyn std::error::Error>> {
    let ws = workspace::open(path)?;

    let remote = Arc::new(RemoteAuthority::default());
    remote.set_reachable(!options.offline);
    for record_id in &options.reject {
        remote.reject_record(*record_id, "rejected by simulated remote");
    }

    let mut config = SyncConfig::new();
    if let Some(size) = options.batch_size {
        config = config.with_batch_size(size);
    }

    let client = LoopbackClient::new(RemoteServer(remote));
    let transport = HttpTransport::from_config(LOOPBACK_URL, client, &config);
    let engine = SyncEngine::new(config, transport, ws.records, ws.outbox, ws.clock)?;
    let report = engine.run_sync_cycle()?;

    Ok(SimulateResult::from(&report))
}

fn print_text_output(result: &SimulateResult) {
    if result.aborted {
        println!("Sync aborted: remote authority unreachable");
        return;
    }
    println!(
        "Sync {} in {} ms",
        if result.success { "succeeded" } else { "finished with failures" },
        result.duration_ms
    );
    println!("  Synced:    {}", result.synced_items);
    println!("  Failed:    {}", result.failed_items);
    println!("  Permanent: {}", result.permanent_failures);
    println!("  Conflicts: {}", result.conflicts_resolved);

    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for entry in &result.errors {
            println!(
                "  [{}] {} {}{}",
                entry.operation,
                entry.record_id.as_deref().unwrap_or("-"),
                entry.message,
                if entry.permanent { " (permanent)" } else { "" }
            );
        }
    }
}
