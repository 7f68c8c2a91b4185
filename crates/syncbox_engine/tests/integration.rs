//! End-to-end sync cycles against an in-process remote authority.

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use syncbox_engine::{
    Clock, CycleError, HttpTransport, LogRecordStore, LoopbackClient, LoopbackServer, ManualClock,
    OutboxStore, RecordStore, SyncConfig, SyncEngine, SyncError, SystemClock,
};
use syncbox_protocol::{BatchRequest, Fields, Operation, QueueStatus, RecordSyncStatus, Timestamp};
use syncbox_remote::RemoteAuthority;
use syncbox_storage::FileBackend;
use tempfile::tempdir;

struct Remote(Arc<RemoteAuthority>);

impl LoopbackServer for Remote {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        self.0.handle_post(path, body).map_err(|e| e.to_string())
    }

    fn handle_get(&self, path: &str) -> Result<Vec<u8>, String> {
        self.0.handle_get(path).map_err(|e| e.to_string())
    }
}

type Engine = SyncEngine<HttpTransport<LoopbackClient<Remote>>, LogRecordStore>;

fn fields(title: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("title".into(), json!(title));
    fields
}

fn transport(
    remote: &Arc<RemoteAuthority>,
    config: &SyncConfig,
) -> HttpTransport<LoopbackClient<Remote>> {
    HttpTransport::from_config(
        "http://remote.test/",
        LoopbackClient::new(Remote(Arc::clone(remote))),
        config,
    )
}

fn memory_engine(config: SyncConfig, remote: &Arc<RemoteAuthority>, clock: Arc<dyn Clock>) -> Engine {
    let outbox = OutboxStore::in_memory(Arc::clone(&clock), config.max_retries).unwrap();
    let records = LogRecordStore::in_memory(Arc::clone(&clock)).unwrap();
    let transport = transport(remote, &config);
    SyncEngine::new(config, transport, records, outbox, clock).unwrap()
}

fn file_engine(dir: &Path, remote: &Arc<RemoteAuthority>, clock: Arc<dyn Clock>) -> Engine {
    let config = SyncConfig::new().with_batch_size(2);
    let outbox = OutboxStore::open(
        FileBackend::open(&dir.join("outbox.log")).unwrap(),
        Arc::clone(&clock),
        config.max_retries,
    )
    .unwrap();
    let records =
        LogRecordStore::open(FileBackend::open(&dir.join("records.log")).unwrap(), Arc::clone(&clock))
            .unwrap();
    let transport = transport(remote, &config);
    SyncEngine::new(config, transport, records, outbox, clock).unwrap()
}

#[test]
fn offline_mutations_sync_once_reachable() {
    let remote = Arc::new(RemoteAuthority::default());
    let engine = memory_engine(SyncConfig::new(), &remote, Arc::new(SystemClock::new()));

    remote.set_reachable(false);
    let a = engine.create_record(fields("a")).unwrap();
    let b = engine.create_record(fields("b")).unwrap();
    engine.update_record(a.id, fields("a2")).unwrap();
    engine.delete_record(b.id).unwrap();

    let report = engine.run_sync_cycle().unwrap();
    assert!(report.aborted);
    assert!(matches!(report.errors[..], [CycleError::Connectivity { .. }]));
    assert_eq!(engine.outbox().pending_items().len(), 4);
    assert_eq!(remote.accepted_count(), 0);

    remote.set_reachable(true);
    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);
    assert_eq!(report.synced_items, 4);
    assert!(engine.outbox().pending_items().is_empty());

    let local = engine.records().get(a.id).unwrap().unwrap();
    let remote_a = remote.record(a.id).unwrap();
    assert_eq!(local.sync_status, RecordSyncStatus::Synced);
    assert_eq!(local.server_id.as_deref(), Some(remote_a.server_id.as_str()));
    assert_eq!(remote_a.version.fields, fields("a2"));
    assert!(remote.record(b.id).unwrap().deleted);
}

#[test]
fn rejected_record_fails_permanently_while_others_sync() {
    let remote = Arc::new(RemoteAuthority::default());
    let engine = memory_engine(SyncConfig::new(), &remote, Arc::new(SystemClock::new()));

    let good = engine.create_record(fields("good")).unwrap();
    let bad = engine.create_record(fields("bad")).unwrap();
    remote.reject_record(bad.id, "title rejected");

    let first = engine.run_sync_cycle().unwrap();
    assert_eq!(first.synced_items, 1);
    assert_eq!(first.failed_items, 1);

    engine.run_sync_cycle().unwrap();
    let third = engine.run_sync_cycle().unwrap();
    assert_eq!(third.permanent_failures, 1);
    assert!(third.errors[0].is_permanent());

    let failed = engine.outbox().failed_items();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].record_id, bad.id);
    assert_eq!(failed[0].retry_count, 3);
    assert_eq!(failed[0].error_message.as_deref(), Some("title rejected"));

    assert_eq!(
        engine.records().get(good.id).unwrap().unwrap().sync_status,
        RecordSyncStatus::Synced
    );
    assert_eq!(
        engine.records().get(bad.id).unwrap().unwrap().sync_status,
        RecordSyncStatus::Error
    );

    let idle = engine.run_sync_cycle().unwrap();
    assert!(idle.success);
    assert_eq!(idle.synced_items + idle.failed_items, 0);
}

#[test]
fn failed_batch_is_retried_next_cycle() {
    let remote = Arc::new(RemoteAuthority::default());
    let engine = memory_engine(
        SyncConfig::new().with_batch_size(2),
        &remote,
        Arc::new(SystemClock::new()),
    );
    for title in ["a", "b", "c"] {
        engine.create_record(fields(title)).unwrap();
    }
    remote.fail_next_batches(1);

    let report = engine.run_sync_cycle().unwrap();
    assert_eq!(report.failed_items, 2);
    assert_eq!(report.synced_items, 1);
    assert!(report.errors.iter().all(|e| matches!(e, CycleError::BatchTransport { .. })));
    assert!(report.errors[0].message().contains("injected batch failure"));
    assert!(engine.transport().last_error().is_none());

    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);
    assert_eq!(report.synced_items, 2);
    assert_eq!(remote.accepted_count(), 3);
}

#[test]
fn acknowledged_but_unrecorded_items_are_resent_safely() {
    let remote = Arc::new(RemoteAuthority::default());
    let engine = memory_engine(SyncConfig::new(), &remote, Arc::new(SystemClock::new()));
    engine.create_record(fields("a")).unwrap();
    engine.create_record(fields("b")).unwrap();

    // The authority applied the batch but the response never arrived.
    remote
        .handle_batch(BatchRequest::new(engine.outbox().pending_items()))
        .unwrap();
    assert_eq!(remote.accepted_count(), 2);

    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);
    assert_eq!(report.synced_items, 2);
    assert_eq!(remote.accepted_count(), 2);
    assert_eq!(remote.record_count(), 2);
}

#[test]
fn newer_remote_edit_wins_on_both_sides() {
    let remote = Arc::new(RemoteAuthority::default());
    let clock = Arc::new(ManualClock::new(1_000));
    let engine = memory_engine(SyncConfig::new(), &remote, clock.clone());

    let record = engine.create_record(fields("mine")).unwrap();
    engine.run_sync_cycle().unwrap();

    remote.modify_remote(record.id, fields("theirs"), Timestamp::from_millis(5_000));
    clock.set(2_000);
    engine.update_record(record.id, fields("mine again")).unwrap();

    let report = engine.run_sync_cycle().unwrap();
    assert_eq!(report.conflicts_resolved, 1);

    let local = engine.records().get(record.id).unwrap().unwrap();
    assert_eq!(local.fields, fields("theirs"));
    assert_eq!(local.updated_at, Timestamp::from_millis(5_000));
    assert_eq!(local.sync_status, RecordSyncStatus::Synced);
    assert_eq!(remote.record(record.id).unwrap().version.fields, fields("theirs"));
    assert_eq!(engine.stats().conflicts_resolved, 1);
}

#[test]
fn newer_local_edit_wins_on_both_sides() {
    let remote = Arc::new(RemoteAuthority::default());
    let clock = Arc::new(ManualClock::new(1_000));
    let engine = memory_engine(SyncConfig::new(), &remote, clock.clone());

    let record = engine.create_record(fields("mine")).unwrap();
    engine.run_sync_cycle().unwrap();

    remote.modify_remote(record.id, fields("theirs"), Timestamp::from_millis(1_500));
    clock.set(2_000);
    engine.update_record(record.id, fields("mine again")).unwrap();

    let report = engine.run_sync_cycle().unwrap();
    assert_eq!(report.conflicts_resolved, 1);

    let local = engine.records().get(record.id).unwrap().unwrap();
    assert_eq!(local.fields, fields("mine again"));
    assert_eq!(local.sync_status, RecordSyncStatus::Synced);
    assert_eq!(remote.record(record.id).unwrap().version.fields, fields("mine again"));
}

#[test]
fn state_survives_restart() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(RemoteAuthority::default());

    let (synced_id, pending_id) = {
        let engine = file_engine(dir.path(), &remote, Arc::new(SystemClock::new()));
        let a = engine.create_record(fields("a")).unwrap();
        engine.run_sync_cycle().unwrap();

        remote.set_reachable(false);
        let b = engine.create_record(fields("b")).unwrap();
        assert!(engine.run_sync_cycle().unwrap().aborted);
        (a.id, b.id)
    };

    remote.set_reachable(true);
    let engine = file_engine(dir.path(), &remote, Arc::new(SystemClock::new()));
    assert_eq!(engine.outbox().items_with_status(QueueStatus::Synced).len(), 1);
    let pending = engine.outbox().pending_items();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].record_id, pending_id);
    assert_eq!(
        engine.records().get(synced_id).unwrap().unwrap().sync_status,
        RecordSyncStatus::Synced
    );

    let next = engine.create_record(fields("c")).unwrap();
    let ids: Vec<_> = engine.outbox().pending_items().iter().map(|i| i.id).collect();
    assert!(ids[1] > ids[0]);

    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);
    assert_eq!(report.synced_items, 2);
    assert!(remote.record(next.id).is_some());
}

#[test]
fn record_order_survives_restart_with_earlier_clock() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(RemoteAuthority::default());
    remote.set_reachable(false);

    let record = {
        let engine = file_engine(dir.path(), &remote, Arc::new(ManualClock::new(10_000_000)));
        engine.create_record(fields("v1")).unwrap()
    };

    let engine = file_engine(dir.path(), &remote, Arc::new(ManualClock::new(1_000)));
    engine.update_record(record.id, fields("v2")).unwrap();

    let pending: Vec<_> = engine
        .outbox()
        .pending_items()
        .into_iter()
        .filter(|item| item.record_id == record.id)
        .map(|item| item.operation)
        .collect();
    assert_eq!(pending, vec![Operation::Create, Operation::Update]);

    remote.set_reachable(true);
    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);
    assert_eq!(remote.record(record.id).unwrap().version.fields, fields("v2"));
    assert_eq!(engine.records().get(record.id).unwrap().unwrap().fields, fields("v2"));
}

#[test]
fn queued_items_racing_newer_remote_edit_converge() {
    let remote = Arc::new(RemoteAuthority::default());
    let clock = Arc::new(ManualClock::new(10));
    let engine = memory_engine(SyncConfig::new(), &remote, clock.clone());

    let record = engine.create_record(fields("v1")).unwrap();
    clock.set(20);
    engine.update_record(record.id, fields("v2")).unwrap();
    remote.modify_remote(record.id, fields("theirs"), Timestamp::from_millis(50));

    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);
    assert_eq!(report.synced_items, 2);

    let local = engine.records().get(record.id).unwrap().unwrap();
    let kept = remote.record(record.id).unwrap();
    assert_eq!(local.fields, fields("theirs"));
    assert_eq!(kept.version.fields, local.fields);
    assert_eq!(local.sync_status, RecordSyncStatus::Synced);
    assert!(engine.outbox().pending_items().is_empty());
}

#[test]
fn queued_items_racing_older_remote_edit_converge() {
    let remote = Arc::new(RemoteAuthority::default());
    let clock = Arc::new(ManualClock::new(10));
    let engine = memory_engine(SyncConfig::new(), &remote, clock.clone());

    let record = engine.create_record(fields("v1")).unwrap();
    clock.set(60);
    engine.update_record(record.id, fields("v2")).unwrap();
    remote.modify_remote(record.id, fields("theirs"), Timestamp::from_millis(50));

    let report = engine.run_sync_cycle().unwrap();
    assert!(report.success);

    let local = engine.records().get(record.id).unwrap().unwrap();
    let kept = remote.record(record.id).unwrap();
    assert_eq!(local.fields, fields("v2"));
    assert_eq!(kept.version.fields, local.fields);
    assert_eq!(local.sync_status, RecordSyncStatus::Synced);
}

#[test]
fn mismatched_retry_ceiling_is_rejected() {
    let remote = Arc::new(RemoteAuthority::default());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let outbox = OutboxStore::in_memory(Arc::clone(&clock), 7).unwrap();
    let records = LogRecordStore::in_memory(Arc::clone(&clock)).unwrap();

    let config = SyncConfig::new();
    let transport = transport(&remote, &config);
    let result = SyncEngine::new(config, transport, records, outbox, clock);
    assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recurring_scheduler_drains_outbox() {
    let remote = Arc::new(RemoteAuthority::default());
    let engine = Arc::new(memory_engine(
        SyncConfig::new().with_sync_interval(Duration::from_secs(3600)),
        &remote,
        Arc::new(SystemClock::new()),
    ));
    engine.create_record(fields("a")).unwrap();

    let handle = engine.start_scheduler().unwrap();
    for _ in 0..200 {
        if handle.cycles_run() >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(engine.outbox().pending_items().is_empty());

    engine.create_record(fields("b")).unwrap();
    handle.trigger();
    for _ in 0..200 {
        if handle.cycles_run() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.stop().await;

    assert_eq!(remote.accepted_count(), 2);
    assert_eq!(engine.stats().cycles_completed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_interval_drives_cycles() {
    let remote = Arc::new(RemoteAuthority::default());
    let engine = Arc::new(memory_engine(
        SyncConfig::new().with_sync_interval(Duration::from_millis(20)),
        &remote,
        Arc::new(SystemClock::new()),
    ));

    let handle = engine.start_scheduler().unwrap();
    for _ in 0..300 {
        if handle.cycles_run() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let runs = handle.cycles_run();
    handle.stop().await;

    assert!(runs >= 3);
    assert!(engine.stats().cycles_completed >= 3);
}
