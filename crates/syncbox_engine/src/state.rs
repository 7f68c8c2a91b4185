//! Sync orchestrator state machine.

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{CycleError, SyncError, SyncResult};
use crate::outbox::OutboxStore;
use crate::records::RecordStore;
use crate::scheduler::{CycleRunner, SchedulerHandle};
use crate::transport::BatchTransport;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use syncbox_protocol::{
    resolve, Fields, ItemOutcome, Operation, QueueItem, QueueItemId, Record, RecordId,
    RecordVersion, Timestamp, Winner,
};

/// Phase of the current sync cycle.
///
/// `Idle -> CheckingConnectivity -> (Aborted | Draining) ->
/// (Sending -> ApplyingOutcomes)* -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle is running.
    Idle,
    /// Probing the remote authority.
    CheckingConnectivity,
    /// The probe failed; the cycle is ending without touching the outbox.
    Aborted,
    /// Reading pending items.
    Draining,
    /// A batch is in flight.
    Sending,
    /// Persisting a batch's outcomes.
    ApplyingOutcomes,
}

impl SyncState {
    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }

    /// Returns true if a new cycle may start.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle)
    }
}

/// Running totals across cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that drained the outbox (successfully or with item failures).
    pub cycles_completed: u64,
    /// Cycles aborted by the reachability probe.
    pub cycles_aborted: u64,
    /// Cycles cut short by a storage or internal fault.
    pub cycles_faulted: u64,
    /// Items acknowledged.
    pub items_synced: u64,
    /// Item failures recorded.
    pub items_failed: u64,
    /// Items that exhausted their retry budget.
    pub permanent_failures: u64,
    /// Conflicts settled by last-write-wins.
    pub conflicts_resolved: u64,
    /// End of the last cycle.
    pub last_cycle_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of one sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// True iff the cycle ran and no item failed.
    pub success: bool,
    /// True if the reachability probe aborted the cycle.
    pub aborted: bool,
    /// Items acknowledged this cycle.
    pub synced_items: u64,
    /// Item failures recorded this cycle.
    pub failed_items: u64,
    /// Items that became permanently failed this cycle.
    pub permanent_failures: u64,
    /// Conflicts resolved this cycle.
    pub conflicts_resolved: u64,
    /// Every problem observed, in the order it happened.
    pub errors: Vec<CycleError>,
    /// Fault that cut the cycle short, when produced by the scheduler.
    pub fault: Option<String>,
    /// Wall time of the cycle.
    pub duration: Duration,
}

impl SyncReport {
    /// Report for a cycle that ended with an error instead of a report.
    pub fn faulted(error: &SyncError, at: Timestamp) -> Self {
        let mut errors = Vec::new();
        if error.is_storage() {
            errors.push(CycleError::Storage {
                message: error.to_string(),
                at,
            });
        }
        Self {
            errors,
            fault: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Resets the running flag and state when a cycle ends, including by panic.
struct CycleGuard<'a> {
    running: &'a AtomicBool,
    state: &'a RwLock<SyncState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.write() = SyncState::Idle;
        self.running.store(false, Ordering::SeqCst);
    }
}

/// The sync engine drains the outbox into the remote authority.
///
/// Batches within a cycle run sequentially in `created_at` order, and at
/// most one cycle runs at a time.
pub struct SyncEngine<T: BatchTransport, R: RecordStore> {
    config: SyncConfig,
    outbox: Arc<OutboxStore>,
    records: Arc<R>,
    transport: Arc<T>,
    clock: Arc<dyn Clock>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    running: AtomicBool,
}

impl<T: BatchTransport, R: RecordStore> SyncEngine<T, R> {
    /// Creates a sync engine.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] if the configuration does not validate
    /// or the outbox was opened with a different retry ceiling.
    pub fn new(
        config: SyncConfig,
        transport: T,
        records: R,
        outbox: OutboxStore,
        clock: Arc<dyn Clock>,
    ) -> SyncResult<Self> {
        config.validate()?;
        if outbox.max_retries() != config.max_retries {
            return Err(SyncError::InvalidConfig(format!(
                "outbox retry ceiling {} does not match configured max_retries {}",
                outbox.max_retries(),
                config.max_retries
            )));
        }

        Ok(Self {
            config,
            outbox: Arc::new(outbox),
            records: Arc::new(records),
            transport: Arc::new(transport),
            clock,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            running: AtomicBool::new(false),
        })
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the outbox.
    pub fn outbox(&self) -> &OutboxStore {
        &self.outbox
    }

    /// Gets the record store.
    pub fn records(&self) -> &R {
        &self.records
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Appends a mutation to the outbox.
    ///
    /// Call after every successful local create, update or delete.
    pub fn enqueue_mutation(
        &self,
        record_id: RecordId,
        operation: Operation,
        payload: Fields,
    ) -> SyncResult<QueueItemId> {
        self.outbox.enqueue(record_id, operation, payload)
    }

    /// Creates a record locally and enqueues its `create`.
    pub fn create_record(&self, fields: Fields) -> SyncResult<Record> {
        let record = self.records.create(fields)?;
        self.enqueue_mutation(record.id, Operation::Create, record.fields.clone())?;
        Ok(record)
    }

    /// Updates a record locally and enqueues its `update`.
    pub fn update_record(&self, id: RecordId, fields: Fields) -> SyncResult<Option<Record>> {
        let Some(record) = self.records.update(id, fields)? else {
            return Ok(None);
        };
        self.enqueue_mutation(record.id, Operation::Update, record.fields.clone())?;
        Ok(Some(record))
    }

    /// Soft-deletes a record locally and enqueues its `delete`.
    pub fn delete_record(&self, id: RecordId) -> SyncResult<bool> {
        let Some(record) = self.records.get(id)? else {
            return Ok(false);
        };
        if !self.records.soft_delete(id)? {
            return Ok(false);
        }
        self.enqueue_mutation(id, Operation::Delete, record.fields)?;
        Ok(true)
    }

    /// Runs one sync cycle.
    ///
    /// Connectivity and per-item problems are reported in the returned
    /// [`SyncReport`]. An `Err` means a storage fault ended the cycle early
    /// or another cycle is already running.
    pub fn run_sync_cycle(&self) -> SyncResult<SyncReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::CycleInProgress);
        }
        let _guard = CycleGuard {
            running: &self.running,
            state: &self.state,
        };

        let start = Instant::now();
        let result = self.drive_cycle(start);
        self.record_stats(&result);
        result
    }

    fn drive_cycle(&self, start: Instant) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();

        self.set_state(SyncState::CheckingConnectivity);
        if !self.transport.probe_reachability() {
            self.set_state(SyncState::Aborted);
            tracing::warn!("remote authority unreachable, sync cycle aborted");
            report.aborted = true;
            report.errors.push(CycleError::Connectivity {
                at: self.clock.now(),
            });
            report.duration = start.elapsed();
            return Ok(report);
        }

        self.set_state(SyncState::Draining);
        let pending = self.outbox.pending_items();
        if pending.is_empty() {
            tracing::debug!("outbox empty, nothing to sync");
            report.success = true;
            report.duration = start.elapsed();
            return Ok(report);
        }

        let batch_count = pending.len().div_ceil(self.config.batch_size);
        for (index, batch) in pending.chunks(self.config.batch_size).enumerate() {
            self.set_state(SyncState::Sending);
            tracing::debug!(batch = index + 1, of = batch_count, items = batch.len(), "sending batch");
            let sent = self.transport.send_batch(batch);

            self.set_state(SyncState::ApplyingOutcomes);
            match sent {
                Ok(outcomes) if outcomes.len() == batch.len() => {
                    for (item, outcome) in batch.iter().zip(outcomes) {
                        self.apply_outcome(item, outcome, &mut report)?;
                    }
                }
                Ok(outcomes) => {
                    let message = format!(
                        "transport returned {} outcomes for {} items",
                        outcomes.len(),
                        batch.len()
                    );
                    self.fail_batch(batch, &message, &mut report)?;
                }
                Err(err) => self.fail_batch(batch, &err.to_string(), &mut report)?,
            }
        }

        report.success = report.failed_items == 0;
        report.duration = start.elapsed();
        tracing::info!(
            synced = report.synced_items,
            failed = report.failed_items,
            permanent = report.permanent_failures,
            conflicts = report.conflicts_resolved,
            "sync cycle finished"
        );
        Ok(report)
    }

    fn apply_outcome(
        &self,
        item: &QueueItem,
        outcome: ItemOutcome,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        match outcome {
            ItemOutcome::Success { server_id, remote } => {
                self.apply_success(item, server_id, remote, report)
            }
            ItemOutcome::Error { message } => self.apply_failure(item, message, false, report),
        }
    }

    fn apply_success(
        &self,
        item: &QueueItem,
        server_id: Option<String>,
        remote: Option<RecordVersion>,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let now = self.clock.now();
        let conflicting = remote.filter(|r| item.operation.writes_fields() && r.fields != item.payload);

        let touched = match conflicting {
            Some(remote) => {
                let local = self
                    .records
                    .get(item.record_id)?
                    .map(|record| record.version())
                    .unwrap_or_else(|| RecordVersion::new(item.payload.clone(), item.created_at));

                let winner = resolve(&local, &remote);
                report.conflicts_resolved += 1;
                tracing::debug!(record = %item.record_id, ?winner, "conflict resolved");

                match winner {
                    Winner::Local => self.records.mark_synced(item.record_id, server_id, now)?,
                    Winner::Remote => {
                        self.records
                            .apply_remote(item.record_id, &remote, server_id, now)?
                    }
                }
            }
            None => self.records.mark_synced(item.record_id, server_id, now)?,
        };

        if !touched {
            tracing::debug!(record = %item.record_id, "acknowledged item targets a missing record");
        }

        self.outbox.mark_synced(item.id)?;
        report.synced_items += 1;
        Ok(())
    }

    fn apply_failure(
        &self,
        item: &QueueItem,
        message: String,
        whole_batch: bool,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let outcome = self.outbox.record_failure(item.id, &message)?;
        self.records.mark_error(item.record_id)?;

        report.failed_items += 1;
        if outcome.permanent {
            report.permanent_failures += 1;
            tracing::warn!(
                queue_item = %item.id,
                record = %item.record_id,
                retries = outcome.retry_count,
                error = %message,
                "queue item permanently failed"
            );
        }

        let at = self.clock.now();
        let entry = if whole_batch {
            CycleError::BatchTransport {
                queue_item_id: item.id,
                record_id: item.record_id,
                operation: item.operation,
                message,
                permanent: outcome.permanent,
                at,
            }
        } else {
            CycleError::ItemProcessing {
                queue_item_id: item.id,
                record_id: item.record_id,
                operation: item.operation,
                message,
                permanent: outcome.permanent,
                at,
            }
        };
        report.errors.push(entry);
        Ok(())
    }

    fn fail_batch(&self, batch: &[QueueItem], message: &str, report: &mut SyncReport) -> SyncResult<()> {
        tracing::warn!(items = batch.len(), error = %message, "batch send failed");
        for item in batch {
            self.apply_failure(item, message.to_string(), true, report)?;
        }
        Ok(())
    }

    fn record_stats(&self, result: &SyncResult<SyncReport>) {
        let mut stats = self.stats.write();
        stats.last_cycle_time = Some(Instant::now());

        match result {
            Ok(report) => {
                if report.aborted {
                    stats.cycles_aborted += 1;
                } else {
                    stats.cycles_completed += 1;
                }
                stats.items_synced += report.synced_items;
                stats.items_failed += report.failed_items;
                stats.permanent_failures += report.permanent_failures;
                stats.conflicts_resolved += report.conflicts_resolved;
                stats.last_error = report.errors.last().map(|e| e.message().to_string());
            }
            Err(err) => {
                stats.cycles_faulted += 1;
                stats.last_error = Some(err.to_string());
            }
        }
    }
}

impl<T, R> SyncEngine<T, R>
where
    T: BatchTransport + 'static,
    R: RecordStore + 'static,
{
    /// Starts the recurring scheduler: one cycle now, then one per
    /// `interval` until the handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// [`SyncError::Scheduler`] when called outside a Tokio runtime.
    pub fn start_recurring(self: &Arc<Self>, interval: Duration) -> SyncResult<SchedulerHandle> {
        let runner: Arc<dyn CycleRunner> = Arc::clone(self) as Arc<dyn CycleRunner>;
        SchedulerHandle::start(runner, interval, Arc::clone(&self.clock))
    }

    /// Starts the recurring scheduler at the configured `sync_interval`.
    ///
    /// # Errors
    ///
    /// As [`Self::start_recurring`].
    pub fn start_scheduler(self: &Arc<Self>) -> SyncResult<SchedulerHandle> {
        self.start_recurring(self.config.sync_interval)
    }
}

impl<T, R> CycleRunner for SyncEngine<T, R>
where
    T: BatchTransport + 'static,
    R: RecordStore + 'static,
{
    fn run_cycle(&self) -> SyncResult<SyncReport> {
        self.run_sync_cycle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::records::LogRecordStore;
    use crate::transport::{MockBehavior, MockReply, MockTransport};
    use serde_json::json;
    use syncbox_protocol::{QueueStatus, RecordSyncStatus};

    type TestEngine = SyncEngine<MockTransport, LogRecordStore>;

    fn fields(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".into(), json!(title));
        fields
    }

    fn engine_with(config: SyncConfig, clock: Arc<ManualClock>) -> TestEngine {
        let clock: Arc<dyn Clock> = clock;
        let outbox = OutboxStore::in_memory(Arc::clone(&clock), config.max_retries).unwrap();
        let records = LogRecordStore::in_memory(Arc::clone(&clock)).unwrap();
        SyncEngine::new(config, MockTransport::new(), records, outbox, clock).unwrap()
    }

    fn engine() -> TestEngine {
        engine_with(SyncConfig::new(), Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn sync_state_checks() {
        assert!(SyncState::Idle.can_start_sync());
        assert!(!SyncState::Sending.can_start_sync());
        assert!(SyncState::Draining.is_active());
        assert!(!SyncState::Idle.is_active());
    }

    #[test]
    fn rejects_mismatched_retry_ceiling() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let outbox = OutboxStore::in_memory(Arc::clone(&clock), 5).unwrap();
        let records = LogRecordStore::in_memory(Arc::clone(&clock)).unwrap();
        let result = SyncEngine::new(SyncConfig::new(), MockTransport::new(), records, outbox, clock);
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn successful_cycle_syncs_everything() {
        let engine = engine();
        let a = engine.create_record(fields("A")).unwrap();
        let b = engine.create_record(fields("B")).unwrap();
        engine.update_record(a.id, fields("A2")).unwrap();

        let report = engine.run_sync_cycle().unwrap();
        assert!(report.success);
        assert_eq!(report.synced_items, 3);
        assert_eq!(report.failed_items, 0);
        assert!(report.errors.is_empty());
        assert!(engine.outbox().pending_items().is_empty());

        for id in [a.id, b.id] {
            let record = engine.records().get(id).unwrap().unwrap();
            assert_eq!(record.sync_status, RecordSyncStatus::Synced);
            assert!(record.last_synced_at.is_some());
            assert_eq!(record.server_id, Some(format!("srv-{id}")));
        }
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.stats().cycles_completed, 1);
    }

    #[test]
    fn empty_outbox_is_success() {
        let engine = engine();
        let report = engine.run_sync_cycle().unwrap();
        assert!(report.success);
        assert_eq!(report.synced_items, 0);
        assert!(engine.transport().calls().is_empty());
    }

    #[test]
    fn unreachable_remote_leaves_outbox_untouched() {
        let engine = engine();
        engine.create_record(fields("A")).unwrap();
        engine.transport().set_reachable(false);

        let before = engine.outbox().pending_items();
        let report = engine.run_sync_cycle().unwrap();
        let after = engine.outbox().pending_items();

        assert_eq!(before, after);
        assert!(report.aborted);
        assert!(!report.success);
        assert_eq!(report.synced_items, 0);
        assert_eq!(report.failed_items, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].operation_tag(), "connectivity");
        assert!(engine.transport().calls().is_empty());
        assert_eq!(after[0].retry_count, 0);
        assert_eq!(engine.stats().cycles_aborted, 1);
    }

    #[test]
    fn first_batch_holds_two_oldest_items() {
        let clock = Arc::new(ManualClock::new(10));
        let engine = engine_with(SyncConfig::new().with_batch_size(2), Arc::clone(&clock));

        let mut ids = Vec::new();
        for title in ["one", "two", "three"] {
            ids.push(engine.enqueue_mutation(RecordId::new(), Operation::Create, fields(title)).unwrap());
            clock.advance(10);
        }

        engine.run_sync_cycle().unwrap();
        let calls = engine.transport().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec![ids[0], ids[1]]);
        assert_eq!(calls[1], vec![ids[2]]);
    }

    #[test]
    fn batch_failure_fails_every_item_and_continues() {
        let engine = engine_with(
            SyncConfig::new().with_batch_size(2),
            Arc::new(ManualClock::new(0)),
        );
        for title in ["a", "b", "c"] {
            engine.create_record(fields(title)).unwrap();
        }
        engine.transport().push_reply(MockReply::Fail("connection reset".into()));

        let report = engine.run_sync_cycle().unwrap();
        assert!(!report.success);
        assert_eq!(report.failed_items, 2);
        assert_eq!(report.synced_items, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report
            .errors
            .iter()
            .all(|e| matches!(e, CycleError::BatchTransport { .. })));

        let pending = engine.outbox().pending_items();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|i| i.retry_count == 1));
    }

    #[test]
    fn outcome_count_mismatch_is_batch_failure() {
        let engine = engine();
        engine.create_record(fields("a")).unwrap();
        engine.create_record(fields("b")).unwrap();
        engine
            .transport()
            .push_reply(MockReply::Outcomes(vec![ItemOutcome::acknowledged("srv")]));

        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.failed_items, 2);
        assert_eq!(report.synced_items, 0);
        assert!(report.errors[0].message().contains("1 outcomes for 2 items"));
    }

    #[test]
    fn mixed_outcomes_are_applied_per_item() {
        let engine = engine();
        let ok = engine.create_record(fields("ok")).unwrap();
        let bad = engine.create_record(fields("bad")).unwrap();
        engine.transport().push_reply(MockReply::Outcomes(vec![
            ItemOutcome::acknowledged("srv-ok"),
            ItemOutcome::error("title too short"),
        ]));

        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.synced_items, 1);
        assert_eq!(report.failed_items, 1);
        match &report.errors[0] {
            CycleError::ItemProcessing { record_id, operation, message, permanent, .. } => {
                assert_eq!(*record_id, bad.id);
                assert_eq!(*operation, Operation::Create);
                assert_eq!(message, "title too short");
                assert!(!permanent);
            }
            other => panic!("unexpected entry {other:?}"),
        }
        assert_eq!(
            engine.records().get(ok.id).unwrap().unwrap().sync_status,
            RecordSyncStatus::Synced
        );
        assert_eq!(
            engine.records().get(bad.id).unwrap().unwrap().sync_status,
            RecordSyncStatus::Error
        );
    }

    #[test]
    fn create_then_failing_update_scenario() {
        let engine = engine();
        let record = engine.create_record(fields("A")).unwrap();

        let report = engine.run_sync_cycle().unwrap();
        assert!(report.success);
        assert_eq!(
            engine.records().get(record.id).unwrap().unwrap().sync_status,
            RecordSyncStatus::Synced
        );

        engine.update_record(record.id, fields("B")).unwrap();
        engine
            .transport()
            .set_behavior(MockBehavior::RejectAll("server error".into()));

        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.failed_items, 1);
        let update = engine.outbox().pending_items().pop().unwrap();
        assert_eq!(update.status, QueueStatus::Pending);
        assert_eq!(update.retry_count, 1);

        engine.run_sync_cycle().unwrap();
        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.permanent_failures, 1);

        let failed = engine.outbox().get(update.id).unwrap();
        assert_eq!(failed.status, QueueStatus::Failed);
        assert_eq!(failed.retry_count, 3);

        let report = engine.run_sync_cycle().unwrap();
        assert!(report.success);
        assert_eq!(report.failed_items, 0);
        assert_eq!(engine.outbox().get(update.id).unwrap(), failed);
    }

    #[test]
    fn newer_remote_version_wins_conflict() {
        let clock = Arc::new(ManualClock::new(100));
        let engine = engine_with(SyncConfig::new(), Arc::clone(&clock));
        let record = engine.create_record(fields("local")).unwrap();

        engine.transport().push_reply(MockReply::Outcomes(vec![ItemOutcome::Success {
            server_id: Some("srv-7".into()),
            remote: Some(RecordVersion::new(fields("remote"), Timestamp::from_millis(500))),
        }]));
        clock.set(200);

        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.conflicts_resolved, 1);
        let merged = engine.records().get(record.id).unwrap().unwrap();
        assert_eq!(merged.fields, fields("remote"));
        assert_eq!(merged.server_id.as_deref(), Some("srv-7"));
        assert_eq!(merged.sync_status, RecordSyncStatus::Synced);
        assert!(merged.last_synced_at.unwrap() >= merged.updated_at);
    }

    #[test]
    fn newer_local_version_wins_conflict() {
        let clock = Arc::new(ManualClock::new(900));
        let engine = engine_with(SyncConfig::new(), Arc::clone(&clock));
        let record = engine.create_record(fields("local")).unwrap();

        engine.transport().push_reply(MockReply::Outcomes(vec![ItemOutcome::Success {
            server_id: None,
            remote: Some(RecordVersion::new(fields("remote"), Timestamp::from_millis(400))),
        }]));

        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.conflicts_resolved, 1);
        let kept = engine.records().get(record.id).unwrap().unwrap();
        assert_eq!(kept.fields, fields("local"));
        assert_eq!(kept.sync_status, RecordSyncStatus::Synced);
    }

    #[test]
    fn identical_remote_version_is_not_a_conflict() {
        let engine = engine();
        let record = engine.create_record(fields("same")).unwrap();
        engine.transport().push_reply(MockReply::Outcomes(vec![ItemOutcome::Success {
            server_id: None,
            remote: Some(RecordVersion::new(fields("same"), Timestamp::from_millis(5))),
        }]));

        let report = engine.run_sync_cycle().unwrap();
        assert_eq!(report.conflicts_resolved, 0);
        assert_eq!(
            engine.records().get(record.id).unwrap().unwrap().updated_at,
            record.updated_at
        );
    }

    #[test]
    fn delete_enqueues_snapshot() {
        let engine = engine();
        let record = engine.create_record(fields("doomed")).unwrap();
        assert!(engine.delete_record(record.id).unwrap());
        assert!(!engine.delete_record(record.id).unwrap());

        let pending = engine.outbox().pending_items();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].operation, Operation::Delete);
        assert_eq!(pending[1].payload, fields("doomed"));
    }

    #[test]
    fn cycle_guard_blocks_overlap() {
        let engine = engine();
        engine.running.store(true, Ordering::SeqCst);
        assert!(matches!(engine.run_sync_cycle(), Err(SyncError::CycleInProgress)));
        engine.running.store(false, Ordering::SeqCst);
        assert!(engine.run_sync_cycle().is_ok());
    }
}
