//! Recurring sync on a Tokio runtime.
//!
//! The scheduler calls [`CycleRunner::run_cycle`] once immediately and then
//! on every tick of a fixed interval. Cycles run on the blocking pool, one at
//! a time; a tick that comes due while a cycle is still running is skipped.

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};
use crate::state::SyncReport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Something that can run one sync cycle.
pub trait CycleRunner: Send + Sync {
    /// Runs one cycle to completion.
    fn run_cycle(&self) -> SyncResult<SyncReport>;
}

#[derive(Default)]
struct Shared {
    cycles_run: AtomicU64,
    last_report: Mutex<Option<SyncReport>>,
}

/// Handle to a running scheduler.
///
/// Dropping the handle stops the scheduler after the cycle in flight, if
/// any, completes. Use [`SchedulerHandle::stop`] to wait for that.
pub struct SchedulerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    trigger: Arc<Notify>,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Starts a scheduler on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] for a zero interval,
    /// [`SyncError::Scheduler`] when there is no current runtime.
    pub fn start(
        runner: Arc<dyn CycleRunner>,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> SyncResult<Self> {
        if interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "sync interval must be greater than zero".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|e| SyncError::Scheduler(e.to_string()))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let trigger = Arc::new(Notify::new());
        let shared = Arc::new(Shared::default());

        let task = runtime.spawn(run_loop(
            runner,
            interval,
            clock,
            Arc::clone(&shared),
            Arc::clone(&trigger),
            stop_rx,
        ));
        tracing::info!(interval_ms = interval.as_millis() as u64, "sync scheduler started");

        Ok(Self {
            stop_tx: Some(stop_tx),
            trigger,
            shared,
            task: Some(task),
        })
    }

    /// Requests a cycle now instead of waiting for the next tick.
    ///
    /// Requests made while a cycle is running collapse into one follow-up.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Number of cycles the scheduler has finished.
    pub fn cycles_run(&self) -> u64 {
        self.shared.cycles_run.load(Ordering::SeqCst)
    }

    /// Report of the last finished cycle.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.shared.last_report.lock().clone()
    }

    /// Returns true until the scheduler loop has exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the scheduler and waits for the cycle in flight to complete.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "sync scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

async fn run_loop(
    runner: Arc<dyn CycleRunner>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    trigger: Arc<Notify>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {}
            _ = trigger.notified() => {}
        }

        let cycle_runner = Arc::clone(&runner);
        let outcome = tokio::task::spawn_blocking(move || cycle_runner.run_cycle()).await;

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(SyncError::CycleInProgress)) => {
                tracing::debug!("sync cycle already running, tick skipped");
                continue;
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "sync cycle failed");
                SyncReport::faulted(&err, clock.now())
            }
            Err(err) => {
                tracing::error!(error = %err, "sync cycle panicked");
                SyncReport {
                    fault: Some(format!("sync cycle panicked: {err}")),
                    ..SyncReport::default()
                }
            }
        };

        shared.cycles_run.fetch_add(1, Ordering::SeqCst);
        *shared.last_report.lock() = Some(report);
    }

    tracing::info!("sync scheduler stopped");
}
