//! # syncbox engine
//!
//! Offline-first sync engine: local mutations are recorded in a durable
//! outbox and later pushed to a remote authority in batches.
//!
//! This crate provides:
//! - [`OutboxStore`], the crash-safe queue of pending mutations
//! - [`RecordStore`] and [`LogRecordStore`] for local record metadata
//! - [`BatchTransport`] with mock and HTTP-shaped implementations
//! - [`SyncEngine`], the cycle orchestrator with last-write-wins conflicts
//! - [`SchedulerHandle`] for recurring cycles on a Tokio runtime
//!
//! ## Cycle
//!
//! 1. Probe the remote authority; abort without touching the outbox if it
//!    cannot be reached
//! 2. Snapshot pending items in `created_at` order
//! 3. Send them in batches of `batch_size`, one batch at a time
//! 4. Apply each item's outcome: acknowledge, resolve a conflict, or count
//!    a retry
//!
//! ## Key Invariants
//!
//! - Synced and failed items never return to pending
//! - An item fails permanently once its retry count reaches `max_retries`
//! - At most one cycle runs at a time
//! - Nothing is lost on crash; acknowledged items may be resent

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod collection;
mod config;
mod error;
mod http;
mod outbox;
mod records;
mod scheduler;
mod state;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{CycleError, SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer, BATCH_PATH, HEALTH_PATH};
pub use outbox::{FailureOutcome, OutboxStats, OutboxStore};
pub use records::{LogRecordStore, RecordStore};
pub use scheduler::{CycleRunner, SchedulerHandle};
pub use state::{SyncEngine, SyncReport, SyncState, SyncStats};
pub use transport::{BatchTransport, MockBehavior, MockReply, MockTransport};
