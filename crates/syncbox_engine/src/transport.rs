//! Batch transport abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use syncbox_protocol::{ItemOutcome, QueueItem, QueueItemId};

/// Carries batches of queue items to the remote authority.
///
/// Implementations decide the wire (HTTP, loopback, mock). The engine only
/// needs a reachability probe and a per-item outcome for every batch.
pub trait BatchTransport: Send + Sync {
    /// Returns whether the remote authority can be reached right now.
    ///
    /// Must be bounded by a short timeout and must report `false` instead of
    /// failing.
    fn probe_reachability(&self) -> bool;

    /// Sends one batch and returns one outcome per item, in input order.
    ///
    /// An `Err` means the whole call failed and no item was applied.
    fn send_batch(&self, items: &[QueueItem]) -> SyncResult<Vec<ItemOutcome>>;
}

/// What a [`MockTransport`] does with a batch when nothing is scripted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Acknowledge every item with server id `srv-<record id>`.
    AcceptAll,
    /// Reject every item with this message.
    RejectAll(String),
    /// Fail the whole call with this message.
    FailBatch(String),
}

/// A scripted reply for one `send_batch` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return these outcomes.
    Outcomes(Vec<ItemOutcome>),
    /// Fail the call.
    Fail(String),
}

/// A transport for tests that records every batch it is handed.
#[derive(Debug)]
pub struct MockTransport {
    reachable: AtomicBool,
    behavior: Mutex<MockBehavior>,
    script: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<Vec<QueueItemId>>>,
    probes: Mutex<u32>,
}

impl MockTransport {
    /// Creates a reachable transport that accepts everything.
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::AcceptAll)
    }

    /// Creates a reachable transport with a default behavior.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            reachable: AtomicBool::new(true),
            behavior: Mutex::new(behavior),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
        }
    }

    /// Sets what the probe reports.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Replaces the default behavior.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Queues a reply for the next unscripted call.
    pub fn push_reply(&self, reply: MockReply) {
        self.script.lock().push_back(reply);
    }

    /// Ids of every batch received, in call order.
    pub fn calls(&self) -> Vec<Vec<QueueItemId>> {
        self.calls.lock().clone()
    }

    /// Number of probes performed.
    pub fn probe_count(&self) -> u32 {
        *self.probes.lock()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchTransport for MockTransport {
    fn probe_reachability(&self) -> bool {
        *self.probes.lock() += 1;
        self.reachable.load(Ordering::SeqCst)
    }

    fn send_batch(&self, items: &[QueueItem]) -> SyncResult<Vec<ItemOutcome>> {
        self.calls.lock().push(items.iter().map(|item| item.id).collect());

        if let Some(reply) = self.script.lock().pop_front() {
            return match reply {
                MockReply::Outcomes(outcomes) => Ok(outcomes),
                MockReply::Fail(message) => Err(SyncError::transport(message)),
            };
        }

        match &*self.behavior.lock() {
            MockBehavior::AcceptAll => Ok(items
                .iter()
                .map(|item| ItemOutcome::acknowledged(format!("srv-{}", item.record_id)))
                .collect()),
            MockBehavior::RejectAll(message) => {
                Ok(items.iter().map(|_| ItemOutcome::error(message.clone())).collect())
            }
            MockBehavior::FailBatch(message) => Err(SyncError::transport(message.clone())),
        }
    }
}
