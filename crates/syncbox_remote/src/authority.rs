//! Authoritative record state on the remote side.

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use syncbox_protocol::{
    resolve, BatchRequest, BatchResponse, Fields, ItemOutcome, Operation, QueueItem, QueueItemId,
    RecordId, RecordVersion, Timestamp, Winner,
};

/// The remote copy of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Id assigned by the authority.
    pub server_id: String,
    /// Current authoritative version.
    pub version: RecordVersion,
    /// Whether a delete has been accepted.
    pub deleted: bool,
}

#[derive(Default)]
struct State {
    records: HashMap<RecordId, RemoteRecord>,
    /// Outcome of every accepted queue item, for idempotent resends.
    processed: HashMap<QueueItemId, ItemOutcome>,
    rejections: HashMap<RecordId, String>,
    /// Records edited remotely since the client last pushed them.
    edited: HashSet<RecordId>,
    next_server_id: u64,
}

/// In-process remote authority.
///
/// Serves a single client: queue item ids are only unique per outbox.
pub struct RemoteAuthority {
    config: RemoteConfig,
    state: RwLock<State>,
    reachable: AtomicBool,
    failing_batches: AtomicU32,
    accepted: AtomicU64,
}

impl RemoteAuthority {
    /// Creates a reachable authority with no records.
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
            reachable: AtomicBool::new(true),
            failing_batches: AtomicU32::new(0),
            accepted: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Makes the authority reachable or not.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns whether the authority answers requests.
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Rejects every push for `record_id` with `message` until cleared.
    pub fn reject_record(&self, record_id: RecordId, message: impl Into<String>) {
        self.state.write().rejections.insert(record_id, message.into());
    }

    /// Stops rejecting pushes for `record_id`.
    pub fn clear_rejection(&self, record_id: RecordId) {
        self.state.write().rejections.remove(&record_id);
    }

    /// Fails the next `count` batch requests as a whole.
    pub fn fail_next_batches(&self, count: u32) {
        self.failing_batches.store(count, Ordering::SeqCst);
    }

    /// Simulates another writer changing `record_id` on the remote side.
    ///
    /// The next push for the record reports this version back so the client
    /// can resolve the conflict, even if the push wins.
    pub fn modify_remote(&self, record_id: RecordId, fields: Fields, updated_at: Timestamp) {
        let mut state = self.state.write();
        let server_id = Self::server_id_for(&self.config, &mut state, record_id);
        state.records.insert(
            record_id,
            RemoteRecord {
                server_id,
                version: RecordVersion::new(fields, updated_at),
                deleted: false,
            },
        );
        state.edited.insert(record_id);
    }

    /// Returns the remote copy of a record.
    pub fn record(&self, record_id: RecordId) -> Option<RemoteRecord> {
        self.state.read().records.get(&record_id).cloned()
    }

    /// Number of records known to the authority, deleted ones included.
    pub fn record_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Number of queue items accepted so far. Resends are not counted.
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Applies a batch and returns one outcome per item, in order.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Unavailable`] while unreachable,
    /// [`RemoteError::InvalidRequest`] for an oversized batch, and
    /// [`RemoteError::Internal`] for an injected failure. No item is applied
    /// in any of these cases.
    pub fn handle_batch(&self, request: BatchRequest) -> RemoteResult<BatchResponse> {
        if !self.is_reachable() {
            return Err(RemoteError::Unavailable);
        }
        if request.items.len() > self.config.max_batch {
            return Err(RemoteError::InvalidRequest(format!(
                "too many items: {} > {}",
                request.items.len(),
                self.config.max_batch
            )));
        }
        if self
            .failing_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            tracing::debug!(items = request.items.len(), "injected batch failure");
            return Err(RemoteError::Internal("injected batch failure".into()));
        }

        let mut state = self.state.write();
        let outcomes = request
            .items
            .iter()
            .map(|item| self.apply_item(&mut state, item))
            .collect();
        Ok(BatchResponse::new(outcomes))
    }

    fn apply_item(&self, state: &mut State, item: &QueueItem) -> ItemOutcome {
        if let Some(previous) = state.processed.get(&item.id) {
            tracing::debug!(queue_item = %item.id, "resent item, replaying outcome");
            return previous.clone();
        }
        if let Some(message) = state.rejections.get(&item.record_id) {
            return ItemOutcome::error(message.clone());
        }

        let server_id = Self::server_id_for(&self.config, state, item.record_id);
        let remotely_edited = state.edited.remove(&item.record_id);
        let current = state.records.get(&item.record_id).cloned();
        let mut reported = None;

        let next = match item.operation {
            Operation::Delete => RemoteRecord {
                server_id: server_id.clone(),
                version: current
                    .map(|r| r.version)
                    .unwrap_or_else(|| RecordVersion::new(item.payload.clone(), item.created_at)),
                deleted: true,
            },
            Operation::Create | Operation::Update => {
                let incoming = RecordVersion::new(item.payload.clone(), item.created_at);
                let version = match current.filter(|r| !r.deleted) {
                    Some(current) => {
                        let winner = resolve(&incoming, &current.version);
                        let differs = current.version.fields != incoming.fields;
                        if differs && (winner == Winner::Remote || remotely_edited) {
                            reported = Some(current.version.clone());
                        }
                        winner.pick(&incoming, &current.version).clone()
                    }
                    None => incoming,
                };
                RemoteRecord {
                    server_id: server_id.clone(),
                    version,
                    deleted: false,
                }
            }
        };
        state.records.insert(item.record_id, next);

        let outcome = ItemOutcome::Success {
            server_id: Some(server_id),
            remote: reported,
        };
        state.processed.insert(item.id, outcome.clone());
        self.accepted.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    fn server_id_for(config: &RemoteConfig, state: &mut State, record_id: RecordId) -> String {
        if let Some(existing) = state.records.get(&record_id) {
            return existing.server_id.clone();
        }
        state.next_server_id += 1;
        format!("{}-{}", config.server_id_prefix, state.next_server_id)
    }
}

impl Default for RemoteAuthority {
    fn default() -> Self {
        Self::new(RemoteConfig::default())
    }
}
