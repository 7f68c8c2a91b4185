//! HTTP-shaped transport.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so applications
//! can plug in whichever library they already use. Bodies are CBOR-encoded
//! [`BatchRequest`] / [`BatchResponse`] messages.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::BatchTransport;
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use syncbox_protocol::{BatchRequest, BatchResponse, ItemOutcome, QueueItem};

/// Path of the batch endpoint.
pub const BATCH_PATH: &str = "/sync/batch";

/// Path of the health endpoint used by the reachability probe.
pub const HEALTH_PATH: &str = "/sync/health";

/// Minimal HTTP client interface.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Sends a GET request bounded by `timeout` and returns the response body.
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, String>;
}

/// Batch transport over an [`HttpClient`].
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
    probe_timeout: Duration,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport for the authority at `base_url`, with the default
    /// probe timeout of [`SyncConfig`].
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self::from_config(base_url, client, &SyncConfig::default())
    }

    /// Creates a transport whose probe is bounded by `config.probe_timeout`.
    pub fn from_config(base_url: impl Into<String>, client: C, config: &SyncConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            probe_timeout: config.probe_timeout,
            last_error: RwLock::new(None),
        }
    }

    /// Sets the reachability probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Returns the reachability probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn fail(&self, message: String) -> SyncError {
        *self.last_error.write() = Some(message.clone());
        SyncError::transport(message)
    }
}

impl<C: HttpClient> BatchTransport for HttpTransport<C> {
    fn probe_reachability(&self) -> bool {
        match self.client.get(&self.url(HEALTH_PATH), self.probe_timeout) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.base_url, error = %e, "health probe failed");
                *self.last_error.write() = Some(e);
                false
            }
        }
    }

    fn send_batch(&self, items: &[QueueItem]) -> SyncResult<Vec<ItemOutcome>> {
        let body = BatchRequest::new(items.to_vec())
            .encode()
            .map_err(|e| self.fail(format!("failed to encode batch: {e}")))?;

        let response = self
            .client
            .post(&self.url(BATCH_PATH), body)
            .map_err(|e| self.fail(e))?;

        let decoded = BatchResponse::decode(&response)
            .map_err(|e| self.fail(format!("failed to decode batch response: {e}")))?;

        *self.last_error.write() = None;
        Ok(decoded.outcomes)
    }
}

/// Servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a POST request.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;

    /// Handles a GET request.
    fn handle_get(&self, path: &str) -> Result<Vec<u8>, String>;
}

/// An [`HttpClient`] that routes requests straight into an in-process server.
///
/// A GET whose handler runs past its timeout is answered with an error, as a
/// real client would give up on a slow health endpoint.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a client connected to `server`.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

fn path_of(url: &str) -> &str {
    url.find("/sync/").map_or(url, |i| &url[i..])
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        self.server.handle_post(path_of(url), &body)
    }

    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, String> {
        let started = Instant::now();
        let body = self.server.handle_get(path_of(url))?;
        if started.elapsed() > timeout {
            return Err(format!("GET {url} timed out after {timeout:?}"));
        }
        Ok(body)
    }
}
