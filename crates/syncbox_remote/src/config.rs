//! Remote authority configuration.

/// Configuration for a [`RemoteAuthority`](crate::RemoteAuthority).
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Largest batch accepted in one request.
    pub max_batch: usize,
    /// Prefix for assigned server ids.
    pub server_id_prefix: String,
}

impl RemoteConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_batch: 500,
            server_id_prefix: "srv".into(),
        }
    }

    /// Sets the largest accepted batch.
    pub fn with_max_batch(mut self, size: usize) -> Self {
        self.max_batch = size;
        self
    }

    /// Sets the server id prefix.
    pub fn with_server_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.server_id_prefix = prefix.into();
        self
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new()
    }
}
