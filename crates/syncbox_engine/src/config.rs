//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of queue items sent in one `send_batch` call.
    pub batch_size: usize,
    /// Processing errors after which an item is permanently failed.
    pub max_retries: u32,
    /// Upper bound on the reachability probe.
    pub probe_timeout: Duration,
    /// Period of the recurring scheduler.
    pub sync_interval: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            batch_size: 50,
            max_retries: 3,
            probe_timeout: Duration::from_secs(5),
            sync_interval: Duration::from_secs(60),
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the recurring sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Checks that the configuration can drive a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] for a zero batch size, a zero
    /// retry ceiling, or a zero sync interval.
    pub fn validate(&self) -> SyncResult<()> {
        if self.batch_size == 0 {
            return Err(SyncError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(SyncError::InvalidConfig("max_retries must be at least 1".into()));
        }
        if self.sync_interval.is_zero() {
            return Err(SyncError::InvalidConfig("sync_interval must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = SyncConfig::new()
            .with_batch_size(2)
            .with_max_retries(5)
            .with_probe_timeout(Duration::from_millis(250))
            .with_sync_interval(Duration::from_secs(10));

        assert_eq!(config.batch_size, 2);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
        assert_eq!(config.sync_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn rejects_zero_values() {
        assert!(SyncConfig::new().with_batch_size(0).validate().is_err());
        assert!(SyncConfig::new().with_max_retries(0).validate().is_err());
        assert!(SyncConfig::new()
            .with_sync_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
