//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the snapshot pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of snapshots open at the same time
    max_connections: usize,
    /// Timeout in milliseconds when waiting for a free slot
    acquire_timeout_ms: u64,
}

impl PoolConfig {
    /// Create a pool configuration allowing `max_connections` concurrent snapshots
    ///
    /// A value of 0 is raised to 1.
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections: max_connections.max(1),
            acquire_timeout_ms: 30_000,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections.max(1)
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// Defaults: 4 concurrent snapshots, 30 second acquire timeout
    fn default() -> Self {
        Self::new(4)
    }
}
