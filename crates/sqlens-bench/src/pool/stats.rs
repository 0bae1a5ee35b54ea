//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Statistics about the pool's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of snapshots currently leased
    active: usize,
    /// Number of requests waiting for a slot
    waiting: usize,
    /// Number of free slots
    available: usize,
}

impl PoolStats {
    pub fn new(active: usize, waiting: usize, available: usize) -> Self {
        Self {
            active,
            waiting,
            available,
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn available(&self) -> usize {
        self.available
    }
}
