//! Snapshot pool implementation

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlens_core::{Connection, DatasetProvider, Result, SqlensError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Bounds the number of dataset snapshots open at once
pub struct BenchmarkPool {
    config: PoolConfig,
    provider: Arc<dyn DatasetProvider>,
    /// Semaphore to limit concurrent snapshots
    semaphore: Arc<Semaphore>,
    active_count: AtomicUsize,
    waiting_count: AtomicUsize,
}

impl BenchmarkPool {
    pub fn new(config: PoolConfig, provider: Arc<dyn DatasetProvider>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_connections()));
        Self {
            config,
            provider,
            semaphore,
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
        }
    }

    /// Wait for a free slot, then open a fresh snapshot of `dataset`
    ///
    /// Only the wait for a slot is bounded by the acquire timeout; building
    /// the snapshot is not.
    #[tracing::instrument(skip(self), fields(max = self.config.max_connections()))]
    pub async fn acquire(&self, dataset: &str) -> Result<PooledSnapshot<'_>> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let permit = tokio::time::timeout(
            self.config.acquire_timeout(),
            self.semaphore.clone().acquire_owned(),
        )
        .await;
        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        let permit = match permit {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(SqlensError::Connection("Pool semaphore closed".into())),
            Err(_) => {
                tracing::warn!("timed out waiting for a benchmark slot");
                return Err(SqlensError::Timeout(format!(
                    "Timed out waiting for a benchmark slot (timeout: {:?})",
                    self.config.acquire_timeout()
                )));
            }
        };

        let connection = self.provider.open(dataset).await?;
        self.active_count.fetch_add(1, Ordering::SeqCst);
        Ok(PooledSnapshot {
            connection,
            pool: self,
            _permit: permit,
        })
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats::new(
            self.active_count.load(Ordering::SeqCst),
            self.waiting_count.load(Ordering::SeqCst),
            self.semaphore.available_permits(),
        )
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// A snapshot leased from the pool
///
/// Dropping it discards the snapshot and frees the slot.
pub struct PooledSnapshot<'a> {
    connection: Arc<dyn Connection>,
    pool: &'a BenchmarkPool,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledSnapshot<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledSnapshot<'_> {
    fn drop(&mut self) {
        self.pool.active_count.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PooledSnapshot<'_> {
    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}
