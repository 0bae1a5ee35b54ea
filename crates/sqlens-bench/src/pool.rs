//! Admission control for benchmark snapshots
//!
//! Every benchmark runs on its own dataset snapshot. The pool bounds how
//! many snapshots exist at once; excess requests queue on a semaphore until
//! a lease is dropped or the acquire timeout expires.
//!
//! ```ignore
//! let config = PoolConfig::new(4).with_acquire_timeout_ms(5000);
//! let pool = BenchmarkPool::new(config, Arc::new(SqliteDatasetProvider::new()));
//! let snapshot = pool.acquire("synthetic:10000").await?;
//! // Snapshot is discarded and its slot released on drop
//! ```

mod config;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use pool::{BenchmarkPool, PooledSnapshot};
pub use stats::PoolStats;
