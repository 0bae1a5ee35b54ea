//! SQLens Bench - measured validation of recommendations
//!
//! Runs an original query and one variant (a rewrite, or the same query with
//! index DDL applied) against one disposable dataset snapshot and compares
//! their timing distributions and result sets.

pub mod harness;
pub mod pool;
pub mod stats;

pub use harness::{
    BenchmarkConfig, BenchmarkExecutionError, BenchmarkHarness, BenchmarkResult, BenchmarkVariant,
    MIN_REPETITIONS, VariantLabel, improvement_percent,
};
pub use pool::{BenchmarkPool, PoolConfig, PoolStats, PooledSnapshot};
pub use stats::{RowSetHash, TimingStats, row_set_hash};
