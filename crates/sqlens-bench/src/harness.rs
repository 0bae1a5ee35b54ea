//! Baseline vs optimized benchmark runs
//!
//! Both variants run on one snapshot, one after the other: baseline first,
//! then the optimized variant with its setup statements applied. Each
//! variant gets `warmup_runs` discarded executions followed by
//! `repetitions` timed ones.

use serde::{Deserialize, Serialize};
use sqlens_core::{Connection, QueryCancelHandle, QueryResult, Result, SqlensError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pool::BenchmarkPool;
use crate::stats::{RowSetHash, TimingStats, row_set_hash};

/// Fewest timed runs that still give a distribution
pub const MIN_REPETITIONS: usize = 3;

/// Failure of one variant. Never aborts the sibling variant.
#[derive(Debug, Error)]
pub enum BenchmarkExecutionError {
    #[error("setup statement `{statement}` failed: {source}")]
    Setup {
        statement: String,
        #[source]
        source: SqlensError,
    },

    #[error("query failed: {0}")]
    Query(#[source] SqlensError),

    #[error("run exceeded {0:?}")]
    Timeout(Duration),

    #[error("benchmark cancelled")]
    Cancelled,
}

/// Benchmark configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Discarded runs before timing starts
    pub warmup_runs: usize,
    /// Timed runs per variant
    pub repetitions: usize,
    /// Limit for a single execution in milliseconds
    pub run_timeout_ms: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            warmup_runs: 1,
            repetitions: 5,
            run_timeout_ms: 30_000,
        }
    }
}

impl BenchmarkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warmup_runs(mut self, runs: usize) -> Self {
        self.warmup_runs = runs;
        self
    }

    /// Values below [`MIN_REPETITIONS`] are raised to it
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions.max(MIN_REPETITIONS);
        self
    }

    pub fn with_run_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.run_timeout_ms = timeout_ms;
        self
    }

    pub fn repetitions(&self) -> usize {
        self.repetitions.max(MIN_REPETITIONS)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

/// A query plus the statements that prepare and restore the snapshot for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchmarkVariant {
    pub sql: String,
    pub setup: Vec<String>,
    pub teardown: Vec<String>,
}

impl BenchmarkVariant {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            setup: Vec::new(),
            teardown: Vec::new(),
        }
    }

    pub fn with_setup(mut self, statement: impl Into<String>) -> Self {
        self.setup.push(statement.into());
        self
    }

    pub fn with_teardown(mut self, statement: impl Into<String>) -> Self {
        self.teardown.push(statement.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantLabel {
    Baseline,
    Optimized,
}

/// Measured outcome of one variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub label: VariantLabel,
    pub sql: String,
    pub timings: Option<TimingStats>,
    pub row_count: Option<usize>,
    pub row_hash: Option<RowSetHash>,
    /// False when the variant failed or its result set differs from baseline
    pub valid: bool,
    pub invalid_reason: Option<String>,
    /// Median speedup over baseline; only on a valid optimized result with a valid baseline
    pub improvement_percent: Option<f64>,
}

impl BenchmarkResult {
    fn failed(label: VariantLabel, sql: &str, error: &BenchmarkExecutionError) -> Self {
        Self {
            label,
            sql: sql.to_string(),
            timings: None,
            row_count: None,
            row_hash: None,
            valid: false,
            invalid_reason: Some(error.to_string()),
            improvement_percent: None,
        }
    }

    fn measured(label: VariantLabel, sql: &str, measurement: Measurement) -> Self {
        Self {
            label,
            sql: sql.to_string(),
            timings: Some(measurement.timings),
            row_count: Some(measurement.row_count),
            row_hash: Some(measurement.row_hash),
            valid: true,
            invalid_reason: None,
            improvement_percent: None,
        }
    }

    fn invalidate(&mut self, reason: String) {
        self.valid = false;
        self.invalid_reason = Some(reason);
    }

    pub fn median_ms(&self) -> Option<f64> {
        self.timings.as_ref().map(|t| t.median_ms)
    }
}

/// Percentage by which `optimized_ms` undercuts `baseline_ms`
///
/// Negative when the optimized variant is slower. `None` for a zero baseline.
pub fn improvement_percent(baseline_ms: f64, optimized_ms: f64) -> Option<f64> {
    (baseline_ms > 0.0).then(|| (baseline_ms - optimized_ms) / baseline_ms * 100.0)
}

struct Measurement {
    timings: TimingStats,
    row_count: usize,
    row_hash: RowSetHash,
}

/// Runs baseline/optimized comparisons on pooled snapshots
pub struct BenchmarkHarness {
    config: BenchmarkConfig,
    pool: Arc<BenchmarkPool>,
}

impl BenchmarkHarness {
    pub fn new(pool: Arc<BenchmarkPool>) -> Self {
        Self {
            config: BenchmarkConfig::default(),
            pool,
        }
    }

    pub fn with_config(mut self, config: BenchmarkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn pool(&self) -> &BenchmarkPool {
        &self.pool
    }

    /// Benchmark `original` against `variant` on one snapshot of `dataset`
    ///
    /// Returns `[baseline, optimized]`. Only failing to obtain a snapshot is an
    /// error; failures while running a variant invalidate that variant alone.
    #[tracing::instrument(skip(self, original, variant, cancel), fields(dataset = %dataset))]
    pub async fn run(
        &self,
        original: &BenchmarkVariant,
        variant: &BenchmarkVariant,
        dataset: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<BenchmarkResult>> {
        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SqlensError::Cancelled),
            snapshot = self.pool.acquire(dataset) => snapshot?,
        };

        // Interrupts a statement that is still running when the token fires.
        let interrupt = snapshot.cancel_handle();
        let watcher = interrupt.clone().map(|handle| {
            let token = cancel.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                handle.cancel();
            })
        });
        let session = Session {
            connection: &*snapshot,
            interrupt: interrupt.as_deref(),
            cancel,
        };

        let baseline = self
            .measure(&session, original)
            .await
            .map(|m| BenchmarkResult::measured(VariantLabel::Baseline, &original.sql, m))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "baseline variant failed");
                BenchmarkResult::failed(VariantLabel::Baseline, &original.sql, &e)
            });
        let optimized = self
            .measure(&session, variant)
            .await
            .map(|m| BenchmarkResult::measured(VariantLabel::Optimized, &variant.sql, m))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "optimized variant failed");
                BenchmarkResult::failed(VariantLabel::Optimized, &variant.sql, &e)
            });

        if let Some(watcher) = watcher {
            watcher.abort();
        }

        let results = compare(baseline, optimized);
        tracing::info!(
            valid = results[1].valid,
            improvement_percent = ?results[1].improvement_percent,
            "benchmark finished"
        );
        Ok(results)
    }

    async fn measure(
        &self,
        session: &Session<'_>,
        variant: &BenchmarkVariant,
    ) -> std::result::Result<Measurement, BenchmarkExecutionError> {
        let measurement = match Self::apply_setup(session.connection, variant).await {
            Ok(()) => self.time_runs(session, &variant.sql).await,
            Err(e) => Err(e),
        };

        // Also after a failed setup, to undo the statements that did apply
        for statement in &variant.teardown {
            if let Err(e) = session.connection.execute(statement, &[]).await {
                tracing::warn!(statement = %statement, error = %e, "teardown statement failed");
            }
        }
        measurement
    }

    async fn apply_setup(
        connection: &dyn Connection,
        variant: &BenchmarkVariant,
    ) -> std::result::Result<(), BenchmarkExecutionError> {
        for statement in &variant.setup {
            connection
                .execute(statement, &[])
                .await
                .map_err(|source| BenchmarkExecutionError::Setup {
                    statement: statement.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn time_runs(
        &self,
        session: &Session<'_>,
        sql: &str,
    ) -> std::result::Result<Measurement, BenchmarkExecutionError> {
        for _ in 0..self.config.warmup_runs {
            self.run_once(session, sql).await?;
        }

        let repetitions = self.config.repetitions();
        let mut samples = Vec::with_capacity(repetitions);
        let mut fingerprint = None;
        for _ in 0..repetitions {
            let result = self.run_once(session, sql).await?;
            samples.push(result.execution_time);
            if fingerprint.is_none() {
                fingerprint = Some((result.row_count(), row_set_hash(&result.rows)));
            }
        }

        match (TimingStats::from_samples(&samples), fingerprint) {
            (Some(timings), Some((row_count, row_hash))) => Ok(Measurement {
                timings,
                row_count,
                row_hash,
            }),
            _ => Err(BenchmarkExecutionError::Query(SqlensError::Other(
                "no timed runs were executed".into(),
            ))),
        }
    }

    async fn run_once(
        &self,
        session: &Session<'_>,
        sql: &str,
    ) -> std::result::Result<QueryResult, BenchmarkExecutionError> {
        if session.cancel.is_cancelled() {
            return Err(BenchmarkExecutionError::Cancelled);
        }

        let timeout = self.config.run_timeout();
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => Err(BenchmarkExecutionError::Cancelled),
            outcome = tokio::time::timeout(timeout, session.connection.query(sql, &[])) => match outcome {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(SqlensError::Cancelled)) => Err(BenchmarkExecutionError::Cancelled),
                Ok(Err(e)) => Err(BenchmarkExecutionError::Query(e)),
                Err(_) => {
                    // The statement outlives the dropped future unless interrupted
                    if let Some(interrupt) = session.interrupt {
                        interrupt.cancel();
                    }
                    Err(BenchmarkExecutionError::Timeout(timeout))
                }
            },
        }
    }
}

/// The leased snapshot and the controls for statements running on it
struct Session<'a> {
    connection: &'a dyn Connection,
    interrupt: Option<&'a dyn QueryCancelHandle>,
    cancel: &'a CancellationToken,
}

/// Check the optimized result against baseline and fill in the improvement
fn compare(baseline: BenchmarkResult, mut optimized: BenchmarkResult) -> Vec<BenchmarkResult> {
    if baseline.valid && optimized.valid {
        if baseline.row_count != optimized.row_count {
            optimized.invalidate(format!(
                "row count differs from baseline ({} vs {})",
                optimized.row_count.unwrap_or_default(),
                baseline.row_count.unwrap_or_default()
            ));
        } else if baseline.row_hash != optimized.row_hash {
            optimized.invalidate("row set differs from baseline".to_string());
        } else if let (Some(base), Some(opt)) = (baseline.median_ms(), optimized.median_ms()) {
            optimized.improvement_percent = improvement_percent(base, opt);
        }
    }
    vec![baseline, optimized]
}

#[cfg(test)]
mod tests;
