use super::*;
use crate::pool::PoolConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlens_core::{DatasetProvider, Row, StatementResult, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers each query with fixed rows after a fixed simulated duration
#[derive(Default)]
struct ScriptedConnection {
    responses: HashMap<String, (Vec<Vec<Value>>, Duration)>,
    log: Mutex<Vec<String>>,
    delay: Option<Duration>,
    interrupts: Arc<AtomicUsize>,
}

struct CountingCancelHandle(Arc<AtomicUsize>);

impl QueryCancelHandle for CountingCancelHandle {
    fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedConnection {
    fn respond(mut self, sql: &str, rows: Vec<Vec<Value>>, millis: u64) -> Self {
        self.responses
            .insert(sql.to_string(), (rows, Duration::from_millis(millis)));
        self
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn driver_name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.log.lock().push(sql.to_string());
        if sql.starts_with("FAIL") {
            return Err(SqlensError::Query("statement rejected".into()));
        }
        Ok(StatementResult::default())
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.log.lock().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let (rows, elapsed) = self
            .responses
            .get(sql)
            .ok_or_else(|| SqlensError::Query(format!("no such table in `{sql}`")))?;
        Ok(QueryResult {
            columns: Vec::new(),
            rows: rows
                .iter()
                .map(|values| Row::new(vec!["c".into(); values.len()], values.clone()))
                .collect(),
            execution_time: *elapsed,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(CountingCancelHandle(self.interrupts.clone())))
    }
}

/// Hands out the same scripted connection for every snapshot
struct SharedProvider(Arc<ScriptedConnection>);

#[async_trait]
impl DatasetProvider for SharedProvider {
    async fn open(&self, _dataset: &str) -> Result<Arc<dyn Connection>> {
        Ok(self.0.clone())
    }
}

fn harness(connection: ScriptedConnection) -> (BenchmarkHarness, Arc<ScriptedConnection>) {
    let connection = Arc::new(connection);
    let pool = BenchmarkPool::new(
        PoolConfig::new(1),
        Arc::new(SharedProvider(connection.clone())),
    );
    (BenchmarkHarness::new(Arc::new(pool)), connection)
}

fn ints(values: &[i64]) -> Vec<Vec<Value>> {
    values.iter().map(|v| vec![Value::Int64(*v)]).collect()
}

async fn run(
    harness: &BenchmarkHarness,
    original: &str,
    variant: BenchmarkVariant,
) -> Vec<BenchmarkResult> {
    harness
        .run(
            &BenchmarkVariant::new(original),
            &variant,
            "synthetic",
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.warmup_runs, 1);
        assert_eq!(config.repetitions(), 5);
        assert_eq!(config.run_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_repetitions_have_a_floor() {
        assert_eq!(BenchmarkConfig::new().with_repetitions(1).repetitions(), 3);
        let parsed: BenchmarkConfig =
            serde_json::from_value(serde_json::json!({ "repetitions": 2 })).unwrap();
        assert_eq!(parsed.repetitions(), MIN_REPETITIONS);
        assert_eq!(parsed.warmup_runs, 1);
    }

    #[test]
    fn test_improvement_percent() {
        assert_eq!(improvement_percent(20.0, 10.0), Some(50.0));
        assert_eq!(improvement_percent(10.0, 15.0), Some(-50.0));
        assert_eq!(improvement_percent(0.0, 1.0), None);
    }
}

mod validity_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_equivalent_variants_are_valid() {
        let (harness, connection) = harness(
            ScriptedConnection::default()
                .respond("SELECT slow", ints(&[1, 2, 3]), 20)
                .respond("SELECT fast", ints(&[3, 1, 2]), 10),
        );
        let results = run(&harness, "SELECT slow", BenchmarkVariant::new("SELECT fast")).await;

        assert_eq!(results.len(), 2);
        let (baseline, optimized) = (&results[0], &results[1]);
        assert_eq!(baseline.label, VariantLabel::Baseline);
        assert_eq!(optimized.label, VariantLabel::Optimized);
        assert!(baseline.valid && optimized.valid);
        assert_eq!(optimized.row_count, Some(3));
        assert_eq!(baseline.row_hash, optimized.row_hash);
        assert_eq!(baseline.median_ms(), Some(20.0));
        assert_eq!(optimized.improvement_percent, Some(50.0));
        assert_eq!(baseline.improvement_percent, None);

        // One warm-up plus five timed runs per variant, baseline first.
        let log = connection.log.lock().clone();
        assert_eq!(log.len(), 12);
        assert!(log[..6].iter().all(|sql| sql == "SELECT slow"));
        assert!(log[6..].iter().all(|sql| sql == "SELECT fast"));
        assert_eq!(baseline.timings.as_ref().unwrap().samples_ms.len(), 5);
    }

    #[tokio::test]
    async fn test_row_count_mismatch_is_invalid() {
        let (harness, _) = harness(
            ScriptedConnection::default()
                .respond("SELECT DISTINCT", ints(&[1, 2]), 5)
                .respond("SELECT ALL", ints(&[1, 1, 2]), 1),
        );
        let results = run(&harness, "SELECT DISTINCT", BenchmarkVariant::new("SELECT ALL")).await;

        assert!(results[0].valid);
        assert!(!results[1].valid);
        assert_eq!(
            results[1].invalid_reason.as_deref(),
            Some("row count differs from baseline (3 vs 2)")
        );
        assert_eq!(results[1].improvement_percent, None);
    }

    #[tokio::test]
    async fn test_row_set_mismatch_is_invalid() {
        let (harness, _) = harness(
            ScriptedConnection::default()
                .respond("SELECT a", ints(&[1, 2]), 5)
                .respond("SELECT b", ints(&[1, 3]), 1),
        );
        let results = run(&harness, "SELECT a", BenchmarkVariant::new("SELECT b")).await;
        assert!(!results[1].valid);
        assert_eq!(
            results[1].invalid_reason.as_deref(),
            Some("row set differs from baseline")
        );
    }

    #[tokio::test]
    async fn test_optimized_failure_keeps_baseline() {
        let (harness, _) =
            harness(ScriptedConnection::default().respond("SELECT a", ints(&[1]), 5));
        let results = run(&harness, "SELECT a", BenchmarkVariant::new("SELECT missing")).await;

        assert!(results[0].valid);
        assert!(results[0].timings.is_some());
        assert!(!results[1].valid);
        assert!(results[1].timings.is_none());
        assert!(
            results[1]
                .invalid_reason
                .as_deref()
                .unwrap()
                .starts_with("query failed")
        );
    }

    #[tokio::test]
    async fn test_baseline_failure_does_not_invalidate_optimized() {
        let (harness, _) =
            harness(ScriptedConnection::default().respond("SELECT b", ints(&[1]), 5));
        let results = run(&harness, "SELECT missing", BenchmarkVariant::new("SELECT b")).await;

        assert!(!results[0].valid);
        assert!(results[1].valid);
        assert_eq!(results[1].improvement_percent, None);
    }
}

mod lifecycle_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_setup_and_teardown_wrap_the_optimized_runs() {
        let (harness, connection) = harness(
            ScriptedConnection::default().respond("SELECT a", ints(&[1]), 5),
        );
        let variant = BenchmarkVariant::new("SELECT a")
            .with_setup("CREATE INDEX idx_t_a ON t (a)")
            .with_teardown("DROP INDEX idx_t_a");
        let results = run(&harness, "SELECT a", variant).await;
        assert!(results[1].valid);

        let log = connection.log.lock().clone();
        assert_eq!(log.len(), 14);
        assert_eq!(log[6], "CREATE INDEX idx_t_a ON t (a)");
        assert_eq!(log[13], "DROP INDEX idx_t_a");
    }

    #[tokio::test]
    async fn test_failed_setup_is_torn_down() {
        let (harness, connection) = harness(
            ScriptedConnection::default().respond("SELECT a", ints(&[1]), 5),
        );
        let variant = BenchmarkVariant::new("SELECT a")
            .with_setup("CREATE INDEX idx_t_a ON t (a)")
            .with_setup("FAIL CREATE INDEX idx_t_b")
            .with_teardown("DROP INDEX idx_t_a");
        let results = run(&harness, "SELECT a", variant).await;

        assert!(!results[1].valid);
        assert!(
            results[1]
                .invalid_reason
                .as_deref()
                .unwrap()
                .contains("setup statement `FAIL CREATE INDEX idx_t_b` failed")
        );

        // The variant's query never runs, but the index that did get created is dropped
        let log = connection.log.lock().clone();
        assert_eq!(
            log[6..].to_vec(),
            vec![
                "CREATE INDEX idx_t_a ON t (a)".to_string(),
                "FAIL CREATE INDEX idx_t_b".to_string(),
                "DROP INDEX idx_t_a".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (harness, connection) = harness(ScriptedConnection::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = harness
            .run(
                &BenchmarkVariant::new("SELECT a"),
                &BenchmarkVariant::new("SELECT b"),
                "synthetic",
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SqlensError::Cancelled));
        assert!(connection.log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_runs_time_out() {
        let mut connection = ScriptedConnection::default().respond("SELECT a", ints(&[1]), 5);
        connection.delay = Some(Duration::from_secs(60));
        let (harness, connection) = harness(connection);
        let harness = harness.with_config(BenchmarkConfig::new().with_run_timeout_ms(50));

        let results = run(&harness, "SELECT a", BenchmarkVariant::new("SELECT a")).await;
        assert!(!results[0].valid);
        assert!(!results[1].valid);
        assert_eq!(
            results[0].invalid_reason.as_deref(),
            Some("run exceeded 50ms")
        );
        // Each timed-out statement is interrupted, once per variant
        assert_eq!(connection.interrupts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_serialized_shape() {
        let (harness, _) =
            harness(ScriptedConnection::default().respond("SELECT a", ints(&[1]), 4));
        let results = run(&harness, "SELECT a", BenchmarkVariant::new("SELECT a")).await;
        let json = serde_json::to_value(&results[1]).unwrap();
        assert_eq!(json["label"], "optimized");
        assert_eq!(json["valid"], true);
        assert_eq!(json["timings"]["median_ms"], 4.0);
        assert!(json["row_hash"].is_string());
    }
}
