//! End-to-end benchmark runs against synthetic SQLite snapshots

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlens_bench::{BenchmarkConfig, BenchmarkHarness, BenchmarkPool, BenchmarkVariant, PoolConfig};
use sqlens_driver_sqlite::SqliteDatasetProvider;
use tokio_util::sync::CancellationToken;

const DATASET: &str = "synthetic:2000";

fn harness() -> BenchmarkHarness {
    harness_with(BenchmarkConfig::new().with_repetitions(3))
}

fn harness_with(config: BenchmarkConfig) -> BenchmarkHarness {
    let pool = BenchmarkPool::new(PoolConfig::new(2), Arc::new(SqliteDatasetProvider::new()));
    BenchmarkHarness::new(Arc::new(pool)).with_config(config)
}

#[tokio::test]
async fn test_union_all_on_overlapping_ids_is_invalid() {
    let results = harness()
        .run(
            &BenchmarkVariant::new("SELECT id FROM customers_2024 UNION SELECT id FROM customers_archive"),
            &BenchmarkVariant::new(
                "SELECT id FROM customers_2024 UNION ALL SELECT id FROM customers_archive",
            ),
            DATASET,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(results[0].valid);
    assert_eq!(results[0].row_count, Some(3000));
    assert!(!results[1].valid);
    assert_eq!(results[1].row_count, Some(4000));
    assert!(
        results[1]
            .invalid_reason
            .as_deref()
            .unwrap()
            .contains("row count differs")
    );
}

#[tokio::test]
async fn test_union_all_on_disjoint_rows_is_valid() {
    let results = harness()
        .run(
            &BenchmarkVariant::new(
                "SELECT id, email FROM customers_2024 UNION SELECT id, email FROM customers_archive",
            ),
            &BenchmarkVariant::new(
                "SELECT id, email FROM customers_2024 UNION ALL SELECT id, email FROM customers_archive",
            ),
            DATASET,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(results.iter().all(|r| r.valid));
    assert_eq!(results[0].row_hash, results[1].row_hash);
    assert!(results[1].improvement_percent.is_some());
}

#[tokio::test]
async fn test_index_variant_runs_with_setup_on_the_snapshot() {
    let sql = "SELECT id FROM orders WHERE status = 'paid'";
    let results = harness()
        .run(
            &BenchmarkVariant::new(sql),
            &BenchmarkVariant::new(sql)
                .with_setup("CREATE INDEX idx_orders_status ON orders (status)")
                .with_teardown("DROP INDEX idx_orders_status"),
            DATASET,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(results.iter().all(|r| r.valid));
    assert_eq!(results[0].row_count, Some(500));
    assert_eq!(results[0].row_hash, results[1].row_hash);
}

#[tokio::test]
async fn test_in_subquery_rewrite_is_equivalent() {
    let results = harness()
        .run(
            &BenchmarkVariant::new(
                "SELECT id FROM orders o WHERE o.id IN (SELECT order_id FROM payments WHERE amount > 100)",
            ),
            &BenchmarkVariant::new(
                "SELECT id FROM orders AS o INNER JOIN (SELECT DISTINCT order_id FROM payments WHERE amount > 100) AS sq ON o.id = sq.order_id",
            ),
            DATASET,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(results[0].valid);
    assert!(results[1].valid, "{:?}", results[1].invalid_reason);
}

#[tokio::test]
async fn test_unknown_dataset_is_an_error() {
    let err = harness()
        .run(
            &BenchmarkVariant::new("SELECT 1"),
            &BenchmarkVariant::new("SELECT 1"),
            "mysql://prod",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown dataset"));
}

#[tokio::test]
async fn test_runaway_query_is_interrupted_at_the_timeout() {
    let harness = harness_with(
        BenchmarkConfig::new()
            .with_warmup_runs(0)
            .with_repetitions(3)
            .with_run_timeout_ms(50),
    );
    // Billions of join steps; would run for minutes if left alone
    let sql = "SELECT COUNT(*) FROM orders a, orders b, orders c";

    let started = Instant::now();
    let results = harness
        .run(
            &BenchmarkVariant::new(sql),
            &BenchmarkVariant::new(sql),
            DATASET,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    for result in &results {
        assert!(!result.valid);
        assert_eq!(result.invalid_reason.as_deref(), Some("run exceeded 50ms"));
    }
}
