//! Analysis service against synthetic SQLite snapshots

mod common;

use common::{DATASET, FixedPredictor, sqlite_service};
use pretty_assertions::assert_eq;
use sqlens_analyzer::{
    InferenceError, Prediction, RecommendationRef, ScoreProvenance, VerificationStatus,
};
use sqlens_core::NodeType;
use sqlens_services::{AnalysisCancellation, AnalysisOptions, ServiceError, SqlDialect};
use tokio_util::sync::CancellationToken;

fn bench_options() -> AnalysisOptions {
    AnalysisOptions::new()
        .with_dialect(SqlDialect::Sqlite)
        .with_benchmark(DATASET)
}

#[tokio::test]
async fn test_static_analysis_without_benchmarks() {
    let result = sqlite_service()
        .analyze(
            "SELECT * FROM orders WHERE UPPER(status) = 'PAID'",
            &AnalysisOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.analysis.health_score, 80);
    assert!(result.benchmarks.is_none());
    assert_eq!(result.scores.len(), result.recommendation_count());
    assert!(
        result
            .scores
            .iter()
            .all(|s| s.verification == VerificationStatus::NotRequested)
    );

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["dialect"], "generic");
    assert!(json.get("benchmarks").is_none());
    assert!(json["findings"].is_array());
}

#[tokio::test]
async fn test_parse_error_is_the_only_failure() {
    let err = sqlite_service()
        .analyze(
            "SELECT FROM WHERE",
            &bench_options(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("syntax error"));
}

#[tokio::test]
async fn test_valid_index_benchmark_verifies_the_score() {
    let result = sqlite_service()
        .analyze(
            "SELECT id FROM orders WHERE status = 'paid'",
            &bench_options(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let index = RecommendationRef::IndexCandidate(0);
    assert_eq!(result.analysis.index_candidates[0].columns, vec!["status"]);

    let benchmark = result.benchmark_for(index).unwrap();
    assert_eq!(
        benchmark.variant.setup,
        vec!["CREATE INDEX idx_orders_status ON orders (status)".to_string()]
    );
    assert!(benchmark.is_valid(), "{:?}", benchmark.failure_reason());
    assert_eq!(benchmark.baseline().unwrap().row_count, Some(500));

    let score = result.score_for(index).unwrap();
    assert_eq!(score.provenance, ScoreProvenance::BenchmarkVerified);
    assert_eq!(score.verification, VerificationStatus::Verified);
}

#[tokio::test]
async fn test_union_all_on_overlapping_tables_stays_unverified() {
    let result = sqlite_service()
        .analyze(
            "SELECT id FROM customers_2024 UNION SELECT id FROM customers_archive",
            &bench_options(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let rewrite = RecommendationRef::RewriteSuggestion(0);
    assert!(
        result.analysis.rewrite_suggestions[0]
            .rewritten_sql
            .contains("UNION ALL")
    );

    let benchmark = result.benchmark_for(rewrite).unwrap();
    assert!(!benchmark.is_valid());
    assert_eq!(benchmark.optimized().unwrap().row_count, Some(4000));

    let score = result.score_for(rewrite).unwrap();
    assert_eq!(score.provenance, ScoreProvenance::HeuristicOnly);
    assert_eq!(
        score.verification,
        VerificationStatus::Unverified {
            reason: "row count differs from baseline (4000 vs 3000)".into()
        }
    );
}

#[tokio::test]
async fn test_in_subquery_rewrite_is_verified() {
    let result = sqlite_service()
        .analyze(
            "SELECT id FROM orders o WHERE o.id IN (SELECT order_id FROM payments WHERE amount > 100)",
            &bench_options(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let rewrite = RecommendationRef::RewriteSuggestion(0);
    assert_eq!(result.analysis.rewrite_suggestions[0].rule, "RW002");
    let benchmark = result.benchmark_for(rewrite).unwrap();
    assert!(benchmark.is_valid(), "{:?}", benchmark.failure_reason());
    assert!(result.score_for(rewrite).unwrap().is_verified());
}

#[tokio::test]
async fn test_cancelled_benchmarks_keep_heuristic_scores() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = sqlite_service()
        .analyze("SELECT id FROM orders WHERE status = 'paid'", &bench_options(), cancel)
        .await
        .unwrap();

    assert!(!result.scores.is_empty());
    for score in &result.scores {
        assert_eq!(score.provenance, ScoreProvenance::HeuristicOnly);
        assert_eq!(
            score.verification,
            VerificationStatus::Unverified {
                reason: "benchmark cancelled".into()
            }
        );
    }
}

#[tokio::test]
async fn test_stopping_benchmarks_keeps_model_adjusted_scores() {
    let predictor = FixedPredictor::new(Ok(Prediction::new(1.0, 1.0)));
    let cancel = AnalysisCancellation::new();
    cancel.benchmarks.cancel();

    let result = sqlite_service()
        .with_predictor(predictor.clone())
        .analyze_with("SELECT id FROM orders WHERE status = 'paid'", &bench_options(), &cancel)
        .await
        .unwrap();

    assert!(!cancel.request.is_cancelled());
    assert_eq!(predictor.calls(), result.recommendation_count());
    assert!(!result.scores.is_empty());
    for score in &result.scores {
        assert_eq!(score.provenance, ScoreProvenance::MlAdjusted);
        assert!(score.inference_warning.is_none());
        assert_eq!(
            score.verification,
            VerificationStatus::Unverified {
                reason: "benchmark cancelled".into()
            }
        );
    }
}

#[tokio::test]
async fn test_unknown_dataset_labels_scores_unverified() {
    let options = AnalysisOptions::new().with_benchmark("oracle:prod");
    let result = sqlite_service()
        .analyze("SELECT id FROM orders WHERE status = 'paid'", &options, CancellationToken::new())
        .await
        .unwrap();

    let benchmark = &result.benchmarks.as_ref().unwrap()[0];
    assert!(benchmark.results.is_empty());
    assert!(benchmark.error.as_deref().unwrap().contains("unknown dataset"));
    assert!(result.scores.iter().all(|s| !s.is_verified()));
}

#[tokio::test]
async fn test_predictor_adjusts_scores() {
    let predictor = FixedPredictor::new(Ok(Prediction::new(1.0, 1.0)));
    let service = sqlite_service().with_predictor(predictor.clone());
    let result = service
        .analyze(
            "SELECT id FROM orders WHERE status = 'paid'",
            &AnalysisOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(predictor.calls(), result.recommendation_count());
    assert!(
        result
            .scores
            .iter()
            .all(|s| s.provenance == ScoreProvenance::MlAdjusted && s.value > s.heuristic)
    );
}

#[tokio::test]
async fn test_unavailable_predictor_degrades_to_heuristic() {
    let predictor = FixedPredictor::new(Err(InferenceError::Unavailable("down".into())));
    let result = sqlite_service()
        .with_predictor(predictor)
        .analyze(
            "SELECT id FROM orders WHERE status = 'paid'",
            &AnalysisOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    for score in &result.scores {
        assert_eq!(score.provenance, ScoreProvenance::HeuristicOnly);
        assert!(score.inference_warning.is_some());
    }
}

#[tokio::test]
async fn test_catalog_loaded_from_dataset() {
    let service = sqlite_service();
    let catalog = service.load_catalog(DATASET).await.unwrap();
    assert_eq!(catalog.row_count("orders"), Some(2000));
    assert_eq!(catalog.row_count("payments"), Some(1000));
    assert!(catalog.table("customers_archive").unwrap().has_column("email"));

    let result = service
        .analyze(
            "SELECT id FROM orders WHERE status = 'paid'",
            &AnalysisOptions::new().with_catalog(catalog),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(result.scores[0].features.table_rows_log10 > 3.0);
}

#[tokio::test]
async fn test_explain_on_a_fresh_snapshot_scans() {
    let plan = sqlite_service()
        .explain("SELECT id FROM orders WHERE status = 'paid';", DATASET)
        .await
        .unwrap();
    assert!(plan.has_sequential_scans());
    assert_eq!(plan.find_nodes_by_type(NodeType::SeqScan).len(), 1);
}

#[tokio::test]
async fn test_explain_rejects_unsupported_statements() {
    let err = sqlite_service()
        .explain("DELETE FROM orders", DATASET)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Parse(_)));
}
