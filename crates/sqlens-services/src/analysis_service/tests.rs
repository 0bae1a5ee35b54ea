use super::*;
use sqlens_analyzer::{Confidence, IndexKind, ScoreProvenance, VerificationStatus};
use sqlens_bench::{BenchmarkResult, VariantLabel};

fn candidate(schema: Option<&str>) -> IndexCandidate {
    IndexCandidate {
        table: "orders".into(),
        schema: schema.map(str::to_string),
        columns: vec!["status".into(), "created_at".into()],
        kind: IndexKind::Composite,
        confidence: Confidence::High,
        provenance: Vec::new(),
        score: 4.5,
        ddl: match schema {
            Some(s) => format!("CREATE INDEX idx_orders_status_created_at ON {s}.orders (status, created_at);"),
            None => "CREATE INDEX idx_orders_status_created_at ON orders (status, created_at);".into(),
        },
        reason: String::new(),
    }
}

fn result(label: VariantLabel, valid: bool, reason: Option<&str>) -> BenchmarkResult {
    BenchmarkResult {
        label,
        sql: "SELECT 1".into(),
        timings: None,
        row_count: Some(1),
        row_hash: None,
        valid,
        invalid_reason: reason.map(str::to_string),
        improvement_percent: None,
    }
}

fn benchmark(
    recommendation: RecommendationRef,
    results: Vec<BenchmarkResult>,
    error: Option<&str>,
) -> RecommendationBenchmark {
    RecommendationBenchmark {
        recommendation,
        variant: BenchmarkVariant::new("SELECT 1"),
        results,
        error: error.map(str::to_string),
    }
}

fn analysis(sql: &str) -> StaticAnalysis {
    QueryAnalyzer::new().analyze_static(sql, None).unwrap()
}

mod dialect_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_dialect() {
        assert_eq!("SQLite".parse::<SqlDialect>().unwrap(), SqlDialect::Sqlite);
        assert_eq!("ansi".parse::<SqlDialect>().unwrap(), SqlDialect::Generic);
        let err = "oracle".parse::<SqlDialect>().unwrap_err();
        assert!(err.to_string().contains("unknown dialect 'oracle'"));
    }

    #[test]
    fn test_generic_ddl_keeps_schema() {
        assert_eq!(
            SqlDialect::Generic.index_ddl(&candidate(Some("public"))),
            "CREATE INDEX idx_orders_status_created_at ON public.orders (status, created_at)"
        );
    }

    #[test]
    fn test_sqlite_ddl_is_unqualified() {
        assert_eq!(
            SqlDialect::Sqlite.index_ddl(&candidate(Some("public"))),
            "CREATE INDEX idx_orders_status_created_at ON orders (status, created_at)"
        );
    }
}

mod options_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = AnalysisOptions::default();
        assert_eq!(options.dialect, SqlDialect::Generic);
        assert_eq!(options.max_composite_width, 3);
        assert!(!options.run_benchmark);
        assert_eq!(options.dataset, DEFAULT_DATASET);
        assert!(options.catalog.is_none());
    }

    #[test]
    fn test_builders() {
        let options = AnalysisOptions::new()
            .with_dialect(SqlDialect::Sqlite)
            .with_max_composite_width(0)
            .with_benchmark("synthetic:500");
        assert_eq!(options.max_composite_width, 1);
        assert!(options.run_benchmark);
        assert_eq!(options.dataset, "synthetic:500");
    }

    #[test]
    fn test_partial_json() {
        let options: AnalysisOptions = serde_json::from_value(serde_json::json!({
            "dialect": "sqlite",
            "run_benchmark": true,
        }))
        .unwrap();
        assert_eq!(options.dialect, SqlDialect::Sqlite);
        assert!(options.run_benchmark);
        assert_eq!(options.dataset, "synthetic");
    }
}

mod cancellation_tests {
    use super::*;

    #[test]
    fn test_request_cancellation_reaches_benchmarks() {
        let cancel = AnalysisCancellation::new();
        cancel.request.cancel();
        assert!(cancel.benchmarks.is_cancelled());
    }

    #[test]
    fn test_benchmark_cancellation_stays_local() {
        let cancel = AnalysisCancellation::new();
        cancel.benchmarks.cancel();
        assert!(!cancel.request.is_cancelled());
    }
}

mod catalog_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog_from_stats() {
        let catalog = catalog_from_stats(&[TableStats {
            name: "Orders".into(),
            columns: vec![
                ("id".into(), "INTEGER".into()),
                ("total".into(), "REAL".into()),
                ("user_id".into(), "".into()),
                ("payload".into(), "BLOB".into()),
            ],
            row_count: 42,
        }]);

        assert_eq!(catalog.row_count("orders"), Some(42));
        assert_eq!(catalog.column_type("orders", "id"), Some(SemanticType::Integer));
        assert_eq!(catalog.column_type("orders", "total"), Some(SemanticType::Numeric));
        assert_eq!(catalog.column_type("orders", "user_id"), Some(SemanticType::Integer));
        assert_eq!(catalog.column_type("orders", "payload"), Some(SemanticType::Text));
    }
}

mod verification_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_variants_cover_every_recommendation() {
        let analysis = analysis("SELECT a FROM t1 WHERE a = 1 UNION SELECT a FROM t2;");
        let variants = benchmark_variants(&analysis, SqlDialect::Sqlite);
        assert_eq!(
            variants.len(),
            analysis.index_candidates.len() + analysis.rewrite_suggestions.len()
        );

        let (reference, index) = &variants[0];
        assert_eq!(*reference, RecommendationRef::IndexCandidate(0));
        assert_eq!(index.sql, "SELECT a FROM t1 WHERE a = 1 UNION SELECT a FROM t2");
        assert_eq!(index.setup, vec!["CREATE INDEX idx_t1_a ON t1 (a)".to_string()]);
        assert_eq!(index.teardown, vec!["DROP INDEX idx_t1_a".to_string()]);

        let (reference, rewrite) = variants.last().unwrap();
        assert!(matches!(reference, RecommendationRef::RewriteSuggestion(_)));
        assert!(rewrite.sql.contains("UNION ALL"));
        assert!(rewrite.setup.is_empty());
    }

    #[test]
    fn test_failure_reason() {
        let index = RecommendationRef::IndexCandidate(0);
        let valid = benchmark(
            index,
            vec![
                result(VariantLabel::Baseline, true, None),
                result(VariantLabel::Optimized, true, None),
            ],
            None,
        );
        assert!(valid.is_valid());
        assert_eq!(valid.failure_reason(), None);

        let baseline_broken = benchmark(
            index,
            vec![
                result(VariantLabel::Baseline, false, Some("run exceeded 1s")),
                result(VariantLabel::Optimized, true, None),
            ],
            None,
        );
        assert_eq!(
            baseline_broken.failure_reason().as_deref(),
            Some("baseline: run exceeded 1s")
        );

        let never_ran = benchmark(index, Vec::new(), Some("benchmark cancelled"));
        assert!(!never_ran.is_valid());
        assert_eq!(never_ran.failure_reason().as_deref(), Some("benchmark cancelled"));
    }

    #[test]
    fn test_invalid_benchmark_never_upgrades_provenance() {
        let analysis = analysis("SELECT a FROM t1 WHERE a = 1 UNION SELECT a FROM t2");
        let mut scores = QueryAnalyzer::new().heuristic_scores(&analysis, None);
        let rewrite = RecommendationRef::RewriteSuggestion(0);
        let index = RecommendationRef::IndexCandidate(0);

        let benchmarks = vec![
            benchmark(
                index,
                vec![
                    result(VariantLabel::Baseline, true, None),
                    result(VariantLabel::Optimized, true, None),
                ],
                None,
            ),
            benchmark(
                rewrite,
                vec![
                    result(VariantLabel::Baseline, true, None),
                    result(
                        VariantLabel::Optimized,
                        false,
                        Some("row count differs from baseline (4 vs 3)"),
                    ),
                ],
                None,
            ),
        ];
        apply_verification(&mut scores, &benchmarks);

        for score in &scores {
            match score.recommendation {
                r if r == index => {
                    assert!(score.is_verified());
                    assert_eq!(score.verification, VerificationStatus::Verified);
                }
                r if r == rewrite => {
                    assert_eq!(score.provenance, ScoreProvenance::HeuristicOnly);
                    assert_eq!(
                        score.verification,
                        VerificationStatus::Unverified {
                            reason: "row count differs from baseline (4 vs 3)".into()
                        }
                    );
                }
                _ => assert_eq!(
                    score.verification,
                    VerificationStatus::Unverified {
                        reason: "no benchmark was run".into()
                    }
                ),
            }
        }
    }
}
