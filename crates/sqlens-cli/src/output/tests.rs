use super::*;
use sqlens_analyzer::QueryAnalyzer;
use sqlens_core::NodeType;
use sqlens_services::SqlDialect;

fn result(sql: &str) -> AnalysisResult {
    let analyzer = QueryAnalyzer::new();
    let analysis = analyzer.analyze_static(sql, None).unwrap();
    let scores = analyzer.heuristic_scores(&analysis, None);
    AnalysisResult {
        analysis,
        dialect: SqlDialect::Generic,
        scores,
        benchmarks: None,
    }
}

mod analysis_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_lists_findings_and_candidates() {
        let report = analysis_report(&result("SELECT * FROM orders WHERE UPPER(status) = 'PAID'"));
        assert!(report.starts_with("Query has 2 warning(s)"));
        assert!(report.contains("Findings"));
        assert!(report.contains("AP001"));
        assert!(report.contains("AP002"));
        assert!(report.contains("Index candidates"));
        assert!(report.contains("heuristic_only"));
        assert!(!report.contains("Benchmarks"));
    }

    #[test]
    fn test_report_lists_rewrites() {
        let report = analysis_report(&result("SELECT a FROM t1 UNION SELECT a FROM t2"));
        assert!(report.contains("Rewrite suggestions"));
        assert!(report.contains("assumption_dependent"));
    }

    #[test]
    fn test_clean_query_has_only_the_summary() {
        let report = analysis_report(&result("SELECT id FROM users"));
        assert_eq!(
            report,
            "No anti-patterns detected.\nNormalized: SELECT id FROM users\n"
        );
    }

    #[test]
    fn test_json_shape() {
        let json = to_json(&result("SELECT a FROM t WHERE a = 1")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dialect"], "generic");
        assert_eq!(value["scores"][0]["provenance"], "heuristic_only");
        assert_eq!(value["index_candidates"][0]["ddl"], "CREATE INDEX idx_t_a ON t (a);");
    }
}

mod plan_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_report() {
        let plan = PlanTree::new(
            PlanNode::new(NodeType::Result, "QUERY PLAN")
                .with_child(PlanNode::new(NodeType::SeqScan, "SCAN orders").with_relation("orders"))
                .with_child(
                    PlanNode::new(
                        NodeType::IndexScan,
                        "SEARCH payments USING INDEX idx_payments_order_id (order_id=?)",
                    )
                    .with_relation("payments")
                    .with_index("idx_payments_order_id"),
                ),
        );
        let report = plan_report(&plan);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Result  -- QUERY PLAN");
        assert_eq!(lines[1], "  SeqScan on orders  -- SCAN orders");
        assert!(lines[2].starts_with("  IndexScan on payments using idx_payments_order_id"));
        assert_eq!(lines.last(), Some(&"Indexes used: idx_payments_order_id"));
    }
}

mod rules_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog_has_both_registries() {
        let rules = rule_catalog();
        assert!(rules.iter().any(|r| r.id == "AP001" && r.kind == "anti_pattern"));
        assert!(rules.iter().any(|r| r.id == "RW002" && r.kind == "rewrite"));

        let ids: Vec<&str> = rules.iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_rules_report() {
        let report = rules_report(&rule_catalog());
        assert!(report.contains("AP006"));
        assert!(report.contains("UNION over disjoint branches"));
    }
}
