use super::*;
use crate::antipattern::{AntiPatternDetector, DetectorConfig, detect};
use crate::inventory::extract;
use crate::sql::parse;

fn suggestions(sql: &str) -> Vec<RewriteSuggestion> {
    let statement = parse(sql).unwrap();
    let inventory = extract(&statement);
    let findings = detect(&inventory);
    propose(&statement, &inventory, &findings)
}

fn rules_of(suggestions: &[RewriteSuggestion]) -> Vec<&str> {
    suggestions.iter().map(|s| s.rule.as_str()).collect()
}

mod union_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_distinct_sources_become_union_all() {
        let out = suggestions("SELECT a FROM t1 UNION SELECT a FROM t2");
        assert_eq!(rules_of(&out), vec!["RW001"]);

        let suggestion = &out[0];
        assert_eq!(
            suggestion.rewritten_sql,
            "SELECT a FROM t1 UNION ALL SELECT a FROM t2"
        );
        assert_eq!(suggestion.original, "SELECT a FROM t1 UNION SELECT a FROM t2");
        assert_eq!(suggestion.equivalence, EquivalenceClass::AssumptionDependent);
        assert!(suggestion.precondition.contains("t1, t2"));
        assert!(suggestion.precondition.contains("same row twice"));
        assert_eq!(suggestion.finding.as_deref(), Some("AP006"));
    }

    #[test]
    fn test_proven_disjoint_distinct_branches_are_strict() {
        let out = suggestions(
            "SELECT DISTINCT 'a' AS src, id FROM t WHERE x = 1 \
             UNION SELECT DISTINCT 'b', id FROM t WHERE x = 2",
        );
        assert_eq!(rules_of(&out), vec!["RW001"]);
        assert_eq!(out[0].equivalence, EquivalenceClass::Strict);
        assert!(out[0].rewritten_sql.contains(" UNION ALL "));
        assert!(out[0].precondition.contains("SELECT DISTINCT"));
    }

    #[test]
    fn test_proven_disjoint_without_distinct_depends_on_data() {
        let out = suggestions("SELECT 'a', id FROM t UNION SELECT 'b', id FROM t");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].equivalence, EquivalenceClass::AssumptionDependent);
    }

    #[test]
    fn test_computed_projection_over_pinned_column_is_not_rewritten() {
        let out = suggestions(
            "SELECT DISTINCT LENGTH(status) AS n FROM t WHERE status = 'ab' \
             UNION SELECT DISTINCT LENGTH(status) AS n FROM t WHERE status = 'cd'",
        );
        assert!(out.is_empty());

        let out = suggestions(
            "SELECT DISTINCT status FROM t WHERE status = 'ab' \
             UNION SELECT DISTINCT status FROM t WHERE status = 'cd'",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].equivalence, EquivalenceClass::Strict);
    }

    #[test]
    fn test_numerically_equal_literals_are_not_rewritten() {
        let out = suggestions(
            "SELECT DISTINCT a FROM t WHERE a = 1 UNION SELECT DISTINCT a FROM t WHERE a = 1.0",
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_membership_subquery_is_strict() {
        let out =
            suggestions("SELECT id FROM t WHERE id IN (SELECT a FROM x UNION SELECT b FROM y)");
        assert_eq!(rules_of(&out), vec!["RW001"]);
        assert_eq!(out[0].equivalence, EquivalenceClass::Strict);
        assert_eq!(
            out[0].rewritten_sql,
            "SELECT id FROM t WHERE id IN (SELECT a FROM x UNION ALL SELECT b FROM y)"
        );
        assert_eq!(out[0].replacement, "SELECT a FROM x UNION ALL SELECT b FROM y");
    }

    #[test]
    fn test_whole_chain_is_rewritten() {
        let out = suggestions("SELECT a FROM t1 UNION SELECT a FROM t2 UNION SELECT a FROM t3");
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].rewritten_sql,
            "SELECT a FROM t1 UNION ALL SELECT a FROM t2 UNION ALL SELECT a FROM t3"
        );
    }

    #[test]
    fn test_union_all_is_left_alone() {
        assert!(suggestions("SELECT a FROM t1 UNION ALL SELECT a FROM t2").is_empty());
    }

    #[test]
    fn test_no_finding_no_rewrite() {
        let statement = parse("SELECT a FROM t1 UNION SELECT a FROM t2").unwrap();
        let inventory = extract(&statement);
        let findings =
            AntiPatternDetector::with_config(DetectorConfig::new().with_assume_distinct_sources(false))
                .detect(&inventory, None);
        assert!(propose(&statement, &inventory, &findings).is_empty());
    }
}

mod in_subquery_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_in_subquery_becomes_distinct_join() {
        let out = suggestions(
            "SELECT id FROM orders o WHERE o.id IN (SELECT order_id FROM payments WHERE amount > 100)",
        );
        assert_eq!(rules_of(&out), vec!["RW002"]);

        let suggestion = &out[0];
        assert_eq!(
            suggestion.rewritten_sql,
            "SELECT id FROM orders AS o INNER JOIN (SELECT DISTINCT order_id FROM payments WHERE amount > 100) AS sq ON o.id = sq.order_id"
        );
        assert_eq!(suggestion.replacement, suggestion.rewritten_sql);
        assert_eq!(suggestion.equivalence, EquivalenceClass::Strict);
        assert!(suggestion.rationale.contains("DISTINCT"));
        assert_eq!(suggestion.finding, None);
    }

    #[test]
    fn test_other_conjuncts_stay_in_where() {
        let out = suggestions(
            "SELECT o.id FROM orders o WHERE o.status = 'paid' \
             AND o.customer_id IN (SELECT id FROM customers WHERE country = 'NL')",
        );
        assert_eq!(rules_of(&out), vec!["RW002"]);
        assert_eq!(
            out[0].rewritten_sql,
            "SELECT o.id FROM orders AS o INNER JOIN (SELECT DISTINCT id FROM customers WHERE country = 'NL') AS sq ON o.customer_id = sq.id WHERE o.status = 'paid'"
        );
    }

    #[test]
    fn test_colliding_column_is_aliased() {
        let out = suggestions("SELECT id FROM orders WHERE customer_id IN (SELECT id FROM customers)");
        assert_eq!(rules_of(&out), vec!["RW002"]);
        assert_eq!(
            out[0].rewritten_sql,
            "SELECT id FROM orders INNER JOIN (SELECT DISTINCT id AS sq_id FROM customers) AS sq ON customer_id = sq.sq_id"
        );
    }

    #[test]
    fn test_alias_avoids_existing_reference_names() {
        let out =
            suggestions("SELECT sq.id FROM orders sq WHERE sq.id IN (SELECT order_id FROM payments)");
        assert_eq!(out.len(), 1);
        assert!(out[0].rewritten_sql.contains("AS sq2 ON sq.id = sq2.order_id"));
    }

    #[test]
    fn test_unmet_preconditions_drop_the_rewrite() {
        let cases = [
            "SELECT id FROM orders WHERE id NOT IN (SELECT order_id FROM payments)",
            "SELECT id FROM orders o WHERE o.id IN (SELECT p.order_id FROM payments p WHERE p.customer_id = o.customer_id)",
            "SELECT id FROM orders WHERE id IN (SELECT order_id FROM payments LIMIT 10)",
            "SELECT id FROM orders WHERE id IN (SELECT order_id FROM payments ORDER BY order_id)",
            "SELECT id FROM orders WHERE status = 'x' OR id IN (SELECT order_id FROM payments)",
            "SELECT * FROM orders WHERE id IN (SELECT order_id FROM payments)",
            "SELECT id FROM orders WHERE id IN (SELECT order_id + 1 FROM payments)",
            "SELECT id FROM orders WHERE id IN (SELECT order_id, amount FROM payments)",
        ];
        for sql in cases {
            let out = suggestions(sql);
            assert!(
                !rules_of(&out).contains(&"RW002"),
                "unexpected RW002 for {sql}"
            );
        }
    }

    #[test]
    fn test_correlated_exists_is_never_rewritten() {
        let out = suggestions(
            "SELECT c.id FROM customers c WHERE EXISTS (SELECT 1 FROM orders o WHERE o.customer_id = c.id)",
        );
        assert!(out.is_empty());
    }
}

mod engine_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Unmet;

    impl RewriteRule for Unmet {
        fn id(&self) -> &'static str {
            "X900"
        }

        fn name(&self) -> &'static str {
            "never applicable"
        }

        fn propose(
            &self,
            ctx: &RewriteContext<'_>,
        ) -> Vec<Result<RewriteSuggestion, EquivalencePreconditionUnmet>> {
            vec![Err(EquivalencePreconditionUnmet::new(
                self.id(),
                ctx.statement.span,
                "always",
            ))]
        }
    }

    #[test]
    fn test_unmet_rule_is_dropped() {
        let statement = parse("SELECT a FROM t").unwrap();
        let inventory = extract(&statement);
        let engine = RewriteEngine::new().with_rule(Unmet);
        assert_eq!(engine.rules().count(), 3);
        assert!(engine.propose(&statement, &inventory, &[]).is_empty());
    }

    #[test]
    fn test_unmet_display() {
        let unmet = EquivalencePreconditionUnmet::new("RW002", Span::new(3, 9), "the subquery is correlated");
        assert_eq!(
            unmet.to_string(),
            "RW002 not applicable at 3..9: the subquery is correlated"
        );
    }

    #[test]
    fn test_suggestions_in_source_order() {
        let out = suggestions(
            "SELECT id FROM orders WHERE id IN (SELECT order_id FROM payments) \
             UNION SELECT id FROM archive",
        );
        let starts: Vec<usize> = out.iter().map(|s| s.span.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert!(rules_of(&out).contains(&"RW001"));
        assert!(rules_of(&out).contains(&"RW002"));
    }

    #[test]
    fn test_equivalence_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EquivalenceClass::AssumptionDependent).unwrap(),
            "\"assumption_dependent\""
        );
    }
}
