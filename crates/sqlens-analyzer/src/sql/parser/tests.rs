use super::*;
use crate::sql::{ParseErrorKind, render};
use indoc::indoc;

fn unsupported(sql: &str) -> String {
    match parse(sql) {
        Err(ParseError::Unsupported { construct, .. }) => construct,
        other => panic!("expected unsupported construct for {sql:?}, got {other:?}"),
    }
}

fn syntax(sql: &str) -> (usize, usize, String) {
    match parse(sql) {
        Err(ParseError::Syntax {
            line,
            column,
            message,
            ..
        }) => (line, column, message),
        other => panic!("expected syntax error for {sql:?}, got {other:?}"),
    }
}

mod select_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_select() {
        let statement = parse("SELECT id, name AS n FROM users u WHERE id = 1").unwrap();
        let select = statement.selects()[0];
        assert_eq!(select.scope, ScopeId(0));
        assert_eq!(select.parent, None);
        assert_eq!(select.projection.len(), 2);
        assert_eq!(
            select.projection[1].output_name().as_deref(),
            Some("n")
        );
        match &select.from[0].relation {
            TableFactor::Table { name, alias, .. } => {
                assert_eq!(name.table().value, "users");
                assert_eq!(alias.as_ref().unwrap().value, "u");
            }
            other => panic!("unexpected relation {other:?}"),
        }
        assert!(select.selection.is_some());
    }

    #[test]
    fn test_wildcards() {
        let statement = parse("SELECT *, u.* FROM users u").unwrap();
        let select = statement.selects()[0];
        assert!(matches!(select.projection[0], SelectItem::Wildcard { .. }));
        match &select.projection[1] {
            SelectItem::QualifiedWildcard { qualifier, .. } => {
                assert_eq!(qualifier.table().value, "u")
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_joins() {
        let statement = parse(indoc! {"
            SELECT o.id
            FROM orders o
            INNER JOIN users u ON o.user_id = u.id
            LEFT OUTER JOIN payments p USING (order_id)
            CROSS JOIN products
        "})
        .unwrap();
        let joins = &statement.selects()[0].from[0].joins;
        let kinds: Vec<_> = joins.iter().map(|j| j.kind).collect();
        assert_eq!(kinds, vec![JoinKind::Inner, JoinKind::Left, JoinKind::Cross]);
        assert!(matches!(joins[0].constraint, JoinConstraint::On(_)));
        assert!(matches!(joins[1].constraint, JoinConstraint::Using(ref c) if c.len() == 1));
        assert!(matches!(joins[2].constraint, JoinConstraint::None));
    }

    #[test]
    fn test_group_by_having_order_limit() {
        let statement = parse(
            "SELECT user_id, COUNT(*) FROM orders GROUP BY user_id HAVING COUNT(*) > 5 \
             ORDER BY user_id DESC LIMIT 10 OFFSET 20;",
        )
        .unwrap();
        let select = statement.selects()[0];
        assert_eq!(select.group_by.len(), 1);
        assert!(select.having.is_some());
        assert_eq!(statement.order_by[0].asc, Some(false));
        assert_eq!(
            statement.limit.as_ref().and_then(|e| e.as_literal()),
            Some(&Literal::Number("10".into()))
        );
        assert_eq!(
            statement.offset.as_ref().and_then(|e| e.as_literal()),
            Some(&Literal::Number("20".into()))
        );
    }

    #[test]
    fn test_select_without_from() {
        let statement = parse("SELECT 1 + 2").unwrap();
        assert!(statement.selects()[0].from.is_empty());
    }
}

mod expression_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn selection(sql: &str) -> Expr {
        parse(sql).unwrap().selects()[0].selection.clone().unwrap()
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = selection("SELECT 1 FROM t WHERE a = 1 OR b = 2 AND c = 3");
        match expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Or,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::And,
                    ..
                }
            )),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_predicate_forms() {
        let expr = selection(
            "SELECT 1 FROM t WHERE a IS NOT NULL AND b NOT IN (1, 2) AND c BETWEEN 1 AND 5 \
             AND d NOT LIKE 'x%' AND NOT EXISTS (SELECT 1 FROM u)",
        );
        let mut kinds = Vec::new();
        let mut stack = vec![&expr];
        while let Some(e) = stack.pop() {
            match &e.kind {
                ExprKind::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                } => {
                    stack.push(right);
                    stack.push(left);
                }
                ExprKind::IsNull { negated, .. } => kinds.push(("is_null", *negated)),
                ExprKind::InList { negated, .. } => kinds.push(("in_list", *negated)),
                ExprKind::Between { negated, .. } => kinds.push(("between", *negated)),
                ExprKind::Like { negated, .. } => kinds.push(("like", *negated)),
                ExprKind::Exists { negated, .. } => kinds.push(("exists", *negated)),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            kinds,
            vec![
                ("is_null", true),
                ("in_list", true),
                ("between", false),
                ("like", true),
                ("exists", true),
            ]
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expr = selection("SELECT 1 FROM t WHERE a + b * 2 = 10");
        let ExprKind::Binary { left, op, .. } = expr.kind else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::Eq);
        let ExprKind::Binary { right, op, .. } = left.kind else {
            panic!("expected addition");
        };
        assert_eq!(op, BinaryOp::Plus);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_functions_case_and_casts() {
        let statement = parse(
            "SELECT COUNT(DISTINCT a), CASE WHEN b > 1 THEN 'x' ELSE 'y' END, \
             CAST(c AS VARCHAR(10)), d::int, DATE '2024-01-01' FROM t",
        )
        .unwrap();
        let items: Vec<&Expr> = statement.selects()[0]
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expr { expr, .. } => Some(expr),
                _ => None,
            })
            .collect();
        assert!(matches!(
            items[0].kind,
            ExprKind::Function { distinct: true, .. }
        ));
        assert!(matches!(items[1].kind, ExprKind::Case { .. }));
        match &items[2].kind {
            ExprKind::Cast {
                data_type,
                shorthand,
                ..
            } => {
                assert_eq!(data_type, "VARCHAR(10)");
                assert!(!shorthand);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            items[3].kind,
            ExprKind::Cast {
                shorthand: true,
                ..
            }
        ));
        assert!(matches!(items[4].kind, ExprKind::TypedString { .. }));
    }

    #[test]
    fn test_placeholders() {
        let expr = selection("SELECT 1 FROM t WHERE a = ? AND b = $2 AND c = :name");
        assert_eq!(expr.columns().len(), 3);
    }
}

mod scope_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scopes_are_numbered_in_pre_order() {
        let statement = parse(indoc! {"
            SELECT a FROM t
            WHERE a IN (SELECT b FROM u WHERE EXISTS (SELECT 1 FROM v WHERE v.c = u.b))
            UNION
            SELECT x FROM (SELECT x FROM w) d
        "})
        .unwrap();
        let mut seen = Vec::new();
        visit_statement(&statement, &mut |select| {
            seen.push((select.scope, select.parent))
        });
        assert_eq!(
            seen,
            vec![
                (ScopeId(0), None),
                (ScopeId(1), Some(ScopeId(0))),
                (ScopeId(2), Some(ScopeId(1))),
                (ScopeId(3), None),
                (ScopeId(4), Some(ScopeId(3))),
            ]
        );
    }

    #[test]
    fn test_order_by_subquery_belongs_to_primary_scope() {
        let statement =
            parse("SELECT a FROM t ORDER BY (SELECT MAX(b) FROM u WHERE u.a = t.a)").unwrap();
        let inner = statement.find_select(ScopeId(1)).unwrap();
        assert_eq!(inner.parent, Some(ScopeId(0)));
    }

    #[test]
    fn test_set_operation_grouping() {
        let statement = parse("SELECT a FROM t UNION SELECT a FROM u INTERSECT SELECT a FROM v")
            .unwrap();
        match &statement.body {
            SetExpr::SetOperation { op, right, .. } => {
                assert_eq!(*op, SetOperator::Union);
                assert_eq!(right.kind(), StatementKind::Intersect);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

mod error_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unsupported_statements() {
        assert_eq!(unsupported("INSERT INTO t VALUES (1)"), "INSERT statement");
        assert_eq!(unsupported("delete from t"), "DELETE statement");
        assert_eq!(
            unsupported("WITH x AS (SELECT 1) SELECT * FROM x"),
            "common table expression (WITH)"
        );
    }

    #[test]
    fn test_unsupported_select_constructs() {
        assert_eq!(
            unsupported("SELECT ROW_NUMBER() OVER (ORDER BY a) FROM t"),
            "window function (OVER)"
        );
        assert_eq!(unsupported("SELECT a FROM t NATURAL JOIN u"), "NATURAL JOIN");
        assert_eq!(unsupported("SELECT 1; SELECT 2"), "multiple statements");
        assert_eq!(
            unsupported("SELECT a FROM t WHERE (a, b) IN (SELECT a, b FROM u)"),
            "row value constructor"
        );
        assert_eq!(unsupported("SELECT DISTINCT ON (a) a FROM t"), "DISTINCT ON");
    }

    #[test]
    fn test_unsupported_error_points_at_construct() {
        let err = parse("SELECT a\nFROM t NATURAL JOIN u").unwrap_err();
        match err {
            ParseError::Unsupported { line, column, .. } => assert_eq!((line, column), (2, 8)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_at_end_of_input() {
        let (line, column, message) = syntax("SELECT a FROM t WHERE");
        assert_eq!((line, column), (1, 22));
        assert!(message.contains("EOF"), "{message}");
    }

    #[test]
    fn test_syntax_error_points_at_offending_token() {
        let (line, column, message) = syntax("SELECT a\nFROM t )");
        assert_eq!((line, column), (2, 8));
        assert!(message.contains(')'), "{message}");
    }

    #[test]
    fn test_missing_closing_paren() {
        let (line, _, message) = syntax("SELECT a FROM t WHERE a IN (1, 2");
        assert_eq!(line, 1);
        assert!(message.contains("EOF"), "{message}");
    }

    #[test]
    fn test_empty_input() {
        let (_, _, message) = syntax("   ");
        assert!(message.contains("SELECT"));
    }

    #[test]
    fn test_syntax_error_display() {
        let error = parse("SELECT a FROM t )").unwrap_err();
        assert!(error.to_string().starts_with("syntax error at line 1, column 17"), "{error}");
        assert_eq!(error.kind(), ParseErrorKind::Syntax);
        assert_eq!(error.position(), 16);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let sql = format!("SELECT {}1{}", "(".repeat(400), ")".repeat(400));
        assert!(unsupported(&sql).starts_with("nesting deeper than"));
    }
}

mod reparse_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const QUERIES: &[&str] = &[
        "select id from users where email = 'a@b.com'",
        "SELECT * FROM orders o JOIN users u ON o.user_id = u.id WHERE u.active = true ORDER BY o.created_at DESC LIMIT 10",
        "SELECT a FROM t WHERE (a = 1 OR b = 2) AND c = 3",
        "SELECT a - (b - c), a / (b * c), -(-a) FROM t",
        "SELECT x FROM t UNION (SELECT x FROM u UNION ALL SELECT x FROM v)",
        "SELECT id FROM users WHERE id IN (SELECT user_id FROM orders WHERE total > 100)",
        "SELECT \"Weird \"\"Name\"\"\" FROM `dbo`.`table` WHERE name LIKE 'it''s%' ESCAPE '!'",
        "SELECT COUNT(*) AS n, CASE WHEN a IS NULL THEN 0 ELSE a END FROM t GROUP BY a HAVING COUNT(*) > 1",
        "SELECT a::text, CAST(b AS INTEGER) FROM t WHERE NOT (a = 1 AND b BETWEEN 2 AND 3)",
        "SELECT a FROM t ORDER BY a DESC LIMIT 5 OFFSET 10",
    ];

    #[test]
    fn test_render_is_stable_under_reparse() {
        for sql in QUERIES {
            let first = render(&parse(sql).unwrap());
            let second = render(&parse(&first).unwrap_or_else(|e| panic!("{first}: {e}")));
            assert_eq!(first, second, "{sql}");
        }
    }
}

mod span_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text<'a>(sql: &'a str, span: Span) -> &'a str {
        span.slice(sql).unwrap()
    }

    #[test]
    fn test_spans_cover_source_text() {
        let sql = "SELECT o.id, COUNT(*) AS n FROM orders o WHERE o.status = 'paid' GROUP BY o.id";
        let statement = parse(sql).unwrap();
        let select = statement.selects()[0];
        assert_eq!(text(sql, statement.span), sql);
        assert_eq!(text(sql, select.span), sql);
        assert_eq!(text(sql, select.projection[0].span()), "o.id");
        assert_eq!(text(sql, select.projection[1].span()), "COUNT(*) AS n");
        assert_eq!(text(sql, select.from[0].relation.span()), "orders o");
        assert_eq!(
            text(sql, select.selection.as_ref().unwrap().span),
            "o.status = 'paid'"
        );
    }

    #[test]
    fn test_parentheses_and_subqueries_are_inside_their_spans() {
        let sql = "SELECT a FROM t WHERE (a = 1 OR b = 2) AND c IN (SELECT c FROM u)";
        let statement = parse(sql).unwrap();
        let selection = statement.selects()[0].selection.clone().unwrap();
        let ExprKind::Binary { left, right, .. } = &selection.kind else {
            panic!("expected conjunction");
        };
        assert_eq!(text(sql, left.span), "(a = 1 OR b = 2)");
        assert_eq!(text(sql, right.span), "c IN (SELECT c FROM u)");
        let ExprKind::InSubquery { subquery, .. } = &right.kind else {
            panic!("expected IN subquery");
        };
        assert_eq!(text(sql, subquery.span), "SELECT c FROM u");
    }

    #[test]
    fn test_set_operation_spans_are_distinct_and_nested() {
        let sql = "SELECT a FROM t UNION SELECT a FROM u UNION SELECT a FROM v";
        let statement = parse(sql).unwrap();
        let SetExpr::SetOperation { left, right, span, .. } = &statement.body else {
            panic!("expected set operation");
        };
        assert_eq!(text(sql, *span), sql);
        assert_eq!(text(sql, left.span()), "SELECT a FROM t UNION SELECT a FROM u");
        assert_eq!(text(sql, right.span()), "SELECT a FROM v");
        assert!(span.contains(left.span()));
        assert_ne!(*span, left.span());
    }

    #[test]
    fn test_spans_are_byte_offsets_with_multibyte_text() {
        let sql = "SELECT 'é', b FROM t WHERE b = 'ü'";
        let statement = parse(sql).unwrap();
        let selection = statement.selects()[0].selection.clone().unwrap();
        assert_eq!(text(sql, selection.span), "b = 'ü'");
    }

    #[test]
    fn test_shorthand_cast_does_not_swallow_enclosing_parenthesis() {
        let sql = "SELECT (a::varchar(10)) FROM t";
        let statement = parse(sql).unwrap();
        let SelectItem::Expr { expr, .. } = &statement.selects()[0].projection[0] else {
            panic!("expected expression item");
        };
        assert_eq!(text(sql, expr.span), "(a::varchar(10))");
        let ExprKind::Nested(inner) = &expr.kind else {
            panic!("expected parentheses");
        };
        assert_eq!(text(sql, inner.span), "a::varchar(10)");
    }

    #[test]
    fn test_order_by_items_follow_the_body() {
        let sql = "SELECT a, b FROM t ORDER BY a DESC, b";
        let statement = parse(sql).unwrap();
        let spans: Vec<&str> = statement
            .order_by
            .iter()
            .map(|item| text(sql, item.span))
            .collect();
        assert_eq!(spans, vec!["a DESC", "b"]);
    }
}
