use super::*;

fn row(id: i64, parent: i64, detail: &str) -> ExplainRow {
    ExplainRow {
        id,
        parent,
        detail: detail.to_string(),
    }
}

mod detail_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_scan() {
        let node = parse_detail("SCAN users");
        assert_eq!(node.node_type, NodeType::SeqScan);
        assert_eq!(node.relation.as_deref(), Some("users"));
        assert_eq!(node.index_name, None);
    }

    #[test]
    fn test_legacy_scan_table_keyword() {
        let node = parse_detail("SCAN TABLE orders");
        assert_eq!(node.node_type, NodeType::SeqScan);
        assert_eq!(node.relation.as_deref(), Some("orders"));
    }

    #[test]
    fn test_covering_index_scan() {
        let node = parse_detail("SCAN orders USING COVERING INDEX idx_orders_status");
        assert_eq!(node.node_type, NodeType::IndexOnlyScan);
        assert_eq!(node.index_name.as_deref(), Some("idx_orders_status"));
        assert_eq!(node.relation.as_deref(), Some("orders"));
    }

    #[test]
    fn test_index_search_with_condition() {
        let node = parse_detail("SEARCH orders USING INDEX idx_orders_user_id (user_id=?)");
        assert_eq!(node.node_type, NodeType::IndexScan);
        assert_eq!(node.relation.as_deref(), Some("orders"));
        assert_eq!(node.index_name.as_deref(), Some("idx_orders_user_id"));
        assert_eq!(node.index_cond.as_deref(), Some("user_id=?"));
    }

    #[test]
    fn test_rowid_search() {
        let node = parse_detail("SEARCH c USING INTEGER PRIMARY KEY (rowid=?)");
        assert_eq!(node.node_type, NodeType::IndexScan);
        assert_eq!(node.index_name.as_deref(), Some("PRIMARY KEY"));
        assert_eq!(node.index_cond.as_deref(), Some("rowid=?"));
    }

    #[test]
    fn test_automatic_index() {
        let node = parse_detail("SEARCH p USING AUTOMATIC COVERING INDEX (order_id=?)");
        assert_eq!(node.node_type, NodeType::IndexOnlyScan);
        assert_eq!(node.index_name.as_deref(), Some("AUTO-INDEX"));
    }

    #[test]
    fn test_temp_btrees() {
        assert_eq!(
            parse_detail("USE TEMP B-TREE FOR ORDER BY").node_type,
            NodeType::Sort
        );
        assert_eq!(
            parse_detail("USE TEMP B-TREE FOR DISTINCT").node_type,
            NodeType::Unique
        );
        assert_eq!(
            parse_detail("USE TEMP B-TREE FOR GROUP BY").node_type,
            NodeType::Aggregate
        );
    }

    #[test]
    fn test_compound_and_subqueries() {
        assert_eq!(parse_detail("COMPOUND QUERY").node_type, NodeType::SetOp);
        assert_eq!(
            parse_detail("UNION USING TEMP B-TREE").node_type,
            NodeType::SetOp
        );
        assert_eq!(parse_detail("UNION ALL").node_type, NodeType::Append);
        assert_eq!(
            parse_detail("LEFT-MOST SUBQUERY").node_type,
            NodeType::SubqueryScan
        );
        assert_eq!(
            parse_detail("CORRELATED SCALAR SUBQUERY 1").node_type,
            NodeType::SubPlan
        );
        assert_eq!(parse_detail("LIST SUBQUERY 2").node_type, NodeType::SubPlan);
        assert_eq!(parse_detail("SCAN CONSTANT ROW").node_type, NodeType::ValuesScan);
    }

    #[test]
    fn test_unknown_detail_is_kept() {
        let node = parse_detail("BLOOM FILTER ON p (order_id=?)");
        assert_eq!(node.node_type, NodeType::Unknown);
        assert_eq!(node.detail, "BLOOM FILTER ON p (order_id=?)");
    }
}

mod tree_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_top_level_row_is_root() {
        let tree = build_plan_tree(&[row(2, 0, "SCAN users")]);
        assert_eq!(tree.root.node_type, NodeType::SeqScan);
        assert!(tree.root.children.is_empty());
        assert_eq!(tree.total_cost, None);
    }

    #[test]
    fn test_siblings_keep_order_under_synthetic_root() {
        let tree = build_plan_tree(&[
            row(3, 0, "SCAN o"),
            row(5, 0, "SEARCH c USING INTEGER PRIMARY KEY (rowid=?)"),
            row(9, 0, "USE TEMP B-TREE FOR ORDER BY"),
        ]);
        assert_eq!(tree.root.node_type, NodeType::Result);
        let kinds: Vec<NodeType> = tree.root.children.iter().map(|n| n.node_type).collect();
        assert_eq!(
            kinds,
            vec![NodeType::SeqScan, NodeType::IndexScan, NodeType::Sort]
        );
        assert!(tree.has_sequential_scans());
        assert_eq!(tree.indexes_used(), vec!["PRIMARY KEY"]);
    }

    #[test]
    fn test_nested_rows() {
        let tree = build_plan_tree(&[
            row(1, 0, "COMPOUND QUERY"),
            row(2, 1, "LEFT-MOST SUBQUERY"),
            row(4, 2, "SCAN customers_2024"),
            row(7, 1, "UNION USING TEMP B-TREE"),
            row(9, 7, "SCAN customers_archive"),
        ]);
        assert_eq!(tree.root.node_type, NodeType::SetOp);
        assert_eq!(tree.root.children.len(), 2);
        assert_eq!(
            tree.root.children[0].children[0].relation.as_deref(),
            Some("customers_2024")
        );
        assert_eq!(
            tree.root.children[1].children[0].relation.as_deref(),
            Some("customers_archive")
        );
        assert_eq!(tree.root.node_count(), 5);
    }

    #[test]
    fn test_empty_plan() {
        let tree = build_plan_tree(&[]);
        assert_eq!(tree.root.node_type, NodeType::Result);
        assert!(tree.root.children.is_empty());
    }
}
