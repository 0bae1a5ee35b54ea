use super::*;
use pretty_assertions::assert_eq;

fn sample_plan() -> PlanTree {
    let root = PlanNode::new(NodeType::NestedLoop, "join")
        .with_cost(0.0, 42.0)
        .with_rows(10)
        .with_child(PlanNode::new(NodeType::SeqScan, "SCAN o").with_relation("orders"))
        .with_child(
            PlanNode::new(NodeType::IndexScan, "SEARCH p USING INDEX idx_p (order_id=?)")
                .with_relation("payments")
                .with_index("idx_p"),
        );
    PlanTree::new(root)
}

#[test]
fn test_totals_come_from_root() {
    let plan = sample_plan();
    assert_eq!(plan.total_cost, Some(42.0));
    assert_eq!(plan.total_rows, Some(10));
}

#[test]
fn test_iter_nodes_is_depth_first_in_child_order() {
    let plan = sample_plan();
    let relations: Vec<_> = plan
        .iter_nodes()
        .map(|n| n.relation.clone().unwrap_or_default())
        .collect();
    assert_eq!(relations, vec!["", "orders", "payments"]);
}

#[test]
fn test_scan_queries() {
    let plan = sample_plan();
    assert!(plan.has_sequential_scans());
    assert_eq!(plan.find_nodes_by_type(NodeType::IndexScan).len(), 1);
    assert_eq!(plan.indexes_used(), vec!["idx_p"]);
    assert_eq!(plan.root.node_count(), 3);
    assert_eq!(plan.root.depth(), 2);
    assert!(plan.root.children[0].is_scan());
    assert!(!plan.root.is_scan());
}

#[test]
fn test_node_type_serializes_snake_case() {
    let json = serde_json::to_string(&NodeType::IndexOnlyScan).unwrap();
    assert_eq!(json, "\"index_only_scan\"");
}
