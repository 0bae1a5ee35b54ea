//! EXPLAIN QUERY PLAN → [`PlanTree`]
//!
//! SQLite reports its plan as flat `(id, parent, notused, detail)` rows:
//!
//! ```text
//! QUERY PLAN
//! |--SCAN o
//! |--SEARCH c USING INTEGER PRIMARY KEY (rowid=?)
//! `--USE TEMP B-TREE FOR ORDER BY
//! ```
//!
//! Rows with `parent = 0` are top level. The detail text is mapped onto the
//! database-independent node kinds of `sqlens_core::plan`. SQLite gives no
//! cost or row estimates, so those stay empty.

use sqlens_core::{NodeType, PlanNode, PlanTree};
use std::collections::HashMap;

/// One row of `EXPLAIN QUERY PLAN` output
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainRow {
    pub id: i64,
    pub parent: i64,
    pub detail: String,
}

/// Assemble plan rows into a tree, keeping SQLite's row order among siblings
pub fn build_plan_tree(rows: &[ExplainRow]) -> PlanTree {
    let mut children: HashMap<i64, Vec<&ExplainRow>> = HashMap::new();
    for row in rows {
        children.entry(row.parent).or_default().push(row);
    }

    fn build(row: &ExplainRow, children: &HashMap<i64, Vec<&ExplainRow>>) -> PlanNode {
        let mut node = parse_detail(&row.detail);
        if let Some(kids) = children.get(&row.id) {
            node.children = kids.iter().map(|kid| build(kid, children)).collect();
        }
        node
    }

    let mut top: Vec<PlanNode> = children
        .get(&0)
        .map(|rows| rows.iter().map(|row| build(row, &children)).collect())
        .unwrap_or_default();

    let root = if top.len() == 1 {
        top.remove(0)
    } else {
        let mut root = PlanNode::new(NodeType::Result, "QUERY PLAN");
        root.children = top;
        root
    };
    PlanTree::new(root)
}

/// Map one detail line onto a plan node
pub fn parse_detail(detail: &str) -> PlanNode {
    let detail = detail.trim();

    if let Some(rest) = detail.strip_prefix("SCAN ") {
        parse_scan(detail, rest)
    } else if let Some(rest) = detail.strip_prefix("SEARCH ") {
        parse_search(detail, rest)
    } else if detail.starts_with("USE TEMP B-TREE FOR") {
        let node_type = if detail.ends_with("DISTINCT") {
            NodeType::Unique
        } else if detail.contains("GROUP BY") {
            NodeType::Aggregate
        } else {
            NodeType::Sort
        };
        PlanNode::new(node_type, detail)
    } else if detail.starts_with("COMPOUND QUERY") {
        PlanNode::new(NodeType::SetOp, detail)
    } else if detail.starts_with("UNION ALL") {
        PlanNode::new(NodeType::Append, detail)
    } else if detail.starts_with("UNION USING")
        || detail.starts_with("EXCEPT USING")
        || detail.starts_with("INTERSECT USING")
    {
        PlanNode::new(NodeType::SetOp, detail)
    } else if detail.starts_with("LEFT-MOST SUBQUERY") || detail.starts_with("CO-ROUTINE") {
        PlanNode::new(NodeType::SubqueryScan, detail)
    } else if detail.contains("SUBQUERY") {
        // CORRELATED SCALAR SUBQUERY n, LIST SUBQUERY n, ...
        PlanNode::new(NodeType::SubPlan, detail)
    } else if detail.starts_with("MATERIALIZE") {
        PlanNode::new(NodeType::Materialize, detail)
    } else {
        PlanNode::new(NodeType::Unknown, detail)
    }
}

fn parse_scan(detail: &str, rest: &str) -> PlanNode {
    if rest.starts_with("CONSTANT ROW") {
        return PlanNode::new(NodeType::ValuesScan, detail);
    }

    let mut node = if let Some(index) = index_after(rest, " USING COVERING INDEX ") {
        PlanNode::new(NodeType::IndexOnlyScan, detail).with_index(index)
    } else if let Some(index) = index_after(rest, " USING INDEX ") {
        PlanNode::new(NodeType::IndexScan, detail).with_index(index)
    } else {
        PlanNode::new(NodeType::SeqScan, detail)
    };

    if let Some(relation) = relation_name(rest) {
        if relation.starts_with('(') || relation.contains("subquery") {
            node.node_type = NodeType::SubqueryScan;
        } else {
            node.relation = Some(relation);
        }
    }
    node
}

fn parse_search(detail: &str, rest: &str) -> PlanNode {
    let mut node = if rest.contains(" USING AUTOMATIC") {
        PlanNode::new(NodeType::IndexOnlyScan, detail).with_index("AUTO-INDEX")
    } else if let Some(index) = index_after(rest, " USING COVERING INDEX ") {
        PlanNode::new(NodeType::IndexOnlyScan, detail).with_index(index)
    } else if let Some(index) = index_after(rest, " USING INDEX ") {
        PlanNode::new(NodeType::IndexScan, detail).with_index(index)
    } else if rest.contains("INTEGER PRIMARY KEY") || rest.contains("(rowid") {
        PlanNode::new(NodeType::IndexScan, detail).with_index("PRIMARY KEY")
    } else {
        PlanNode::new(NodeType::IndexScan, detail)
    };

    node.relation = relation_name(rest);
    node.index_cond = index_condition(rest);
    node
}

/// Table name after SCAN/SEARCH, skipping the pre-3.36 `TABLE` keyword
fn relation_name(rest: &str) -> Option<String> {
    let mut words = rest.split_whitespace();
    let first = words.next()?;
    let name = if first == "TABLE" { words.next()? } else { first };
    Some(name.to_string())
}

fn index_after(rest: &str, marker: &str) -> Option<String> {
    let start = rest.find(marker)? + marker.len();
    rest[start..]
        .split_whitespace()
        .next()
        .map(|name| name.to_string())
}

/// Text inside the trailing parentheses, e.g. `user_id=?`
fn index_condition(rest: &str) -> Option<String> {
    let rest = rest.trim_end();
    if !rest.ends_with(')') {
        return None;
    }
    let open = rest.rfind('(')?;
    Some(rest[open + 1..rest.len() - 1].to_string())
}

#[cfg(test)]
mod tests;
