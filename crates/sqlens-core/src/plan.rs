//! Execution plan model
//!
//! `PlanTree` is the shape returned by `Connection::explain`. Drivers map
//! their native EXPLAIN output onto it so callers can inspect access paths
//! without knowing the database.

use serde::{Deserialize, Serialize};

/// A complete execution plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanTree {
    /// Root node of the plan tree
    pub root: PlanNode,
    /// Total estimated cost of the query
    pub total_cost: Option<f64>,
    /// Total estimated rows to be processed
    pub total_rows: Option<u64>,
}

impl PlanTree {
    /// Creates a new plan with the given root node
    pub fn new(root: PlanNode) -> Self {
        let total_cost = root.cost.map(|c| c.total);
        let total_rows = root.rows;
        Self {
            root,
            total_cost,
            total_rows,
        }
    }

    /// Returns an iterator over all nodes in the plan (depth-first)
    pub fn iter_nodes(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(&self.root)
    }

    /// Finds all nodes matching a specific node type
    pub fn find_nodes_by_type(&self, node_type: NodeType) -> Vec<&PlanNode> {
        self.iter_nodes()
            .filter(|n| n.node_type == node_type)
            .collect()
    }

    /// Returns true if the plan contains any full scans
    pub fn has_sequential_scans(&self) -> bool {
        self.iter_nodes().any(|n| n.node_type == NodeType::SeqScan)
    }

    /// Returns the index names referenced anywhere in the plan
    pub fn indexes_used(&self) -> Vec<&str> {
        self.iter_nodes()
            .filter_map(|n| n.index_name.as_deref())
            .collect()
    }
}

/// A single node in the plan tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanNode {
    /// Type of operation this node performs
    pub node_type: NodeType,
    /// Raw operation text reported by the database
    pub detail: String,
    /// Relation/table name (if applicable)
    pub relation: Option<String>,
    /// Index name used (for index scans)
    pub index_name: Option<String>,
    /// Index condition (for index scans)
    pub index_cond: Option<String>,
    /// Cost estimate
    pub cost: Option<NodeCost>,
    /// Estimated number of rows
    pub rows: Option<u64>,
    /// Child nodes
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Creates a new plan node with the given type
    pub fn new(node_type: NodeType, detail: impl Into<String>) -> Self {
        Self {
            node_type,
            detail: detail.into(),
            relation: None,
            index_name: None,
            index_cond: None,
            cost: None,
            rows: None,
            children: Vec::new(),
        }
    }

    /// Sets the relation/table name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Sets the cost information
    pub fn with_cost(mut self, startup: f64, total: f64) -> Self {
        self.cost = Some(NodeCost { startup, total });
        self
    }

    /// Sets the estimated rows
    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Sets the index name
    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Adds a child node
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Returns the maximum depth of this subtree
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Returns true if this node reads a table or index
    pub fn is_scan(&self) -> bool {
        matches!(
            self.node_type,
            NodeType::SeqScan
                | NodeType::IndexScan
                | NodeType::IndexOnlyScan
                | NodeType::SubqueryScan
        )
    }
}

/// Cost information for a plan node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NodeCost {
    /// Startup cost (time to return first row)
    pub startup: f64,
    /// Total cost (time to return all rows)
    pub total: f64,
}

/// Type of operation performed by a plan node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    SeqScan,
    IndexScan,
    IndexOnlyScan,
    SubqueryScan,
    ValuesScan,
    NestedLoop,
    Aggregate,
    Sort,
    Unique,
    SetOp,
    Append,
    Materialize,
    SubPlan,
    Result,
    Unknown,
}

impl NodeType {
    /// Returns a human-readable description of this node type
    pub fn description(&self) -> &'static str {
        match self {
            Self::SeqScan => "Sequential scan (full table scan)",
            Self::IndexScan => "Index scan (uses index to find rows, then reads table)",
            Self::IndexOnlyScan => "Index-only scan (reads data directly from index)",
            Self::SubqueryScan => "Subquery scan",
            Self::ValuesScan => "Constant row",
            Self::NestedLoop => "Nested loop join",
            Self::Aggregate => "Aggregate",
            Self::Sort => "Sort",
            Self::Unique => "Unique (removes duplicates)",
            Self::SetOp => "Set operation (UNION/INTERSECT/EXCEPT)",
            Self::Append => "Append (combines multiple inputs)",
            Self::Materialize => "Materialize",
            Self::SubPlan => "SubPlan (subquery execution)",
            Self::Result => "Result",
            Self::Unknown => "Unknown operation",
        }
    }
}

/// Iterator for traversing plan nodes depth-first
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests;
