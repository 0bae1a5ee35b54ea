//! Clause inventory
//!
//! A flattened, per-scope view of a parsed statement: which tables each
//! SELECT block reads, which predicates, joins and ordering keys it carries,
//! and how every column reference resolves. Built once per statement by
//! [`extract`] and read-only afterwards; every downstream component works
//! from this view rather than from the raw AST.

mod extract;

pub use extract::{extract, extract_with_catalog};

use crate::sql::{JoinKind, ScopeId, SetOperator, Span};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a nested SELECT block sits inside its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubqueryPosition {
    /// `x IN (SELECT ...)` in WHERE
    WhereIn,
    /// `EXISTS (SELECT ...)` in WHERE
    WhereExists,
    /// Any other subquery in WHERE
    WhereScalar,
    Projection,
    From,
    GroupBy,
    Having,
    JoinOn,
    OrderBy,
}

impl SubqueryPosition {
    /// Evaluated once per outer row when correlated
    pub fn is_where_membership(&self) -> bool {
        matches!(self, Self::WhereIn | Self::WhereExists)
    }
}

/// How a scope is attached to the statement tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeOrigin {
    Root,
    /// Branch `index` of a set operation; `within` is set when the whole
    /// compound statement is itself a subquery
    SetOperand {
        index: usize,
        within: Option<SubqueryPosition>,
    },
    Subquery {
        position: SubqueryPosition,
    },
}

impl ScopeOrigin {
    /// Subquery position of this scope or of the compound statement it belongs to
    pub fn subquery_position(&self) -> Option<SubqueryPosition> {
        match self {
            Self::Root => None,
            Self::SetOperand { within, .. } => *within,
            Self::Subquery { position } => Some(*position),
        }
    }
}

/// A table visible in one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    /// Table name (lower-cased unless quoted); the alias for derived tables
    pub name: String,
    pub schema: Option<String>,
    pub alias: Option<String>,
    /// First scope of the subquery for derived tables
    pub derived: Option<ScopeId>,
    /// How the table was joined; `None` for FROM list items
    pub join: Option<JoinKind>,
    /// Join carried an ON or USING condition
    pub constrained: bool,
    /// Index of the comma-separated FROM item this table belongs to
    pub from_item: usize,
    pub span: Span,
}

impl TableRef {
    /// Name the table is referenced by inside the scope
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_base_table(&self) -> bool {
        self.derived.is_none()
    }

    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// Outcome of resolving one column reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnResolution {
    /// Table `table_index` of the owning scope
    Local { table_index: usize },
    /// A table of an enclosing scope (correlation)
    Outer { scope: ScopeId, table_index: usize },
    /// A select-list alias
    OutputAlias,
    Ambiguous { candidates: Vec<String> },
    Unresolved,
}

/// A column reference with its resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
    /// Resolved base table name, for local and outer references
    pub table: Option<String>,
    pub resolution: ColumnResolution,
    pub span: Span,
}

impl ColumnRef {
    pub fn is_local(&self) -> bool {
        matches!(self.resolution, ColumnResolution::Local { .. })
    }

    pub fn is_outer(&self) -> bool {
        matches!(self.resolution, ColumnResolution::Outer { .. })
    }

    pub fn local_table_index(&self) -> Option<usize> {
        match self.resolution {
            ColumnResolution::Local { table_index } => Some(table_index),
            _ => None,
        }
    }

    /// `table.column` when resolved, otherwise the column as written
    pub fn display_name(&self) -> String {
        match (&self.table, &self.qualifier) {
            (Some(table), _) => format!("{}.{}", table, self.name),
            (None, Some(qualifier)) => format!("{}.{}", qualifier, self.name),
            (None, None) => self.name.clone(),
        }
    }
}

/// Operator classification of an atomic predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOperator {
    Equality,
    Range,
    FunctionWrapped,
    Like,
    In,
    InSubquery,
    Exists,
    IsNull,
    Other,
}

/// Position of a predicate in its boolean tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Connective {
    /// Part of the top-level AND chain
    Conjunct,
    /// Atom under OR group `group` (group ids are per scope)
    Disjunct { group: usize },
}

impl Connective {
    pub fn is_conjunct(&self) -> bool {
        matches!(self, Self::Conjunct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateLocation {
    Where,
    JoinOn,
    Having,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    Number,
    String,
    Boolean,
    Null,
    Temporal,
}

/// Literal side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralOperand {
    pub kind: LiteralKind,
    /// Literal rendered as SQL
    pub text: String,
}

/// What a literal compares equal by
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Boolean(bool),
}

impl LiteralOperand {
    /// `None` for NULL, temporal literals and numbers outside plain decimal notation
    pub fn value(&self) -> Option<LiteralValue> {
        match self.kind {
            LiteralKind::Number => self
                .text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(LiteralValue::Number),
            LiteralKind::String => {
                let inner = self.text.strip_prefix('\'')?.strip_suffix('\'')?;
                Some(LiteralValue::String(inner.replace("''", "'")))
            }
            LiteralKind::Boolean => Some(LiteralValue::Boolean(
                self.text.eq_ignore_ascii_case("TRUE"),
            )),
            LiteralKind::Null | LiteralKind::Temporal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateClause {
    pub text: String,
    pub span: Span,
    /// All columns of the predicate, subqueries excluded
    pub columns: Vec<ColumnRef>,
    /// The column an index could serve, when the predicate has one
    pub target: Option<ColumnRef>,
    pub operator: PredicateOperator,
    pub connective: Connective,
    pub location: PredicateLocation,
    pub sargable: bool,
    /// References an enclosing scope, directly or through its subquery
    pub correlated: bool,
    pub negated: bool,
    /// Function (or `arithmetic` / `cast`) wrapping the target column
    pub wrapped_function: Option<String>,
    pub literal: Option<LiteralOperand>,
    pub like_pattern: Option<String>,
    /// First scope of the subquery of an IN / EXISTS predicate
    pub subquery: Option<ScopeId>,
}

/// Equi-join between two columns of different tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub text: String,
    pub span: Span,
    pub left: ColumnRef,
    pub right: ColumnRef,
    /// `None` for implicit joins written in WHERE
    pub kind: Option<JoinKind>,
    pub implicit: bool,
}

impl JoinClause {
    pub fn columns(&self) -> [&ColumnRef; 2] {
        [&self.left, &self.right]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionItem {
    Wildcard,
    QualifiedWildcard { qualifier: String },
    Expression {
        alias: Option<String>,
        /// Set when the item is a bare literal
        literal: Option<LiteralOperand>,
        /// The item is a plain column reference
        bare_column: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionClause {
    pub text: String,
    pub span: Span,
    pub columns: Vec<ColumnRef>,
    pub position: usize,
    pub item: ProjectionItem,
    /// Output column name for bare columns and aliased items
    pub output: Option<String>,
}

impl ProjectionClause {
    pub fn is_unbounded(&self) -> bool {
        matches!(
            self.item,
            ProjectionItem::Wildcard | ProjectionItem::QualifiedWildcard { .. }
        )
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output.as_deref()
    }
}

/// One ORDER BY or GROUP BY key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyClause {
    pub text: String,
    pub span: Span,
    pub columns: Vec<ColumnRef>,
    /// Declared ordinal position, 0-based
    pub position: usize,
    pub descending: bool,
    /// The key is a plain column reference
    pub bare_column: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBranch {
    pub span: Span,
    /// SELECT blocks of the branch; more than one for compound branches
    pub scopes: Vec<ScopeId>,
}

/// A chain of identical set operators, flattened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOperationClause {
    pub text: String,
    pub span: Span,
    pub op: SetOperator,
    pub all: bool,
    pub branches: Vec<SetBranch>,
    pub within: Option<SubqueryPosition>,
}

/// A clause of one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::EnumDiscriminants)]
#[strum_discriminants(name(ClauseKind))]
#[strum_discriminants(derive(Hash, Serialize, Deserialize, strum::EnumIter, strum::Display))]
#[strum_discriminants(serde(rename_all = "snake_case"))]
#[strum_discriminants(strum(serialize_all = "snake_case"))]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum Clause {
    Projection(ProjectionClause),
    Predicate(PredicateClause),
    Join(JoinClause),
    OrderBy(KeyClause),
    GroupBy(KeyClause),
    SetOperation(SetOperationClause),
}

impl Clause {
    pub fn kind(&self) -> ClauseKind {
        ClauseKind::from(self)
    }

    pub fn span(&self) -> Span {
        match self {
            Clause::Projection(c) => c.span,
            Clause::Predicate(c) => c.span,
            Clause::Join(c) => c.span,
            Clause::OrderBy(c) | Clause::GroupBy(c) => c.span,
            Clause::SetOperation(c) => c.span,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Clause::Projection(c) => &c.text,
            Clause::Predicate(c) => &c.text,
            Clause::Join(c) => &c.text,
            Clause::OrderBy(c) | Clause::GroupBy(c) => &c.text,
            Clause::SetOperation(c) => &c.text,
        }
    }

    /// Columns referenced by the clause
    pub fn columns(&self) -> Vec<&ColumnRef> {
        match self {
            Clause::Projection(c) => c.columns.iter().collect(),
            Clause::Predicate(c) => c.columns.iter().collect(),
            Clause::Join(c) => c.columns().to_vec(),
            Clause::OrderBy(c) | Clause::GroupBy(c) => c.columns.iter().collect(),
            Clause::SetOperation(_) => Vec::new(),
        }
    }
}

/// Kind of unresolved reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnresolvedKind {
    Unknown,
    Ambiguous,
}

/// A column that could not be tied to exactly one table
///
/// Never fatal: clauses using the column are treated conservatively.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} column reference `{column}` in scope {scope}")]
pub struct UnresolvedReferenceWarning {
    pub scope: ScopeId,
    pub column: String,
    pub kind: UnresolvedKind,
    pub span: Span,
}

/// Clauses of one SELECT block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeInventory {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub origin: ScopeOrigin,
    pub span: Span,
    pub distinct: bool,
    pub tables: Vec<TableRef>,
    /// Clauses sorted by source position
    pub clauses: Vec<Clause>,
    pub correlated: bool,
    pub outer_references: Vec<ColumnRef>,
    pub warnings: Vec<UnresolvedReferenceWarning>,
}

impl ScopeInventory {
    pub fn predicates(&self) -> impl Iterator<Item = &PredicateClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Predicate(p) => Some(p),
            _ => None,
        })
    }

    pub fn joins(&self) -> impl Iterator<Item = &JoinClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Join(j) => Some(j),
            _ => None,
        })
    }

    pub fn projections(&self) -> impl Iterator<Item = &ProjectionClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::Projection(p) => Some(p),
            _ => None,
        })
    }

    pub fn order_keys(&self) -> impl Iterator<Item = &KeyClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::OrderBy(k) => Some(k),
            _ => None,
        })
    }

    pub fn group_keys(&self) -> impl Iterator<Item = &KeyClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::GroupBy(k) => Some(k),
            _ => None,
        })
    }

    pub fn set_operations(&self) -> impl Iterator<Item = &SetOperationClause> {
        self.clauses.iter().filter_map(|c| match c {
            Clause::SetOperation(s) => Some(s),
            _ => None,
        })
    }

    pub fn table(&self, index: usize) -> Option<&TableRef> {
        self.tables.get(index)
    }

    pub fn base_tables(&self) -> impl Iterator<Item = &TableRef> {
        self.tables.iter().filter(|t| t.is_base_table())
    }
}

/// Per-scope clause inventory of one statement, indexed by scope id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClauseInventory {
    pub scopes: Vec<ScopeInventory>,
}

impl ClauseInventory {
    pub fn scope(&self, id: ScopeId) -> Option<&ScopeInventory> {
        self.scopes
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|index| &self.scopes[index])
    }

    pub fn root(&self) -> Option<&ScopeInventory> {
        self.scopes.first()
    }

    pub fn children(&self, id: ScopeId) -> impl Iterator<Item = &ScopeInventory> {
        self.scopes.iter().filter(move |s| s.parent == Some(id))
    }

    /// Every clause with its owning scope
    pub fn clauses(&self) -> impl Iterator<Item = (&ScopeInventory, &Clause)> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.clauses.iter().map(move |clause| (scope, clause)))
    }

    pub fn has_clause_kind(&self, kind: ClauseKind) -> bool {
        self.clauses().any(|(_, clause)| clause.kind() == kind)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &UnresolvedReferenceWarning> {
        self.scopes.iter().flat_map(|s| s.warnings.iter())
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Number of tables joined across all scopes, explicit and implicit
    pub fn join_count(&self) -> usize {
        self.scopes
            .iter()
            .map(|s| s.tables.len().saturating_sub(1))
            .sum()
    }
}
