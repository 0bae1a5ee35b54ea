//! Abstract syntax tree for the supported SELECT-family subset
//!
//! Every SELECT block is a scope. Scopes are numbered in pre-order while
//! parsing and each block records the id of the scope that owns it, so the
//! tree can be walked upwards without back pointers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range into the original SQL text
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both spans
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the source text covered by this span, if it lies within `source`
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Identifier of one SELECT block
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ScopeId(pub usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An identifier as written, with its quoting preserved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub value: String,
    /// Opening quote character (`"`, `` ` `` or `[`) when the identifier was quoted
    pub quote: Option<char>,
    pub span: Span,
}

impl Ident {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quote: None,
            span: Span::default(),
        }
    }

    /// Name used for resolution: unquoted identifiers are case-insensitive
    pub fn normalized(&self) -> String {
        if self.quote.is_some() {
            self.value.clone()
        } else {
            self.value.to_ascii_lowercase()
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        if self.quote.is_some() {
            self.value == name
        } else {
            self.value.eq_ignore_ascii_case(name)
        }
    }
}

/// A possibly schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub parts: Vec<Ident>,
}

impl ObjectName {
    pub fn table(&self) -> &Ident {
        // The parser never produces an empty name
        &self.parts[self.parts.len() - 1]
    }

    pub fn schema(&self) -> Option<&Ident> {
        if self.parts.len() >= 2 {
            self.parts.get(self.parts.len() - 2)
        } else {
            None
        }
    }
}

/// Root node for one SQL statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub body: SetExpr,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub span: Span,
}

/// Statement classification by its outermost operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        self.body.kind()
    }

    /// SELECT blocks of the body in source order, not descending into subqueries
    pub fn selects(&self) -> Vec<&Select> {
        let mut out = Vec::new();
        self.body.collect_selects(&mut out);
        out
    }

    /// Scope that owns statement-level ORDER BY keys, when the body is a single block
    pub fn primary_scope(&self) -> Option<ScopeId> {
        match self.body.unnested() {
            SetExpr::Select(select) => Some(select.scope),
            _ => None,
        }
    }

    /// Returns the select with the given scope id anywhere in the tree
    pub fn find_select(&self, scope: ScopeId) -> Option<&Select> {
        let mut found = None;
        visit_statement(self, &mut |select| {
            if found.is_none() && select.scope == scope {
                found = Some(select);
            }
        });
        found
    }

    /// Mutable access to the select with the given scope id
    pub fn find_select_mut(&mut self, scope: ScopeId) -> Option<&mut Select> {
        for select in self.body.selects_mut() {
            if select.scope == scope {
                return Some(select);
            }
            for nested in select.nested_statements_mut() {
                if let Some(found) = nested.find_select_mut(scope) {
                    return Some(found);
                }
            }
        }
        for item in &mut self.order_by {
            for nested in item.expr.subqueries_mut() {
                if let Some(found) = nested.find_select_mut(scope) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Number of SELECT blocks in the whole tree
    pub fn scope_count(&self) -> usize {
        let mut count = 0;
        visit_statement(self, &mut |_| count += 1);
        count
    }
}

/// Calls `f` for every SELECT block in pre-order, including nested ones
pub fn visit_statement<'a>(statement: &'a Statement, f: &mut dyn FnMut(&'a Select)) {
    for select in statement.selects() {
        f(select);
        for nested in select.nested_statements() {
            visit_statement(nested, f);
        }
    }
    for item in &statement.order_by {
        for nested in item.expr.subqueries() {
            visit_statement(nested, f);
        }
    }
}

/// Calls `f` for this statement and every statement nested in it, outermost first
pub fn visit_statements_mut(statement: &mut Statement, f: &mut dyn FnMut(&mut Statement)) {
    f(statement);
    for select in statement.body.selects_mut() {
        for nested in select.nested_statements_mut() {
            visit_statements_mut(nested, f);
        }
    }
    for item in &mut statement.order_by {
        for nested in item.expr.subqueries_mut() {
            visit_statements_mut(nested, f);
        }
    }
}

/// Body of a statement: a SELECT block or a set operation over bodies
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Select(Box<Select>),
    /// Parenthesised operand of a set operation
    Nested { inner: Box<SetExpr>, span: Span },
    SetOperation {
        op: SetOperator,
        all: bool,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
        span: Span,
    },
}

impl SetExpr {
    pub fn span(&self) -> Span {
        match self {
            SetExpr::Select(select) => select.span,
            SetExpr::Nested { span, .. } | SetExpr::SetOperation { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> StatementKind {
        match self.unnested() {
            SetExpr::SetOperation { op, all, .. } => match (op, all) {
                (SetOperator::Union, false) => StatementKind::Union,
                (SetOperator::Union, true) => StatementKind::UnionAll,
                (SetOperator::Intersect, _) => StatementKind::Intersect,
                (SetOperator::Except, _) => StatementKind::Except,
            },
            _ => StatementKind::Select,
        }
    }

    /// Strips redundant parentheses
    pub fn unnested(&self) -> &SetExpr {
        match self {
            SetExpr::Nested { inner, .. } => inner.unnested(),
            other => other,
        }
    }

    pub fn selects_mut(&mut self) -> Vec<&mut Select> {
        let mut out = Vec::new();
        self.collect_selects_mut(&mut out);
        out
    }

    fn collect_selects_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Select>) {
        match self {
            SetExpr::Select(select) => out.push(select.as_mut()),
            SetExpr::Nested { inner, .. } => inner.collect_selects_mut(out),
            SetExpr::SetOperation { left, right, .. } => {
                left.collect_selects_mut(out);
                right.collect_selects_mut(out);
            }
        }
    }

    pub fn collect_selects<'a>(&'a self, out: &mut Vec<&'a Select>) {
        match self {
            SetExpr::Select(select) => out.push(select),
            SetExpr::Nested { inner, .. } => inner.collect_selects(out),
            SetExpr::SetOperation { left, right, .. } => {
                left.collect_selects(out);
                right.collect_selects(out);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

impl SetOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        }
    }
}

/// One SELECT block (a scope)
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub scope: ScopeId,
    pub parent: Option<ScopeId>,
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableWithJoins>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub span: Span,
}

impl Select {
    /// Statements nested directly in this block (FROM, projection, WHERE, HAVING)
    pub fn nested_statements(&self) -> Vec<&Statement> {
        let mut out = Vec::new();
        for item in &self.projection {
            if let SelectItem::Expr { expr, .. } = item {
                out.extend(expr.subqueries());
            }
        }
        for table in &self.from {
            if let TableFactor::Derived { subquery, .. } = &table.relation {
                out.push(subquery.as_ref());
            }
            for join in &table.joins {
                if let TableFactor::Derived { subquery, .. } = &join.relation {
                    out.push(subquery.as_ref());
                }
                if let JoinConstraint::On(expr) = &join.constraint {
                    out.extend(expr.subqueries());
                }
            }
        }
        if let Some(selection) = &self.selection {
            out.extend(selection.subqueries());
        }
        for expr in &self.group_by {
            out.extend(expr.subqueries());
        }
        if let Some(having) = &self.having {
            out.extend(having.subqueries());
        }
        out
    }
}

impl Select {
    pub fn nested_statements_mut(&mut self) -> Vec<&mut Statement> {
        let mut out = Vec::new();
        for item in &mut self.projection {
            if let SelectItem::Expr { expr, .. } = item {
                out.extend(expr.subqueries_mut());
            }
        }
        for table in &mut self.from {
            if let TableFactor::Derived { subquery, .. } = &mut table.relation {
                out.push(subquery.as_mut());
            }
            for join in &mut table.joins {
                if let TableFactor::Derived { subquery, .. } = &mut join.relation {
                    out.push(subquery.as_mut());
                }
                if let JoinConstraint::On(expr) = &mut join.constraint {
                    out.extend(expr.subqueries_mut());
                }
            }
        }
        if let Some(selection) = &mut self.selection {
            out.extend(selection.subqueries_mut());
        }
        for expr in &mut self.group_by {
            out.extend(expr.subqueries_mut());
        }
        if let Some(having) = &mut self.having {
            out.extend(having.subqueries_mut());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard { span: Span },
    QualifiedWildcard { qualifier: ObjectName, span: Span },
    Expr { expr: Expr, alias: Option<Ident> },
}

impl SelectItem {
    pub fn span(&self) -> Span {
        match self {
            SelectItem::Wildcard { span } | SelectItem::QualifiedWildcard { span, .. } => *span,
            SelectItem::Expr { expr, alias } => match alias {
                Some(alias) => expr.span.merge(alias.span),
                None => expr.span,
            },
        }
    }

    /// Name of the output column this item produces, when it is knowable
    pub fn output_name(&self) -> Option<String> {
        match self {
            SelectItem::Expr {
                alias: Some(alias), ..
            } => Some(alias.normalized()),
            SelectItem::Expr { expr, alias: None } => match &expr.kind {
                ExprKind::Column { name, .. } => Some(name.normalized()),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    Table {
        name: ObjectName,
        alias: Option<Ident>,
        span: Span,
    },
    Derived {
        subquery: Box<Statement>,
        alias: Option<Ident>,
        span: Span,
    },
}

impl TableFactor {
    pub fn span(&self) -> Span {
        match self {
            TableFactor::Table { span, .. } | TableFactor::Derived { span, .. } => *span,
        }
    }

    pub fn alias(&self) -> Option<&Ident> {
        match self {
            TableFactor::Table { alias, .. } | TableFactor::Derived { alias, .. } => {
                alias.as_ref()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub relation: TableFactor,
    pub constraint: JoinConstraint,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<Ident>),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    /// `Some(true)` for ASC, `Some(false)` for DESC, `None` when unspecified
    pub asc: Option<bool>,
    pub span: Span,
}

/// An expression with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Column {
        qualifier: Option<Ident>,
        name: Ident,
    },
    Literal(Literal),
    Placeholder(String),
    /// `DATE '2024-01-01'` and friends
    TypedString {
        data_type: String,
        value: String,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Function {
        name: Ident,
        args: FunctionArgs,
        distinct: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Statement>,
        negated: bool,
    },
    Exists {
        subquery: Box<Statement>,
        negated: bool,
    },
    Subquery(Box<Statement>),
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        case_insensitive: bool,
        escape: Option<Box<Expr>>,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        data_type: String,
        /// Written with the `::` shorthand
        shorthand: bool,
    },
    Nested(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgs {
    Star,
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "||",
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 4,
            Self::Plus | Self::Minus | Self::Concat => 5,
            Self::Multiply | Self::Divide | Self::Modulo => 6,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.precedence() >= 5
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Strips redundant parentheses
    pub fn unnested(&self) -> &Expr {
        match &self.kind {
            ExprKind::Nested(inner) => inner.unnested(),
            _ => self,
        }
    }

    /// Direct child expressions, not descending into subqueries
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Column { .. }
            | ExprKind::Literal(_)
            | ExprKind::Placeholder(_)
            | ExprKind::TypedString { .. }
            | ExprKind::Exists { .. }
            | ExprKind::Subquery(_) => Vec::new(),
            ExprKind::Unary { expr, .. }
            | ExprKind::IsNull { expr, .. }
            | ExprKind::Cast { expr, .. }
            | ExprKind::InSubquery { expr, .. }
            | ExprKind::Nested(expr) => vec![expr.as_ref()],
            ExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Function { args, .. } => match args {
                FunctionArgs::Star => Vec::new(),
                FunctionArgs::List(list) => list.iter().collect(),
            },
            ExprKind::Between {
                expr, low, high, ..
            } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
            ExprKind::InList { expr, list, .. } => {
                let mut out = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            ExprKind::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                let mut out = vec![expr.as_ref(), pattern.as_ref()];
                if let Some(escape) = escape {
                    out.push(escape.as_ref());
                }
                out
            }
            ExprKind::Case {
                operand,
                branches,
                else_result,
            } => {
                let mut out = Vec::new();
                if let Some(operand) = operand {
                    out.push(operand.as_ref());
                }
                for (when, then) in branches {
                    out.push(when);
                    out.push(then);
                }
                if let Some(else_result) = else_result {
                    out.push(else_result.as_ref());
                }
                out
            }
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            ExprKind::Column { .. }
            | ExprKind::Literal(_)
            | ExprKind::Placeholder(_)
            | ExprKind::TypedString { .. }
            | ExprKind::Exists { .. }
            | ExprKind::Subquery(_) => Vec::new(),
            ExprKind::Unary { expr, .. }
            | ExprKind::IsNull { expr, .. }
            | ExprKind::Cast { expr, .. }
            | ExprKind::InSubquery { expr, .. }
            | ExprKind::Nested(expr) => vec![expr.as_mut()],
            ExprKind::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            ExprKind::Function { args, .. } => match args {
                FunctionArgs::Star => Vec::new(),
                FunctionArgs::List(list) => list.iter_mut().collect(),
            },
            ExprKind::Between {
                expr, low, high, ..
            } => vec![expr.as_mut(), low.as_mut(), high.as_mut()],
            ExprKind::InList { expr, list, .. } => {
                let mut out = vec![expr.as_mut()];
                out.extend(list.iter_mut());
                out
            }
            ExprKind::Like {
                expr,
                pattern,
                escape,
                ..
            } => {
                let mut out = vec![expr.as_mut(), pattern.as_mut()];
                if let Some(escape) = escape {
                    out.push(escape.as_mut());
                }
                out
            }
            ExprKind::Case {
                operand,
                branches,
                else_result,
            } => {
                let mut out = Vec::new();
                if let Some(operand) = operand {
                    out.push(operand.as_mut());
                }
                for (when, then) in branches.iter_mut() {
                    out.push(when);
                    out.push(then);
                }
                if let Some(else_result) = else_result {
                    out.push(else_result.as_mut());
                }
                out
            }
        }
    }

    pub fn subqueries_mut(&mut self) -> Vec<&mut Statement> {
        let mut out = Vec::new();
        self.collect_subqueries_mut(&mut out);
        out
    }

    fn collect_subqueries_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Statement>) {
        let holds_subquery = matches!(
            self.kind,
            ExprKind::InSubquery { .. } | ExprKind::Exists { .. } | ExprKind::Subquery(_)
        );
        if !holds_subquery {
            for child in self.children_mut() {
                child.collect_subqueries_mut(out);
            }
            return;
        }
        match &mut self.kind {
            ExprKind::InSubquery { expr, subquery, .. } => {
                out.push(subquery.as_mut());
                expr.collect_subqueries_mut(out);
            }
            ExprKind::Exists { subquery, .. } | ExprKind::Subquery(subquery) => {
                out.push(subquery.as_mut());
            }
            _ => {}
        }
    }

    /// Subqueries reachable from this expression without entering another subquery
    pub fn subqueries(&self) -> Vec<&Statement> {
        let mut out = Vec::new();
        self.collect_subqueries(&mut out);
        out
    }

    fn collect_subqueries<'a>(&'a self, out: &mut Vec<&'a Statement>) {
        match &self.kind {
            ExprKind::InSubquery { subquery, .. }
            | ExprKind::Exists { subquery, .. }
            | ExprKind::Subquery(subquery) => out.push(subquery.as_ref()),
            _ => {}
        }
        for child in self.children() {
            child.collect_subqueries(out);
        }
    }

    /// Column references in this expression, not descending into subqueries
    pub fn columns(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        if let ExprKind::Column { .. } = self.kind {
            out.push(self);
            return;
        }
        for child in self.children() {
            child.collect_columns(out);
        }
    }

    /// True when the expression references no columns and contains no subqueries
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::Column { .. }
            | ExprKind::Exists { .. }
            | ExprKind::Subquery(_)
            | ExprKind::InSubquery { .. } => false,
            _ => self.children().iter().all(|child| child.is_constant()),
        }
    }

    pub fn as_column(&self) -> Option<(Option<&Ident>, &Ident)> {
        match &self.unnested().kind {
            ExprKind::Column { qualifier, name } => Some((qualifier.as_ref(), name)),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.unnested().kind {
            ExprKind::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}
