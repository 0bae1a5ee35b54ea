//! Clause extraction
//!
//! Walks the statement tree scope by scope. Enclosing scopes stay on a stack
//! while a nested SELECT is processed so column references can be resolved
//! outwards; a scope is frozen into a [`ScopeInventory`] when its block ends.

use super::*;
use crate::catalog::SchemaCatalog;
use crate::sql::{
    BinaryOp, Expr, ExprKind, Ident, JoinConstraint, Literal, OrderByItem, Select, SelectItem,
    SetExpr, Statement, TableFactor, UnaryOp,
};
use std::collections::BTreeMap;

/// Aggregate functions; comparisons on them are not column predicates
const AGGREGATES: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "total",
    "group_concat",
    "string_agg",
    "array_agg",
    "bool_and",
    "bool_or",
];

/// Build the clause inventory of a statement
pub fn extract(statement: &Statement) -> ClauseInventory {
    extract_with_catalog(statement, None)
}

/// Build the clause inventory, consulting `catalog` for unqualified columns
pub fn extract_with_catalog(
    statement: &Statement,
    catalog: Option<&SchemaCatalog>,
) -> ClauseInventory {
    let mut extractor = Extractor {
        catalog,
        stack: Vec::new(),
        done: BTreeMap::new(),
    };
    extractor.statement(statement, None);
    let inventory = ClauseInventory {
        scopes: extractor.done.into_values().collect(),
    };
    tracing::debug!(
        scopes = inventory.scope_count(),
        warnings = inventory.warnings().count(),
        "extracted clause inventory"
    );
    inventory
}

struct Frame {
    id: ScopeId,
    parent: Option<ScopeId>,
    origin: ScopeOrigin,
    span: Span,
    distinct: bool,
    tables: Vec<TableRef>,
    output_aliases: Vec<String>,
    clauses: Vec<Clause>,
    correlated: bool,
    outer_references: Vec<ColumnRef>,
    warnings: Vec<UnresolvedReferenceWarning>,
    next_group: usize,
}

impl Frame {
    fn new(select: &Select, origin: ScopeOrigin) -> Self {
        Self {
            id: select.scope,
            parent: select.parent,
            origin,
            span: select.span,
            distinct: select.distinct,
            tables: Vec::new(),
            output_aliases: Vec::new(),
            clauses: Vec::new(),
            correlated: false,
            outer_references: Vec::new(),
            warnings: Vec::new(),
            next_group: 0,
        }
    }
}

#[derive(Clone, Copy)]
struct PredicateContext {
    location: PredicateLocation,
    join: Option<JoinKind>,
}

enum Lookup {
    Found(usize),
    Ambiguous(Vec<String>),
    Missing,
}

/// Syntactic classification of one predicate atom
struct Shape<'e> {
    operator: PredicateOperator,
    target: Option<&'e Expr>,
    sargable: bool,
    negated: bool,
    wrapped: Option<String>,
    literal: Option<LiteralOperand>,
    like_pattern: Option<String>,
    subquery: Option<ScopeId>,
}

impl<'e> Shape<'e> {
    fn other() -> Self {
        Self {
            operator: PredicateOperator::Other,
            target: None,
            sargable: false,
            negated: false,
            wrapped: None,
            literal: None,
            like_pattern: None,
            subquery: None,
        }
    }
}

struct Extractor<'c> {
    catalog: Option<&'c SchemaCatalog>,
    stack: Vec<Frame>,
    done: BTreeMap<ScopeId, ScopeInventory>,
}

impl<'c> Extractor<'c> {
    fn statement(&mut self, statement: &Statement, within: Option<SubqueryPosition>) {
        match statement.body.unnested() {
            SetExpr::Select(select) => {
                let origin = match within {
                    None => ScopeOrigin::Root,
                    Some(position) => ScopeOrigin::Subquery { position },
                };
                self.select(select, origin, &statement.order_by);
            }
            body => {
                let selects = statement.selects();
                for (index, select) in selects.iter().enumerate() {
                    self.select(select, ScopeOrigin::SetOperand { index, within }, &[]);
                }

                let mut chains = Vec::new();
                collect_chains(body, within, &mut chains);
                for chain in chains {
                    let owner = chain
                        .branches
                        .first()
                        .and_then(|branch| branch.scopes.first())
                        .copied();
                    if let Some(scope) = owner.and_then(|id| self.done.get_mut(&id)) {
                        scope.clauses.push(Clause::SetOperation(chain));
                    }
                }

                if let Some(first) = selects.first() {
                    self.compound_order_by(first.scope, &statement.order_by);
                }
            }
        }
    }

    /// ORDER BY of a compound statement names output columns, not table columns
    fn compound_order_by(&mut self, owner: ScopeId, order_by: &[OrderByItem]) {
        let mut keys = Vec::new();
        for (position, item) in order_by.iter().enumerate() {
            for subquery in item.expr.subqueries() {
                self.statement(subquery, Some(SubqueryPosition::OrderBy));
            }
            let columns = item
                .expr
                .columns()
                .into_iter()
                .filter_map(|expr| expr.as_column().map(|(q, n)| (q, n, expr.span)))
                .map(|(qualifier, name, span)| ColumnRef {
                    qualifier: qualifier.map(Ident::normalized),
                    name: name.normalized(),
                    table: None,
                    resolution: ColumnResolution::OutputAlias,
                    span,
                })
                .collect();
            keys.push(Clause::OrderBy(KeyClause {
                text: item.expr.to_string(),
                span: item.span,
                columns,
                position,
                descending: item.asc == Some(false),
                bare_column: item.expr.as_column().is_some(),
            }));
        }
        if let Some(scope) = self.done.get_mut(&owner) {
            scope.clauses.extend(keys);
            scope.clauses.sort_by_key(|clause| clause.span().start);
        }
    }

    fn select(&mut self, select: &Select, origin: ScopeOrigin, order_by: &[OrderByItem]) {
        self.stack.push(Frame::new(select, origin));
        let depth = self.stack.len() - 1;

        // Tables first: every clause of the block may refer to any of them
        let mut using_joins = Vec::new();
        for (from_item, table) in select.from.iter().enumerate() {
            self.table_factor(depth, &table.relation, from_item, None, false);
            for join in &table.joins {
                let constrained = !matches!(join.constraint, JoinConstraint::None);
                self.table_factor(depth, &join.relation, from_item, Some(join.kind), constrained);
                if let JoinConstraint::Using(columns) = &join.constraint {
                    using_joins.push((self.stack[depth].tables.len() - 1, join, columns));
                }
            }
        }

        self.stack[depth].output_aliases = select
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expr {
                    alias: Some(alias), ..
                } => Some(alias.normalized()),
                _ => None,
            })
            .collect();

        for (position, item) in select.projection.iter().enumerate() {
            self.projection(depth, position, item);
        }

        for table in &select.from {
            for join in &table.joins {
                if let JoinConstraint::On(condition) = &join.constraint {
                    let ctx = PredicateContext {
                        location: PredicateLocation::JoinOn,
                        join: Some(join.kind),
                    };
                    self.boolean(depth, condition, ctx, None, false);
                }
            }
        }
        for (joined, join, columns) in using_joins {
            for column in columns {
                self.using_join(depth, joined, join.kind, join.span, column);
            }
        }

        if let Some(selection) = &select.selection {
            let ctx = PredicateContext {
                location: PredicateLocation::Where,
                join: None,
            };
            self.boolean(depth, selection, ctx, None, false);
        }

        for (position, expr) in select.group_by.iter().enumerate() {
            let key = self.key(depth, position, expr, expr.span, None, SubqueryPosition::GroupBy);
            self.stack[depth].clauses.push(Clause::GroupBy(key));
        }

        if let Some(having) = &select.having {
            let ctx = PredicateContext {
                location: PredicateLocation::Having,
                join: None,
            };
            self.boolean(depth, having, ctx, None, false);
        }

        for (position, item) in order_by.iter().enumerate() {
            let key = self.key(
                depth,
                position,
                &item.expr,
                item.span,
                item.asc,
                SubqueryPosition::OrderBy,
            );
            self.stack[depth].clauses.push(Clause::OrderBy(key));
        }

        self.finish();
    }

    fn finish(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let mut clauses = frame.clauses;
        clauses.sort_by_key(|clause| clause.span().start);
        self.done.insert(
            frame.id,
            ScopeInventory {
                id: frame.id,
                parent: frame.parent,
                origin: frame.origin,
                span: frame.span,
                distinct: frame.distinct,
                tables: frame.tables,
                clauses,
                correlated: frame.correlated,
                outer_references: frame.outer_references,
                warnings: frame.warnings,
            },
        );
    }

    fn nested(&mut self, expr: &Expr, position: SubqueryPosition) {
        for subquery in expr.subqueries() {
            self.statement(subquery, Some(position));
        }
    }

    fn table_factor(
        &mut self,
        depth: usize,
        factor: &TableFactor,
        from_item: usize,
        join: Option<JoinKind>,
        constrained: bool,
    ) {
        let table = match factor {
            TableFactor::Table { name, alias, span } => TableRef {
                name: name.table().normalized(),
                schema: name.schema().map(Ident::normalized),
                alias: alias.as_ref().map(Ident::normalized),
                derived: None,
                join,
                constrained,
                from_item,
                span: *span,
            },
            TableFactor::Derived {
                subquery,
                alias,
                span,
            } => {
                self.statement(subquery, Some(SubqueryPosition::From));
                let derived = subquery.selects().first().map(|s| s.scope);
                let name = match alias {
                    Some(alias) => alias.normalized(),
                    None => format!("derived{}", derived.map(|s| s.0).unwrap_or_default()),
                };
                TableRef {
                    name,
                    schema: None,
                    alias: None,
                    derived,
                    join,
                    constrained,
                    from_item,
                    span: *span,
                }
            }
        };
        self.stack[depth].tables.push(table);
    }

    fn projection(&mut self, depth: usize, position: usize, item: &SelectItem) {
        let clause = match item {
            SelectItem::Wildcard { span } => ProjectionClause {
                text: "*".to_string(),
                span: *span,
                columns: Vec::new(),
                position,
                item: ProjectionItem::Wildcard,
                output: None,
            },
            SelectItem::QualifiedWildcard { qualifier, span } => ProjectionClause {
                text: format!("{}.*", qualifier),
                span: *span,
                columns: Vec::new(),
                position,
                item: ProjectionItem::QualifiedWildcard {
                    qualifier: qualifier.table().normalized(),
                },
                output: None,
            },
            SelectItem::Expr { expr, alias } => {
                self.nested(expr, SubqueryPosition::Projection);
                let columns = self.columns(depth, expr, false);
                ProjectionClause {
                    text: item.to_string(),
                    span: item.span(),
                    columns,
                    position,
                    item: ProjectionItem::Expression {
                        alias: alias.as_ref().map(Ident::normalized),
                        literal: literal_operand(expr),
                        bare_column: expr.as_column().is_some(),
                    },
                    output: item.output_name(),
                }
            }
        };
        self.stack[depth].clauses.push(Clause::Projection(clause));
    }

    fn key(
        &mut self,
        depth: usize,
        position: usize,
        expr: &Expr,
        span: Span,
        asc: Option<bool>,
        subquery_position: SubqueryPosition,
    ) -> KeyClause {
        self.nested(expr, subquery_position);

        // `ORDER BY 2` refers to the second projected item
        let ordinal = match expr.as_literal() {
            Some(Literal::Number(n)) => n.parse::<usize>().ok(),
            _ => None,
        };
        let projected = ordinal.and_then(|n| {
            self.stack[depth].clauses.iter().find_map(|clause| match clause {
                Clause::Projection(p) if p.position + 1 == n => Some(p.clone()),
                _ => None,
            })
        });

        let (columns, bare_column) = match projected {
            Some(projection) => {
                let bare = projection.columns.len() == 1 && projection.output.is_some();
                (projection.columns, bare)
            }
            None => (self.columns(depth, expr, true), expr.as_column().is_some()),
        };

        KeyClause {
            text: expr.to_string(),
            span,
            columns,
            position,
            descending: asc == Some(false),
            bare_column,
        }
    }

    fn using_join(
        &mut self,
        depth: usize,
        joined: usize,
        kind: JoinKind,
        span: Span,
        column: &Ident,
    ) {
        let name = column.normalized();
        let frame = &self.stack[depth];
        let Some(right_table) = frame.tables.get(joined) else {
            return;
        };
        // Nearest table on the left that is known to carry the column,
        // otherwise the immediately preceding one
        let left_index = (0..joined)
            .rev()
            .filter(|&i| frame.tables[i].from_item == right_table.from_item)
            .find(|&i| self.table_has_column(&frame.tables[i], &name) == Some(true))
            .or_else(|| joined.checked_sub(1));
        let Some(left_index) = left_index else {
            return;
        };

        let make = |table_index: usize, table: &TableRef| ColumnRef {
            qualifier: Some(table.reference_name().to_string()),
            name: name.clone(),
            table: Some(table.name.clone()),
            resolution: ColumnResolution::Local { table_index },
            span: column.span,
        };
        let left = make(left_index, &frame.tables[left_index]);
        let right = make(joined, right_table);
        let clause = JoinClause {
            text: format!("USING ({})", column),
            span,
            left,
            right,
            kind: Some(kind),
            implicit: false,
        };
        self.stack[depth].clauses.push(Clause::Join(clause));
    }

    // ---------------------------------------------------------------------
    // predicates
    // ---------------------------------------------------------------------

    fn new_group(&mut self, depth: usize) -> usize {
        let frame = &mut self.stack[depth];
        let group = frame.next_group;
        frame.next_group += 1;
        group
    }

    /// Flatten an AND/OR/NOT tree into atoms
    fn boolean(
        &mut self,
        depth: usize,
        expr: &Expr,
        ctx: PredicateContext,
        group: Option<usize>,
        negated: bool,
    ) {
        match &expr.kind {
            ExprKind::Nested(inner) => self.boolean(depth, inner, ctx, group, negated),
            ExprKind::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => {
                self.boolean(depth, left, ctx, group, negated);
                self.boolean(depth, right, ctx, group, negated);
            }
            ExprKind::Binary {
                left,
                op: BinaryOp::Or,
                right,
            } => {
                let group = match group {
                    Some(group) => group,
                    None => self.new_group(depth),
                };
                self.boolean(depth, left, ctx, Some(group), negated);
                self.boolean(depth, right, ctx, Some(group), negated);
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr: inner,
            } => {
                let compound = matches!(
                    inner.unnested().kind,
                    ExprKind::Binary {
                        op: BinaryOp::And | BinaryOp::Or,
                        ..
                    }
                );
                let group = match (group, compound) {
                    (None, true) => Some(self.new_group(depth)),
                    (group, _) => group,
                };
                self.boolean(depth, inner, ctx, group, !negated);
            }
            _ => self.atom(depth, expr, ctx, group, negated),
        }
    }

    fn atom(
        &mut self,
        depth: usize,
        expr: &Expr,
        ctx: PredicateContext,
        group: Option<usize>,
        negated: bool,
    ) {
        for subquery in expr.subqueries() {
            let position = match ctx.location {
                PredicateLocation::Where => match &expr.unnested().kind {
                    ExprKind::InSubquery { subquery: own, .. }
                        if std::ptr::eq(own.as_ref(), subquery) =>
                    {
                        SubqueryPosition::WhereIn
                    }
                    ExprKind::Exists { subquery: own, .. }
                        if std::ptr::eq(own.as_ref(), subquery) =>
                    {
                        SubqueryPosition::WhereExists
                    }
                    _ => SubqueryPosition::WhereScalar,
                },
                PredicateLocation::JoinOn => SubqueryPosition::JoinOn,
                PredicateLocation::Having => SubqueryPosition::Having,
            };
            self.statement(subquery, Some(position));
        }

        let columns = self.columns(depth, expr, false);
        let connective = match group {
            Some(group) => Connective::Disjunct { group },
            None => Connective::Conjunct,
        };

        // column = column
        if let ExprKind::Binary {
            left,
            op: BinaryOp::Eq,
            right,
        } = &expr.unnested().kind
            && left.as_column().is_some()
            && right.as_column().is_some()
            && columns.len() == 2
        {
            let (a, b) = (&columns[0], &columns[1]);
            match (a.local_table_index(), b.local_table_index()) {
                (Some(x), Some(y))
                    if x != y
                        && connective.is_conjunct()
                        && !negated
                        && ctx.location != PredicateLocation::Having =>
                {
                    let clause = JoinClause {
                        text: expr.to_string(),
                        span: expr.span,
                        left: a.clone(),
                        right: b.clone(),
                        kind: ctx.join,
                        implicit: ctx.location == PredicateLocation::Where,
                    };
                    self.stack[depth].clauses.push(Clause::Join(clause));
                    return;
                }
                _ => {}
            }

            // Correlation predicate: the local side is what an index can serve
            let local = if a.is_local() && b.is_outer() {
                Some(a.clone())
            } else if b.is_local() && a.is_outer() {
                Some(b.clone())
            } else {
                None
            };
            let correlated = local.is_some();
            let clause = PredicateClause {
                text: expr.to_string(),
                span: expr.span,
                columns: columns.clone(),
                sargable: correlated && !negated,
                operator: if correlated {
                    PredicateOperator::Equality
                } else {
                    PredicateOperator::Other
                },
                target: local,
                connective,
                location: ctx.location,
                correlated,
                negated,
                wrapped_function: None,
                literal: None,
                like_pattern: None,
                subquery: None,
            };
            self.stack[depth].clauses.push(Clause::Predicate(clause));
            return;
        }

        let shape = classify(expr);
        let target = shape
            .target
            .and_then(|t| columns.iter().find(|c| c.span == t.span).cloned());
        let subquery_correlated = shape
            .subquery
            .and_then(|scope| self.done.get(&scope))
            .is_some_and(|scope| scope.correlated);
        let clause = PredicateClause {
            text: expr.to_string(),
            span: expr.span,
            correlated: subquery_correlated || columns.iter().any(ColumnRef::is_outer),
            columns,
            target,
            operator: shape.operator,
            connective,
            location: ctx.location,
            sargable: shape.sargable && !negated,
            negated: negated != shape.negated,
            wrapped_function: shape.wrapped,
            literal: shape.literal,
            like_pattern: shape.like_pattern,
            subquery: shape.subquery,
        };
        self.stack[depth].clauses.push(Clause::Predicate(clause));
    }

    // ---------------------------------------------------------------------
    // resolution
    // ---------------------------------------------------------------------

    fn columns(&mut self, depth: usize, expr: &Expr, allow_alias: bool) -> Vec<ColumnRef> {
        expr.columns()
            .into_iter()
            .filter_map(|column| {
                column
                    .as_column()
                    .map(|(qualifier, name)| (qualifier.cloned(), name.clone(), column.span))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(qualifier, name, span)| {
                self.resolve(depth, qualifier.as_ref(), &name, span, allow_alias)
            })
            .collect()
    }

    fn resolve(
        &mut self,
        depth: usize,
        qualifier: Option<&Ident>,
        name: &Ident,
        span: Span,
        allow_alias: bool,
    ) -> ColumnRef {
        let column = name.normalized();
        let qualifier = qualifier.map(Ident::normalized);

        if let Some(q) = &qualifier {
            for level in (0..=depth).rev() {
                if let Some(index) = find_qualified(&self.stack[level].tables, q) {
                    return self.bind(depth, level, index, qualifier.clone(), column, span);
                }
            }
            return self.unresolved(depth, qualifier, column, span, UnresolvedKind::Unknown);
        }

        if allow_alias && self.stack[depth].output_aliases.contains(&column) {
            return ColumnRef {
                qualifier: None,
                name: column,
                table: None,
                resolution: ColumnResolution::OutputAlias,
                span,
            };
        }

        for level in (0..=depth).rev() {
            match self.lookup(level, &column) {
                Lookup::Found(index) => {
                    return self.bind(depth, level, index, None, column, span);
                }
                Lookup::Ambiguous(candidates) => {
                    let warning = UnresolvedReferenceWarning {
                        scope: self.stack[depth].id,
                        column: column.clone(),
                        kind: UnresolvedKind::Ambiguous,
                        span,
                    };
                    self.stack[depth].warnings.push(warning);
                    return ColumnRef {
                        qualifier: None,
                        name: column,
                        table: None,
                        resolution: ColumnResolution::Ambiguous { candidates },
                        span,
                    };
                }
                Lookup::Missing => {}
            }
        }

        self.unresolved(depth, None, column, span, UnresolvedKind::Unknown)
    }

    fn bind(
        &mut self,
        depth: usize,
        level: usize,
        index: usize,
        qualifier: Option<String>,
        name: String,
        span: Span,
    ) -> ColumnRef {
        let table = self.stack[level].tables[index].name.clone();
        if level == depth {
            return ColumnRef {
                qualifier,
                name,
                table: Some(table),
                resolution: ColumnResolution::Local { table_index: index },
                span,
            };
        }

        let reference = ColumnRef {
            qualifier,
            name,
            table: Some(table),
            resolution: ColumnResolution::Outer {
                scope: self.stack[level].id,
                table_index: index,
            },
            span,
        };
        for frame in &mut self.stack[level + 1..=depth] {
            frame.correlated = true;
        }
        self.stack[depth].outer_references.push(reference.clone());
        reference
    }

    fn unresolved(
        &mut self,
        depth: usize,
        qualifier: Option<String>,
        name: String,
        span: Span,
        kind: UnresolvedKind,
    ) -> ColumnRef {
        let reference = ColumnRef {
            qualifier,
            name,
            table: None,
            resolution: ColumnResolution::Unresolved,
            span,
        };
        let warning = UnresolvedReferenceWarning {
            scope: self.stack[depth].id,
            column: reference.display_name(),
            kind,
            span,
        };
        tracing::debug!(%warning, "column reference left unresolved");
        self.stack[depth].warnings.push(warning);
        reference
    }

    /// Whether `table` is known to have `column`; `None` when unknown
    fn table_has_column(&self, table: &TableRef, column: &str) -> Option<bool> {
        match table.derived {
            Some(scope) => {
                let scope = self.done.get(&scope)?;
                let mut names = Vec::new();
                for projection in scope.projections() {
                    if projection.is_unbounded() {
                        return None;
                    }
                    names.extend(projection.output_name());
                }
                Some(names.contains(&column))
            }
            None => self
                .catalog
                .and_then(|catalog| catalog.table(&table.name))
                .map(|schema| schema.has_column(column)),
        }
    }

    fn lookup(&self, level: usize, column: &str) -> Lookup {
        let tables = &self.stack[level].tables;
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        for (index, table) in tables.iter().enumerate() {
            match self.table_has_column(table, column) {
                Some(true) => known.push(index),
                Some(false) => {}
                None => unknown.push(index),
            }
        }
        let names = |indices: &[usize]| {
            indices
                .iter()
                .map(|&i| tables[i].reference_name().to_string())
                .collect::<Vec<_>>()
        };
        match (known.as_slice(), unknown.as_slice()) {
            ([index], _) => Lookup::Found(*index),
            ([], [index]) => Lookup::Found(*index),
            ([], []) => Lookup::Missing,
            ([], many) => Lookup::Ambiguous(names(many)),
            (many, _) => Lookup::Ambiguous(names(many)),
        }
    }
}

fn find_qualified(tables: &[TableRef], qualifier: &str) -> Option<usize> {
    tables
        .iter()
        .position(|t| t.alias.as_deref() == Some(qualifier))
        .or_else(|| {
            tables
                .iter()
                .position(|t| t.alias.is_none() && t.name == qualifier)
        })
}

fn collect_chains(
    expr: &SetExpr,
    within: Option<SubqueryPosition>,
    out: &mut Vec<SetOperationClause>,
) {
    match expr {
        SetExpr::Select(_) => {}
        SetExpr::Nested { inner, .. } => collect_chains(inner, within, out),
        SetExpr::SetOperation { op, all, .. } => {
            let mut operands = Vec::new();
            flatten_chain(expr, *op, *all, &mut operands);
            let mut branches = Vec::new();
            for operand in &operands {
                let mut selects = Vec::new();
                operand.collect_selects(&mut selects);
                branches.push(SetBranch {
                    span: operand.span(),
                    scopes: selects.iter().map(|s| s.scope).collect(),
                });
                collect_chains(operand, within, out);
            }
            out.push(SetOperationClause {
                text: format!("{}{}", op.as_str(), if *all { " ALL" } else { "" }),
                span: expr.span(),
                op: *op,
                all: *all,
                branches,
                within,
            });
        }
    }
}

/// Operands of a left-deep chain of the same operator
fn flatten_chain<'a>(expr: &'a SetExpr, op: SetOperator, all: bool, out: &mut Vec<&'a SetExpr>) {
    match expr {
        SetExpr::SetOperation {
            op: this,
            all: this_all,
            left,
            right,
            ..
        } if *this == op && *this_all == all => {
            flatten_chain(left, op, all, out);
            flatten_chain(right, op, all, out);
        }
        other => out.push(other),
    }
}

fn literal_operand(expr: &Expr) -> Option<LiteralOperand> {
    match &expr.unnested().kind {
        ExprKind::Literal(literal) => {
            let kind = match literal {
                Literal::Number(_) => LiteralKind::Number,
                Literal::String(_) => LiteralKind::String,
                Literal::Boolean(_) => LiteralKind::Boolean,
                Literal::Null => LiteralKind::Null,
            };
            Some(LiteralOperand {
                kind,
                text: literal.to_string(),
            })
        }
        ExprKind::TypedString { .. } => Some(LiteralOperand {
            kind: LiteralKind::Temporal,
            text: expr.to_string(),
        }),
        ExprKind::Unary {
            op: UnaryOp::Minus | UnaryOp::Plus,
            expr: inner,
        } if matches!(inner.as_literal(), Some(Literal::Number(_))) => Some(LiteralOperand {
            kind: LiteralKind::Number,
            text: expr.to_string(),
        }),
        _ => None,
    }
}

fn is_aggregate(expr: &Expr) -> bool {
    match &expr.unnested().kind {
        ExprKind::Function { name, .. } => AGGREGATES.iter().any(|agg| name.matches(agg)),
        _ => false,
    }
}

/// Name of whatever wraps the column in a non-bare operand
fn wrapper_name(expr: &Expr) -> String {
    match &expr.unnested().kind {
        ExprKind::Function { name, .. } => name.value.to_ascii_uppercase(),
        ExprKind::Cast { .. } => "CAST".to_string(),
        ExprKind::Binary { .. } | ExprKind::Unary { .. } => "arithmetic".to_string(),
        ExprKind::Case { .. } => "CASE".to_string(),
        _ => "expression".to_string(),
    }
}

/// Classify the operand that carries the column: bare, aggregate or wrapped
fn operand_shape<'e>(operand: &'e Expr, operator: PredicateOperator, sargable: bool) -> Shape<'e> {
    if operand.as_column().is_some() {
        return Shape {
            operator,
            target: Some(operand.unnested()),
            sargable,
            ..Shape::other()
        };
    }
    if is_aggregate(operand) {
        return Shape::other();
    }
    match operand.columns().first().copied() {
        Some(column) => Shape {
            operator: PredicateOperator::FunctionWrapped,
            target: Some(column),
            wrapped: Some(wrapper_name(operand)),
            ..Shape::other()
        },
        None => Shape::other(),
    }
}

fn first_scope(statement: &Statement) -> Option<ScopeId> {
    statement.selects().first().map(|s| s.scope)
}

fn classify(expr: &Expr) -> Shape<'_> {
    match &expr.unnested().kind {
        ExprKind::Binary { left, op, right } if op.is_comparison() => {
            let (operand, value) = match (left.columns().is_empty(), right.columns().is_empty()) {
                (false, true) => (left.as_ref(), right.as_ref()),
                (true, false) => (right.as_ref(), left.as_ref()),
                _ => return Shape::other(),
            };
            let (operator, sargable) = match op {
                BinaryOp::Eq => (PredicateOperator::Equality, true),
                op if op.is_range() => (PredicateOperator::Range, true),
                _ => (PredicateOperator::Other, false),
            };
            Shape {
                literal: literal_operand(value),
                ..operand_shape(operand, operator, sargable)
            }
        }
        ExprKind::IsNull { expr, negated } => Shape {
            negated: *negated,
            ..operand_shape(expr, PredicateOperator::IsNull, !negated)
        },
        ExprKind::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let bounded = low.columns().is_empty() && high.columns().is_empty();
            Shape {
                negated: *negated,
                literal: literal_operand(low),
                ..operand_shape(expr, PredicateOperator::Range, bounded && !negated)
            }
        }
        ExprKind::InList {
            expr,
            list,
            negated,
        } => {
            let constant = list.iter().all(|item| item.columns().is_empty());
            Shape {
                negated: *negated,
                literal: list.first().and_then(literal_operand),
                ..operand_shape(expr, PredicateOperator::In, constant && !negated)
            }
        }
        ExprKind::InSubquery {
            expr,
            subquery,
            negated,
        } => Shape {
            negated: *negated,
            subquery: first_scope(subquery),
            ..operand_shape(expr, PredicateOperator::InSubquery, !negated)
        },
        ExprKind::Exists { subquery, negated } => Shape {
            operator: PredicateOperator::Exists,
            negated: *negated,
            subquery: first_scope(subquery),
            ..Shape::other()
        },
        ExprKind::Like {
            expr,
            pattern,
            negated,
            case_insensitive,
            ..
        } => {
            let like_pattern = match pattern.as_literal() {
                Some(Literal::String(p)) => Some(p.clone()),
                _ => None,
            };
            let prefix_bound = like_pattern
                .as_deref()
                .is_some_and(|p| !p.starts_with('%') && !p.starts_with('_'));
            Shape {
                negated: *negated,
                like_pattern,
                ..operand_shape(
                    expr,
                    PredicateOperator::Like,
                    prefix_bound && !case_insensitive && !negated,
                )
            }
        }
        _ => Shape::other(),
    }
}
