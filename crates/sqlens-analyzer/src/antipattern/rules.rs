//! Built-in anti-pattern rules

use super::*;
use crate::inventory::{
    ColumnResolution, Connective, LiteralValue, PredicateClause, PredicateLocation, PredicateOperator,
    ProjectionItem, ScopeInventory, SetOperationClause,
};
use crate::sql::SetOperator;
use indexmap::IndexMap;
use itertools::Itertools;

/// All built-in rules in id order
pub fn builtin_rules() -> Vec<Box<dyn AntiPatternRule>> {
    vec![
        Box::new(UnboundedProjection),
        Box::new(FunctionWrappedPredicate),
        Box::new(ImplicitCoercion),
        Box::new(CorrelatedSubquery),
        Box::new(LeadingWildcardLike),
        Box::new(DisjointUnion),
        Box::new(CartesianProduct),
        Box::new(OrAcrossColumns),
    ]
}

/// `SELECT *` and `SELECT t.*`
pub struct UnboundedProjection;

impl AntiPatternRule for UnboundedProjection {
    fn id(&self) -> &'static str {
        "AP001"
    }

    fn name(&self) -> &'static str {
        "Unbounded projection"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::Projection]
    }

    fn check(&self, inventory: &ClauseInventory, _ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in &inventory.scopes {
            // The select list of an EXISTS subquery is never materialised
            if scope.origin.subquery_position() == Some(SubqueryPosition::WhereExists) {
                continue;
            }
            for projection in scope.projections() {
                let qualifier = match &projection.item {
                    ProjectionItem::Wildcard => None,
                    ProjectionItem::QualifiedWildcard { qualifier } => Some(qualifier.clone()),
                    ProjectionItem::Expression { .. } => continue,
                };
                let tables: Vec<String> = match &qualifier {
                    Some(q) => vec![q.clone()],
                    None => scope
                        .tables
                        .iter()
                        .map(|t| t.reference_name().to_string())
                        .collect(),
                };
                let message = format!(
                    "`{}` reads every column of {}; list the columns the query needs",
                    projection.text,
                    tables.join(", ")
                );
                findings.push(Finding::new(
                    self.id(),
                    Severity::Warning,
                    scope.id,
                    projection.span,
                    message,
                    FindingPayload::UnboundedProjection { qualifier, tables },
                ));
            }
        }
        findings
    }
}

/// A function or arithmetic applied to a column inside a filter
pub struct FunctionWrappedPredicate;

impl AntiPatternRule for FunctionWrappedPredicate {
    fn id(&self) -> &'static str {
        "AP002"
    }

    fn name(&self) -> &'static str {
        "Function-wrapped predicate column"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::Predicate]
    }

    fn check(&self, inventory: &ClauseInventory, _ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in &inventory.scopes {
            for predicate in scope.predicates() {
                if predicate.operator != PredicateOperator::FunctionWrapped
                    || predicate.location == PredicateLocation::Having
                {
                    continue;
                }
                let Some(target) = &predicate.target else {
                    continue;
                };
                if matches!(target.resolution, ColumnResolution::OutputAlias) {
                    continue;
                }
                let column = target.display_name();
                let function = predicate
                    .wrapped_function
                    .clone()
                    .unwrap_or_else(|| "expression".to_string());
                let message = format!(
                    "`{}` applies {} to column `{}`, so an index on `{}` cannot be used",
                    predicate.text, function, column, target.name
                );
                findings.push(Finding::new(
                    self.id(),
                    Severity::Warning,
                    scope.id,
                    predicate.span,
                    message,
                    FindingPayload::FunctionWrappedColumn { column, function },
                ));
            }
        }
        findings
    }
}

/// A literal whose type differs from the column it is compared with
pub struct ImplicitCoercion;

impl ImplicitCoercion {
    fn column_type(
        predicate: &PredicateClause,
        ctx: &DetectionContext<'_>,
    ) -> Option<SemanticType> {
        let target = predicate.target.as_ref()?;
        let declared = match (&target.table, ctx.catalog) {
            (Some(table), Some(catalog)) => catalog.column_type(table, &target.name),
            _ => None,
        };
        declared.or_else(|| SemanticType::infer_from_name(&target.name))
    }

    fn mismatched(column: SemanticType, literal: LiteralKind) -> bool {
        match (column, literal) {
            (_, LiteralKind::Null) => false,
            (SemanticType::Integer | SemanticType::Numeric, kind) => kind != LiteralKind::Number,
            (SemanticType::Text, kind) => {
                matches!(kind, LiteralKind::Number | LiteralKind::Boolean)
            }
            (SemanticType::Temporal, kind) => {
                matches!(kind, LiteralKind::Number | LiteralKind::Boolean)
            }
            (SemanticType::Boolean, kind) => {
                matches!(kind, LiteralKind::String | LiteralKind::Temporal)
            }
        }
    }
}

impl AntiPatternRule for ImplicitCoercion {
    fn id(&self) -> &'static str {
        "AP003"
    }

    fn name(&self) -> &'static str {
        "Implicit type coercion"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::Predicate]
    }

    fn check(&self, inventory: &ClauseInventory, ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in &inventory.scopes {
            for predicate in scope.predicates() {
                if !matches!(
                    predicate.operator,
                    PredicateOperator::Equality | PredicateOperator::Range | PredicateOperator::In
                ) {
                    continue;
                }
                let (Some(target), Some(literal)) = (&predicate.target, &predicate.literal) else {
                    continue;
                };
                let Some(column_type) = Self::column_type(predicate, ctx) else {
                    continue;
                };
                if !Self::mismatched(column_type, literal.kind) {
                    continue;
                }
                let column = target.display_name();
                let message = format!(
                    "`{}` is {} but is compared with {} literal {}; the implicit conversion can prevent index use",
                    column,
                    column_type.as_str(),
                    literal_kind_name(literal.kind),
                    literal.text
                );
                findings.push(Finding::new(
                    self.id(),
                    Severity::Warning,
                    scope.id,
                    predicate.span,
                    message,
                    FindingPayload::ImplicitCoercion {
                        column,
                        column_type,
                        literal_kind: literal.kind,
                        literal: literal.text.clone(),
                    },
                ));
            }
        }
        findings
    }
}

fn literal_kind_name(kind: LiteralKind) -> &'static str {
    match kind {
        LiteralKind::Number => "a numeric",
        LiteralKind::String => "a string",
        LiteralKind::Boolean => "a boolean",
        LiteralKind::Null => "a NULL",
        LiteralKind::Temporal => "a date/time",
    }
}

/// A nested SELECT that references columns of an enclosing scope
pub struct CorrelatedSubquery;

impl AntiPatternRule for CorrelatedSubquery {
    fn id(&self) -> &'static str {
        "AP004"
    }

    fn name(&self) -> &'static str {
        "Correlated subquery"
    }

    fn check(&self, inventory: &ClauseInventory, ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in inventory.scopes.iter().filter(|s| s.correlated) {
            let position = scope.origin.subquery_position();
            let severity = match position {
                Some(p) if p.is_where_membership() => ctx.config.correlated_in_where,
                _ => ctx.config.correlated_elsewhere,
            };
            let outer_columns: Vec<String> = scope
                .outer_references
                .iter()
                .map(|c| c.display_name())
                .unique()
                .collect();
            let message = match position {
                Some(p) if p.is_where_membership() => format!(
                    "Subquery in {} references the outer query{} and is re-evaluated for every outer row",
                    position_label(p),
                    column_list(&outer_columns)
                ),
                Some(p) => format!(
                    "Subquery in {} references the outer query{}",
                    position_label(p),
                    column_list(&outer_columns)
                ),
                None => format!(
                    "Subquery references the outer query{}",
                    column_list(&outer_columns)
                ),
            };
            findings.push(Finding::new(
                self.id(),
                severity,
                scope.id,
                scope.span,
                message,
                FindingPayload::CorrelatedSubquery {
                    subquery: scope.id,
                    position,
                    outer_columns,
                },
            ));
        }
        findings
    }
}

fn position_label(position: SubqueryPosition) -> &'static str {
    match position {
        SubqueryPosition::WhereIn => "WHERE ... IN",
        SubqueryPosition::WhereExists => "WHERE EXISTS",
        SubqueryPosition::WhereScalar => "WHERE",
        SubqueryPosition::Projection => "the select list",
        SubqueryPosition::From => "FROM",
        SubqueryPosition::GroupBy => "GROUP BY",
        SubqueryPosition::Having => "HAVING",
        SubqueryPosition::JoinOn => "a join condition",
        SubqueryPosition::OrderBy => "ORDER BY",
    }
}

fn column_list(columns: &[String]) -> String {
    if columns.is_empty() {
        String::new()
    } else {
        format!(" ({})", columns.join(", "))
    }
}

/// `LIKE '%...'` cannot use a b-tree index
pub struct LeadingWildcardLike;

impl AntiPatternRule for LeadingWildcardLike {
    fn id(&self) -> &'static str {
        "AP005"
    }

    fn name(&self) -> &'static str {
        "Leading-wildcard LIKE"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::Predicate]
    }

    fn check(&self, inventory: &ClauseInventory, _ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in &inventory.scopes {
            for predicate in scope.predicates() {
                let Some(pattern) = &predicate.like_pattern else {
                    continue;
                };
                if !pattern.starts_with('%') && !pattern.starts_with('_') {
                    continue;
                }
                let column = predicate.target.as_ref().map(|c| c.display_name());
                let message = format!(
                    "`{}` starts with a wildcard, so every row must be scanned",
                    predicate.text
                );
                findings.push(Finding::new(
                    self.id(),
                    Severity::Warning,
                    scope.id,
                    predicate.span,
                    message,
                    FindingPayload::LeadingWildcard {
                        column,
                        pattern: pattern.clone(),
                    },
                ));
            }
        }
        findings
    }
}

/// UNION whose de-duplication cannot change the result
pub struct DisjointUnion;

impl DisjointUnion {
    /// Scope of a branch made of exactly one SELECT block
    fn single_scopes<'i>(
        inventory: &'i ClauseInventory,
        chain: &SetOperationClause,
    ) -> Option<Vec<&'i ScopeInventory>> {
        chain
            .branches
            .iter()
            .map(|branch| match branch.scopes.as_slice() {
                [scope] => inventory.scope(*scope),
                _ => None,
            })
            .collect()
    }

    /// Literal values are pairwise distinct and all of one kind
    fn pairwise_distinct(values: &[LiteralValue]) -> bool {
        values
            .iter()
            .tuple_combinations()
            .all(|(a, b)| std::mem::discriminant(a) == std::mem::discriminant(b) && a != b)
    }

    fn literal_discriminator(scopes: &[&ScopeInventory]) -> Option<DisjointnessBasis> {
        let width = scopes.iter().map(|s| s.projections().count()).min()?;
        (0..width).find_map(|position| {
            let values: Option<Vec<LiteralValue>> = scopes
                .iter()
                .map(|scope| {
                    let projection = scope.projections().find(|p| p.position == position)?;
                    match &projection.item {
                        ProjectionItem::Expression {
                            literal: Some(literal),
                            ..
                        } => literal.value(),
                        _ => None,
                    }
                })
                .collect();
            Self::pairwise_distinct(&values?)
                .then_some(DisjointnessBasis::LiteralDiscriminator { position })
        })
    }

    /// Each branch projects a column at the same position and pins it with `column = literal`
    fn distinct_equality_literals(scopes: &[&ScopeInventory]) -> Option<DisjointnessBasis> {
        let width = scopes.iter().map(|s| s.projections().count()).min()?;
        (0..width).find_map(|position| {
            let pinned: Option<Vec<(String, LiteralValue)>> = scopes
                .iter()
                .map(|scope| {
                    let projection = scope.projections().find(|p| p.position == position)?;
                    if !matches!(
                        projection.item,
                        ProjectionItem::Expression {
                            bare_column: true,
                            ..
                        }
                    ) {
                        return None;
                    }
                    let [column] = projection.columns.as_slice() else {
                        return None;
                    };
                    let value = scope.predicates().find_map(|p| {
                        let target = p.target.as_ref()?;
                        let literal = p.literal.as_ref()?;
                        (p.operator == PredicateOperator::Equality
                            && p.connective.is_conjunct()
                            && p.location == PredicateLocation::Where
                            && !p.negated
                            && p.wrapped_function.is_none()
                            && target.name == column.name
                            && target.table == column.table)
                            .then(|| literal.value())
                            .flatten()
                    })?;
                    Some((column.name.clone(), value))
                })
                .collect();
            let pinned = pinned?;
            let column = pinned.first()?.0.clone();
            let same_column = pinned.iter().all(|(name, _)| *name == column);
            let values: Vec<LiteralValue> = pinned.into_iter().map(|(_, value)| value).collect();
            (same_column && Self::pairwise_distinct(&values))
                .then_some(DisjointnessBasis::DistinctEqualityLiterals { column })
        })
    }

    fn distinct_sources(
        inventory: &ClauseInventory,
        chain: &SetOperationClause,
    ) -> Option<DisjointnessBasis> {
        let mut seen: Vec<String> = Vec::new();
        for branch in &chain.branches {
            let tables: Vec<String> = branch
                .scopes
                .iter()
                .filter_map(|id| inventory.scope(*id))
                .flat_map(|scope| scope.base_tables().map(|t| t.qualified_name()))
                .unique()
                .collect();
            if tables.is_empty() || tables.iter().any(|t| seen.contains(t)) {
                return None;
            }
            seen.extend(tables);
        }
        Some(DisjointnessBasis::DistinctSources { tables: seen })
    }

    /// Strongest available basis for the chain
    pub fn basis(
        inventory: &ClauseInventory,
        chain: &SetOperationClause,
        config: &DetectorConfig,
    ) -> Option<DisjointnessBasis> {
        if let Some(scopes) = Self::single_scopes(inventory, chain) {
            if let Some(basis) = Self::literal_discriminator(&scopes) {
                return Some(basis);
            }
            if let Some(basis) = Self::distinct_equality_literals(&scopes) {
                return Some(basis);
            }
        }
        if chain.within.is_some_and(|p| p.is_where_membership()) {
            return Some(DisjointnessBasis::MembershipSubquery);
        }
        if config.assume_distinct_sources {
            return Self::distinct_sources(inventory, chain);
        }
        None
    }
}

impl AntiPatternRule for DisjointUnion {
    fn id(&self) -> &'static str {
        "AP006"
    }

    fn name(&self) -> &'static str {
        "UNION over disjoint branches"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::SetOperation]
    }

    fn check(&self, inventory: &ClauseInventory, ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in &inventory.scopes {
            for chain in scope.set_operations() {
                if chain.op != SetOperator::Union || chain.all {
                    continue;
                }
                let Some(basis) = Self::basis(inventory, chain, ctx.config) else {
                    continue;
                };
                let branches_distinct = chain.branches.iter().all(|branch| {
                    branch
                        .scopes
                        .iter()
                        .filter_map(|id| inventory.scope(*id))
                        .all(|s| s.distinct)
                });
                let message = format!(
                    "UNION of {} branches removes duplicates that cannot occur: {}; UNION ALL avoids the sort",
                    chain.branches.len(),
                    basis.describe()
                );
                findings.push(Finding::new(
                    self.id(),
                    Severity::Info,
                    scope.id,
                    chain.span,
                    message,
                    FindingPayload::DisjointUnion {
                        basis,
                        branches: chain.branches.len(),
                        branches_distinct,
                    },
                ));
            }
        }
        findings
    }
}

/// Tables in one FROM with nothing relating them
pub struct CartesianProduct;

impl CartesianProduct {
    /// Number of connected table groups in the scope's join graph
    fn components(scope: &ScopeInventory) -> usize {
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        fn union(parent: &mut [usize], a: usize, b: usize) {
            if a < parent.len() && b < parent.len() {
                let (ra, rb) = (find(parent, a), find(parent, b));
                parent[ra] = rb;
            }
        }

        let mut parent: Vec<usize> = (0..scope.tables.len()).collect();

        // A joined table, explicit CROSS JOIN included, is related to what
        // precedes it in the same FROM item
        for (index, table) in scope.tables.iter().enumerate().skip(1) {
            if table.join.is_some() && scope.tables[index - 1].from_item == table.from_item {
                union(&mut parent, index - 1, index);
            }
        }
        for join in scope.joins() {
            if let (Some(a), Some(b)) = (join.left.local_table_index(), join.right.local_table_index()) {
                union(&mut parent, a, b);
            }
        }
        for predicate in scope.predicates() {
            let tables: Vec<usize> = predicate
                .columns
                .iter()
                .filter_map(|c| c.local_table_index())
                .unique()
                .collect();
            for pair in tables.windows(2) {
                union(&mut parent, pair[0], pair[1]);
            }
        }

        (0..scope.tables.len())
            .map(|i| find(&mut parent, i))
            .unique()
            .count()
    }
}

impl AntiPatternRule for CartesianProduct {
    fn id(&self) -> &'static str {
        "AP007"
    }

    fn name(&self) -> &'static str {
        "Cartesian product"
    }

    fn check(&self, inventory: &ClauseInventory, _ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in inventory.scopes.iter().filter(|s| s.tables.len() > 1) {
            let components = Self::components(scope);
            if components < 2 {
                continue;
            }
            let tables: Vec<String> = scope
                .tables
                .iter()
                .map(|t| t.reference_name().to_string())
                .collect();
            let span = scope
                .tables
                .iter()
                .map(|t| t.span)
                .reduce(Span::merge)
                .unwrap_or(scope.span);
            let message = format!(
                "No join condition relates {} table groups in FROM ({}); every row of one is paired with every row of the other",
                components,
                tables.join(", ")
            );
            findings.push(Finding::new(
                self.id(),
                Severity::Warning,
                scope.id,
                span,
                message,
                FindingPayload::CartesianProduct { tables, components },
            ));
        }
        findings
    }
}

/// `a = 1 OR b = 2`: no single index serves both sides
pub struct OrAcrossColumns;

impl AntiPatternRule for OrAcrossColumns {
    fn id(&self) -> &'static str {
        "AP008"
    }

    fn name(&self) -> &'static str {
        "OR across different columns"
    }

    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[ClauseKind::Predicate]
    }

    fn check(&self, inventory: &ClauseInventory, _ctx: &DetectionContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for scope in &inventory.scopes {
            let mut groups: IndexMap<usize, (Span, Vec<String>)> = IndexMap::new();
            for predicate in scope.predicates() {
                let Connective::Disjunct { group } = predicate.connective else {
                    continue;
                };
                if predicate.location == PredicateLocation::Having {
                    continue;
                }
                let entry = groups
                    .entry(group)
                    .or_insert_with(|| (predicate.span, Vec::new()));
                entry.0 = entry.0.merge(predicate.span);
                let column = predicate
                    .target
                    .as_ref()
                    .or_else(|| predicate.columns.first())
                    .map(|c| c.display_name());
                if let Some(column) = column
                    && !entry.1.contains(&column)
                {
                    entry.1.push(column);
                }
            }
            for (group, (span, columns)) in groups {
                if columns.len() < 2 {
                    continue;
                }
                let message = format!(
                    "OR across {} cannot be answered from one index; consider UNION ALL of indexed branches",
                    columns.join(", ")
                );
                findings.push(Finding::new(
                    self.id(),
                    Severity::Info,
                    scope.id,
                    span,
                    message,
                    FindingPayload::OrAcrossColumns { group, columns },
                ));
            }
        }
        findings
    }
}
