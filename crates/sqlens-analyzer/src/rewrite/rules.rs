//! Built-in rewrite rules

use super::{
    EquivalenceClass, EquivalencePreconditionUnmet, RewriteContext, RewriteRule,
    RewriteSuggestion,
};
use crate::antipattern::{DisjointnessBasis, Finding, FindingPayload};
use crate::inventory::{
    PredicateClause, PredicateLocation, PredicateOperator, ProjectionItem, ScopeInventory,
    ScopeOrigin,
};
use crate::sql::{
    BinaryOp, Expr, ExprKind, Ident, Join, JoinConstraint, JoinKind, SelectItem, SetExpr,
    SetOperator, Span, Statement, TableFactor, visit_statements_mut,
};
use itertools::Itertools;

/// Creates the built-in rewrite registry
pub fn builtin_rewrites() -> Vec<Box<dyn RewriteRule>> {
    vec![Box::new(UnionToUnionAll), Box::new(InSubqueryToJoin)]
}

/// UNION → UNION ALL for chains the detector proved (or assumed) disjoint
pub struct UnionToUnionAll;

impl UnionToUnionAll {
    fn precondition(basis: &DisjointnessBasis, branches_distinct: bool) -> String {
        if matches!(basis, DisjointnessBasis::MembershipSubquery) {
            return format!("Holds unconditionally: {}.", basis.describe());
        }
        let per_branch = if branches_distinct {
            "every branch is SELECT DISTINCT, so no branch repeats a row"
        } else {
            "no branch may return the same row twice (add DISTINCT to a branch that can)"
        };
        format!(
            "No row may be produced by more than one branch ({}), and {}.",
            basis.describe(),
            per_branch
        )
    }

    fn apply(
        &self,
        ctx: &RewriteContext<'_>,
        finding: &Finding,
        basis: &DisjointnessBasis,
        branches: usize,
        branches_distinct: bool,
    ) -> Result<RewriteSuggestion, EquivalencePreconditionUnmet> {
        let mut rewritten = ctx.statement.clone();
        let mut edited = None;
        visit_statements_mut(&mut rewritten, &mut |statement| {
            if edited.is_none() {
                edited = union_all_chain(&mut statement.body, finding.span);
            }
        });
        let Some((original, replacement)) = edited else {
            return Err(EquivalencePreconditionUnmet::new(
                self.id(),
                finding.span,
                "no UNION chain at the flagged location",
            ));
        };

        let strict = matches!(basis, DisjointnessBasis::MembershipSubquery)
            || (basis.is_proven() && branches_distinct);
        let equivalence = if strict {
            EquivalenceClass::Strict
        } else {
            EquivalenceClass::AssumptionDependent
        };
        let mut score = 1.0 + 0.5 * branches.saturating_sub(1) as f64;
        if !strict {
            score *= 0.75;
        }

        Ok(RewriteSuggestion {
            rule: self.id().to_string(),
            title: "Replace UNION with UNION ALL".to_string(),
            span: finding.span,
            original,
            replacement,
            rewritten_sql: rewritten.to_string(),
            equivalence,
            precondition: Self::precondition(basis, branches_distinct),
            rationale: "UNION removes duplicates with a sort or hash over the combined result; \
                        UNION ALL concatenates the branches and skips that step."
                .to_string(),
            finding: Some(finding.rule.clone()),
            score,
        })
    }
}

impl RewriteRule for UnionToUnionAll {
    fn id(&self) -> &'static str {
        "RW001"
    }

    fn name(&self) -> &'static str {
        "UNION to UNION ALL"
    }

    fn propose(
        &self,
        ctx: &RewriteContext<'_>,
    ) -> Vec<Result<RewriteSuggestion, EquivalencePreconditionUnmet>> {
        ctx.findings
            .iter()
            .filter(|finding| finding.rule == "AP006")
            .filter_map(|finding| match &finding.payload {
                FindingPayload::DisjointUnion {
                    basis,
                    branches,
                    branches_distinct,
                } => Some(self.apply(ctx, finding, basis, *branches, *branches_distinct)),
                _ => None,
            })
            .collect()
    }
}

/// Locates the UNION chain whose top node has span `target` and turns it into
/// UNION ALL, returning the chain's text before and after
fn union_all_chain(expr: &mut SetExpr, target: Span) -> Option<(String, String)> {
    let hit = matches!(
        *expr,
        SetExpr::SetOperation {
            op: SetOperator::Union,
            all: false,
            span,
            ..
        } if span == target
    );
    if hit {
        let original = expr.to_string();
        set_chain_all(expr);
        return Some((original, expr.to_string()));
    }
    match expr {
        SetExpr::Select(_) => None,
        SetExpr::Nested { inner, .. } => union_all_chain(inner, target),
        SetExpr::SetOperation { left, right, .. } => {
            union_all_chain(left, target).or_else(|| union_all_chain(right, target))
        }
    }
}

fn set_chain_all(expr: &mut SetExpr) {
    if let SetExpr::SetOperation {
        op: SetOperator::Union,
        all,
        left,
        right,
        ..
    } = expr
        && !*all
    {
        *all = true;
        set_chain_all(left);
        set_chain_all(right);
    }
}

/// `x IN (SELECT col ...)` → `INNER JOIN (SELECT DISTINCT col ...) AS sq ON x = sq.col`
pub struct InSubqueryToJoin;

impl InSubqueryToJoin {
    /// Alias for the derived table that no table of the scope already uses
    fn fresh_alias(scope: &ScopeInventory) -> String {
        let taken = |name: &str| {
            scope
                .tables
                .iter()
                .any(|t| t.reference_name().eq_ignore_ascii_case(name))
        };
        if !taken("sq") {
            return "sq".to_string();
        }
        (2..)
            .map(|n| format!("sq{}", n))
            .find(|name| !taken(name.as_str()))
            .unwrap_or_else(|| "sq_join".to_string())
    }

    fn apply(
        &self,
        ctx: &RewriteContext<'_>,
        scope: &ScopeInventory,
        predicate: &PredicateClause,
    ) -> Result<RewriteSuggestion, EquivalencePreconditionUnmet> {
        let unmet =
            |reason: &str| EquivalencePreconditionUnmet::new(self.id(), predicate.span, reason);

        if !predicate.connective.is_conjunct() {
            return Err(unmet("the IN test is part of an OR group"));
        }
        if predicate.negated {
            return Err(unmet(
                "NOT IN rejects every row once the subquery yields NULL; a join cannot express that",
            ));
        }
        let sub = predicate
            .subquery
            .and_then(|id| ctx.inventory.scope(id))
            .ok_or_else(|| unmet("the subquery was not extracted"))?;
        if !matches!(sub.origin, ScopeOrigin::Subquery { .. }) {
            return Err(unmet("the subquery is a compound statement"));
        }
        if predicate.correlated || sub.correlated {
            return Err(unmet("the subquery is correlated"));
        }

        let from_items: Vec<usize> = predicate
            .columns
            .iter()
            .map(|column| {
                column
                    .local_table_index()
                    .and_then(|index| scope.table(index))
                    .map(|table| table.from_item)
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| unmet("the tested expression reaches outside the query's own tables"))?
            .into_iter()
            .unique()
            .collect();
        let from_item = match from_items.as_slice() {
            [single] => *single,
            [] => return Err(unmet("the tested expression references no column")),
            _ => return Err(unmet("the tested expression spans several FROM items")),
        };
        if scope
            .projections()
            .any(|p| matches!(p.item, ProjectionItem::Wildcard))
        {
            return Err(unmet("SELECT * would also return the joined subquery's column"));
        }

        let select = ctx
            .statement
            .find_select(scope.id)
            .ok_or_else(|| unmet("the outer SELECT was not found"))?;
        let (operand, subquery) = select
            .selection
            .as_ref()
            .and_then(|selection| find_in_subquery(selection, predicate.span))
            .ok_or_else(|| unmet("the IN test is not a top-level WHERE conjunct"))?;
        if !subquery.order_by.is_empty() || subquery.limit.is_some() || subquery.offset.is_some() {
            return Err(unmet("the subquery has LIMIT, OFFSET or ORDER BY"));
        }
        let SetExpr::Select(inner) = subquery.body.unnested() else {
            return Err(unmet("the subquery is a compound statement"));
        };
        let [SelectItem::Expr {
            expr: projected,
            alias,
        }] = inner.projection.as_slice()
        else {
            return Err(unmet("the subquery must project exactly one column"));
        };
        let Some((_, column)) = projected.as_column() else {
            return Err(unmet("the subquery projects an expression, not a column"));
        };

        let alias_name = Self::fresh_alias(scope);
        let output = alias.as_ref().unwrap_or(column);
        let collides = scope
            .clauses
            .iter()
            .flat_map(|clause| clause.columns())
            .any(|c| c.qualifier.is_none() && c.name.eq_ignore_ascii_case(&output.normalized()));
        let exposed = if collides {
            Ident::new(format!("{}_{}", alias_name, output.normalized()))
        } else {
            output.clone()
        };

        let mut derived = subquery.clone();
        if let Some(block) = derived.find_select_mut(inner.scope) {
            block.distinct = true;
            if collides && let Some(SelectItem::Expr { alias, .. }) = block.projection.first_mut() {
                *alias = Some(exposed.clone());
            }
        }

        let on = Expr::new(
            ExprKind::Binary {
                left: Box::new(operand.clone()),
                op: BinaryOp::Eq,
                right: Box::new(Expr::new(
                    ExprKind::Column {
                        qualifier: Some(Ident::new(alias_name.clone())),
                        name: exposed,
                    },
                    Span::default(),
                )),
            },
            Span::default(),
        );
        let join = Join {
            kind: JoinKind::Inner,
            relation: TableFactor::Derived {
                subquery: Box::new(derived),
                alias: Some(Ident::new(alias_name)),
                span: Span::default(),
            },
            constraint: JoinConstraint::On(on),
            span: Span::default(),
        };

        let mut rewritten = ctx.statement.clone();
        let target = rewritten
            .find_select_mut(scope.id)
            .ok_or_else(|| unmet("the outer SELECT was not found"))?;
        let mut removed = false;
        target.selection = target
            .selection
            .take()
            .and_then(|selection| remove_conjunct(selection, predicate.span, &mut removed));
        if !removed {
            return Err(unmet("the IN test is not a top-level WHERE conjunct"));
        }
        target
            .from
            .get_mut(from_item)
            .ok_or_else(|| unmet("the FROM item of the tested column was not found"))?
            .joins
            .push(join);
        let replacement = target.to_string();

        Ok(RewriteSuggestion {
            rule: self.id().to_string(),
            title: "Rewrite IN (subquery) as a join".to_string(),
            span: select.span,
            original: select.to_string(),
            replacement,
            rewritten_sql: rewritten.to_string(),
            equivalence: EquivalenceClass::Strict,
            precondition: "The subquery is uncorrelated and unbounded (no LIMIT, OFFSET or \
                           ORDER BY), and the IN test is a plain conjunct of WHERE."
                .to_string(),
            rationale: format!(
                "A join lets the planner reorder the tables and drive the lookup from an index. \
                 The derived table must stay SELECT DISTINCT: each outer row then matches at \
                 most one row of `{}`, which preserves the row multiplicity of the IN test.",
                predicate.target.as_ref().map_or_else(
                    || operand.to_string(),
                    |target| target.display_name()
                )
            ),
            finding: None,
            score: 2.0,
        })
    }
}

impl RewriteRule for InSubqueryToJoin {
    fn id(&self) -> &'static str {
        "RW002"
    }

    fn name(&self) -> &'static str {
        "IN subquery to JOIN"
    }

    fn propose(
        &self,
        ctx: &RewriteContext<'_>,
    ) -> Vec<Result<RewriteSuggestion, EquivalencePreconditionUnmet>> {
        let mut outcomes = Vec::new();
        for scope in &ctx.inventory.scopes {
            for predicate in scope.predicates() {
                if predicate.operator == PredicateOperator::InSubquery
                    && predicate.location == PredicateLocation::Where
                {
                    outcomes.push(self.apply(ctx, scope, predicate));
                }
            }
        }
        outcomes
    }
}

/// The `IN (subquery)` atom at `span`, reachable from the WHERE root through AND only
fn find_in_subquery(expr: &Expr, span: Span) -> Option<(&Expr, &Statement)> {
    match &expr.kind {
        ExprKind::InSubquery {
            expr: operand,
            subquery,
            negated: false,
        } if expr.span == span => Some((operand.as_ref(), subquery.as_ref())),
        ExprKind::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => find_in_subquery(left, span).or_else(|| find_in_subquery(right, span)),
        ExprKind::Nested(inner) => find_in_subquery(inner, span),
        _ => None,
    }
}

/// Drops the conjunct at `target` from an AND tree; `None` when nothing is left
fn remove_conjunct(expr: Expr, target: Span, removed: &mut bool) -> Option<Expr> {
    if expr.span == target {
        *removed = true;
        return None;
    }
    let Expr { kind, span } = expr;
    match kind {
        ExprKind::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            let left = remove_conjunct(*left, target, removed);
            let right = remove_conjunct(*right, target, removed);
            match (left, right) {
                (Some(left), Some(right)) => Some(Expr::new(
                    ExprKind::Binary {
                        left: Box::new(left),
                        op: BinaryOp::And,
                        right: Box::new(right),
                    },
                    span,
                )),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            }
        }
        ExprKind::Nested(inner) => remove_conjunct(*inner, target, removed)
            .map(|inner| Expr::new(ExprKind::Nested(Box::new(inner)), span)),
        kind => Some(Expr::new(kind, span)),
    }
}

