//! Index Advisor
//!
//! Derives candidate indexes from a [`ClauseInventory`]. Columns of each base
//! table are ranked by how they are used (equality, then range, join,
//! ORDER BY and GROUP BY); single-column candidates are produced for every
//! usable column and composites are led by each column with the remaining
//! ones following in priority order.
//!
//! Columns that are only reachable through an OR or through a non-sargable
//! predicate still surface, as low-confidence single-column candidates.

use crate::antipattern::Finding;
use crate::inventory::{
    ClauseInventory, ClauseKind, ColumnRef, PredicateLocation, PredicateOperator, ScopeInventory,
    SubqueryPosition, TableRef,
};
use crate::sql::{ScopeId, Span};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Single,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    /// Only OR-disjuncts or non-sargable predicates use the column
    Low,
}

/// Usage class of a column, in index column priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnTier {
    Equality,
    Range,
    Join,
    OrderBy,
    GroupBy,
}

/// Something that justified an index candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Clause {
        scope: ScopeId,
        clause: ClauseKind,
        span: Span,
        text: String,
    },
    Finding {
        rule: String,
        span: Span,
    },
}

impl Provenance {
    pub fn span(&self) -> Span {
        match self {
            Self::Clause { span, .. } | Self::Finding { span, .. } => *span,
        }
    }
}

/// A proposed index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCandidate {
    pub table: String,
    pub schema: Option<String>,
    /// Ordered index columns; the first one is the leading column
    pub columns: Vec<String>,
    pub kind: IndexKind,
    pub confidence: Confidence,
    pub provenance: Vec<Provenance>,
    /// Raw heuristic score, higher is better
    pub score: f64,
    /// Rendered `CREATE INDEX` statement; never executed against production
    pub ddl: String,
    pub reason: String,
}

impl IndexCandidate {
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }

    pub fn name(&self) -> String {
        format!(
            "idx_{}_{}",
            ident_slug(&self.table),
            self.columns.iter().map(|c| ident_slug(c)).join("_")
        )
    }

    pub fn leading_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    /// Distinct clauses the candidate serves
    pub fn clause_count(&self) -> usize {
        self.provenance
            .iter()
            .filter(|p| matches!(p, Provenance::Clause { .. }))
            .count()
    }

    fn render_ddl(&mut self) {
        self.ddl = format!(
            "CREATE INDEX {} ON {} ({});",
            self.name(),
            self.qualified_table(),
            self.columns.join(", ")
        );
    }
}

fn ident_slug(ident: &str) -> String {
    ident
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Configuration for the index advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Maximum number of columns in a composite candidate
    pub max_composite_width: usize,
    /// Weight per distinct clause the candidate satisfies
    pub clause_weight: f64,
    pub equality_weight: f64,
    pub range_weight: f64,
    pub join_weight: f64,
    pub order_weight: f64,
    pub group_weight: f64,
    /// Multiplier applied to low-confidence candidates
    pub low_confidence_factor: f64,
    /// Multiplier applied for each adjacent pair of columns out of priority order
    pub inversion_decay: f64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            max_composite_width: 3,
            clause_weight: 1.0,
            equality_weight: 3.0,
            range_weight: 1.5,
            join_weight: 2.0,
            order_weight: 1.0,
            group_weight: 0.5,
            low_confidence_factor: 0.25,
            inversion_decay: 0.9,
        }
    }
}

impl AdvisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the composite width; values below 1 are raised to 1
    pub fn with_max_composite_width(mut self, width: usize) -> Self {
        self.max_composite_width = width.max(1);
        self
    }

    pub fn with_low_confidence_factor(mut self, factor: f64) -> Self {
        self.low_confidence_factor = factor.clamp(0.0, 1.0);
        self
    }

    fn tier_weight(&self, tier: ColumnTier) -> f64 {
        match tier {
            ColumnTier::Equality => self.equality_weight,
            ColumnTier::Range => self.range_weight,
            ColumnTier::Join => self.join_weight,
            ColumnTier::OrderBy => self.order_weight,
            ColumnTier::GroupBy => self.group_weight,
        }
    }
}

/// How one column of one table reference is used
#[derive(Debug, Default)]
struct ColumnUsage {
    /// Best tier among high-confidence uses
    tier: Option<ColumnTier>,
    /// Order of first high-confidence use
    first_seen: usize,
    clauses: Vec<Provenance>,
    /// Clauses that only justify a low-confidence candidate
    weak_clauses: Vec<Provenance>,
}

impl ColumnUsage {
    fn strong(&mut self, tier: ColumnTier, order: usize, clause: Provenance) {
        if self.tier.is_none() {
            self.first_seen = order;
        }
        self.tier = Some(self.tier.map_or(tier, |t| t.min(tier)));
        if !self.clauses.contains(&clause) {
            self.clauses.push(clause);
        }
    }

    fn weak(&mut self, clause: Provenance) {
        if !self.weak_clauses.contains(&clause) {
            self.weak_clauses.push(clause);
        }
    }
}

/// Derives index candidates from clause inventories
#[derive(Debug, Clone, Default)]
pub struct IndexAdvisor {
    config: AdvisorConfig,
}

impl IndexAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AdvisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Candidates sorted by score desc, then table, then columns
    pub fn recommend(&self, inventory: &ClauseInventory) -> Vec<IndexCandidate> {
        let mut merged: IndexMap<(Option<String>, String, Vec<String>), IndexCandidate> =
            IndexMap::new();

        for scope in &inventory.scopes {
            for (table_index, table) in scope.tables.iter().enumerate() {
                if !table.is_base_table() {
                    continue;
                }
                let usage = collect_usage(scope, table_index);
                for candidate in self.candidates_for(table, &usage) {
                    let key = (
                        candidate.schema.clone(),
                        candidate.table.clone(),
                        candidate.columns.clone(),
                    );
                    match merged.get_mut(&key) {
                        Some(existing) => self.merge(existing, candidate),
                        None => {
                            merged.insert(key, candidate);
                        }
                    }
                }
            }
        }

        let mut candidates: Vec<IndexCandidate> = merged.into_values().collect();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.table.cmp(&b.table))
                .then_with(|| a.columns.cmp(&b.columns))
        });
        tracing::debug!(candidates = candidates.len(), "index advice computed");
        candidates
    }

    fn candidates_for(
        &self,
        table: &TableRef,
        usage: &IndexMap<String, ColumnUsage>,
    ) -> Vec<IndexCandidate> {
        let mut priority: Vec<(&String, &ColumnUsage, ColumnTier)> = usage
            .iter()
            .filter_map(|(name, u)| u.tier.map(|tier| (name, u, tier)))
            .collect();
        priority.sort_by_key(|(_, u, tier)| (*tier, u.first_seen));

        let mut out = Vec::new();
        let width = self.config.max_composite_width.max(1);

        for lead_index in 0..priority.len() {
            out.push(self.build(table, &priority, &[lead_index], Confidence::High));
            if width > 1 && priority.len() > 1 {
                let mut members = vec![lead_index];
                members.extend(
                    (0..priority.len())
                        .filter(|&i| i != lead_index)
                        .take(width - 1),
                );
                out.push(self.build(table, &priority, &members, Confidence::High));
            }
        }

        for (name, column_usage) in usage {
            if column_usage.tier.is_some() || column_usage.weak_clauses.is_empty() {
                continue;
            }
            let mut candidate = IndexCandidate {
                table: table.name.clone(),
                schema: table.schema.clone(),
                columns: vec![name.clone()],
                kind: IndexKind::Single,
                confidence: Confidence::Low,
                provenance: column_usage.weak_clauses.clone(),
                score: 0.0,
                ddl: String::new(),
                reason: format!(
                    "`{}` is only used by OR-disjuncts or non-sargable predicates; an index helps once those are rewritten",
                    name
                ),
            };
            candidate.score = self.config.clause_weight
                * candidate.provenance.len() as f64
                * self.config.low_confidence_factor;
            candidate.render_ddl();
            out.push(candidate);
        }
        out
    }

    /// Folds a candidate for the same index into `existing`
    ///
    /// The score starts from the higher of the two and gains one clause weight
    /// for every clause only the other one served.
    fn merge(&self, existing: &mut IndexCandidate, other: IndexCandidate) {
        let other_is_base = other.score > existing.score;
        let base_clauses = if other_is_base {
            other.provenance.len()
        } else {
            existing.provenance.len()
        };
        let base_score = existing.score.max(other.score);
        if other_is_base {
            existing.reason = other.reason;
        }

        for provenance in other.provenance {
            if !existing.provenance.contains(&provenance) {
                existing.provenance.push(provenance);
            }
        }
        if other.confidence == Confidence::High {
            existing.confidence = Confidence::High;
        }

        let mut gained = self.config.clause_weight
            * existing.provenance.len().saturating_sub(base_clauses) as f64;
        if existing.confidence == Confidence::Low {
            gained *= self.config.low_confidence_factor;
        }
        existing.score = base_score + gained;
    }

    fn build(
        &self,
        table: &TableRef,
        priority: &[(&String, &ColumnUsage, ColumnTier)],
        members: &[usize],
        confidence: Confidence,
    ) -> IndexCandidate {
        let columns: Vec<String> = members.iter().map(|&i| priority[i].0.clone()).collect();
        let tiers: Vec<ColumnTier> = members.iter().map(|&i| priority[i].2).collect();
        let provenance: Vec<Provenance> = members
            .iter()
            .flat_map(|&i| priority[i].1.clauses.iter().cloned())
            .unique_by(|p| p.span())
            .collect();

        let tier_score: f64 = tiers.iter().map(|t| self.config.tier_weight(*t)).sum();
        let inversions = tiers.windows(2).filter(|pair| pair[0] > pair[1]).count();
        let mut score = (self.config.clause_weight * provenance.len() as f64 + tier_score)
            * self.config.inversion_decay.powi(inversions as i32);
        if confidence == Confidence::Low {
            score *= self.config.low_confidence_factor;
        }

        let usage = tiers
            .iter()
            .zip(&columns)
            .map(|(tier, column)| format!("{} ({})", column, tier_label(*tier)))
            .join(", ");
        let mut candidate = IndexCandidate {
            table: table.name.clone(),
            schema: table.schema.clone(),
            kind: if columns.len() > 1 {
                IndexKind::Composite
            } else {
                IndexKind::Single
            },
            columns,
            confidence,
            provenance,
            score,
            ddl: String::new(),
            reason: format!("Serves {} on `{}`", usage, table.name),
        };
        candidate.render_ddl();
        candidate
    }
}

fn tier_label(tier: ColumnTier) -> &'static str {
    match tier {
        ColumnTier::Equality => "equality",
        ColumnTier::Range => "range",
        ColumnTier::Join => "join",
        ColumnTier::OrderBy => "ordering",
        ColumnTier::GroupBy => "grouping",
    }
}

fn clause_provenance(
    scope: &ScopeInventory,
    clause: ClauseKind,
    span: Span,
    text: &str,
) -> Provenance {
    Provenance::Clause {
        scope: scope.id,
        clause,
        span,
        text: text.to_string(),
    }
}

fn local_to(column: &ColumnRef, table_index: usize) -> bool {
    column.local_table_index() == Some(table_index)
}

/// Column usage of table `table_index` of `scope`
fn collect_usage(scope: &ScopeInventory, table_index: usize) -> IndexMap<String, ColumnUsage> {
    let mut usage: IndexMap<String, ColumnUsage> = IndexMap::new();
    let mut order = 0usize;
    let mut next = || {
        order += 1;
        order
    };

    for predicate in scope.predicates() {
        if predicate.location == PredicateLocation::Having {
            continue;
        }
        let Some(target) = predicate.target.as_ref().filter(|t| local_to(t, table_index)) else {
            continue;
        };
        let provenance =
            clause_provenance(scope, ClauseKind::Predicate, predicate.span, &predicate.text);
        let tier = match predicate.operator {
            PredicateOperator::Equality | PredicateOperator::In | PredicateOperator::IsNull => {
                Some(ColumnTier::Equality)
            }
            PredicateOperator::Range | PredicateOperator::Like => Some(ColumnTier::Range),
            PredicateOperator::InSubquery => Some(ColumnTier::Join),
            _ => None,
        };
        let entry = usage.entry(target.name.clone()).or_default();
        match tier {
            Some(tier)
                if predicate.sargable && predicate.connective.is_conjunct() && !predicate.negated =>
            {
                entry.strong(tier, next(), provenance)
            }
            _ => entry.weak(provenance),
        }
    }

    for join in scope.joins() {
        for column in join.columns() {
            if local_to(column, table_index) {
                let provenance = clause_provenance(scope, ClauseKind::Join, join.span, &join.text);
                usage
                    .entry(column.name.clone())
                    .or_default()
                    .strong(ColumnTier::Join, next(), provenance);
            }
        }
    }

    // The projected column of `x IN (SELECT col ...)` is looked up once per outer value
    let membership = scope
        .origin
        .subquery_position()
        .is_some_and(|p| p == SubqueryPosition::WhereIn);
    if membership {
        let projections: Vec<_> = scope.projections().collect();
        if let [projection] = projections.as_slice()
            && projection.output_name().is_some()
            && let [column] = projection.columns.as_slice()
            && local_to(column, table_index)
        {
            let provenance = clause_provenance(
                scope,
                ClauseKind::Projection,
                projection.span,
                &projection.text,
            );
            usage
                .entry(column.name.clone())
                .or_default()
                .strong(ColumnTier::Join, next(), provenance);
        }
    }

    for (keys, tier, kind) in [
        (scope.order_keys().collect::<Vec<_>>(), ColumnTier::OrderBy, ClauseKind::OrderBy),
        (scope.group_keys().collect::<Vec<_>>(), ColumnTier::GroupBy, ClauseKind::GroupBy),
    ] {
        for key in keys {
            if !key.bare_column {
                continue;
            }
            let Some(column) = key.columns.first().filter(|c| local_to(c, table_index)) else {
                continue;
            };
            let provenance = clause_provenance(scope, kind, key.span, &key.text);
            usage
                .entry(column.name.clone())
                .or_default()
                .strong(tier, next(), provenance);
        }
    }

    usage
}

/// Adds findings that overlap a candidate's clauses to its provenance
pub fn attach_findings(
    candidates: Vec<IndexCandidate>,
    findings: &[Finding],
) -> Vec<IndexCandidate> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            let related: Vec<Provenance> = findings
                .iter()
                .filter(|finding| {
                    candidate.provenance.iter().any(|p| match p {
                        Provenance::Clause { span, .. } => {
                            span.contains(finding.span) || finding.span.contains(*span)
                        }
                        Provenance::Finding { .. } => false,
                    })
                })
                .map(|finding| Provenance::Finding {
                    rule: finding.rule.clone(),
                    span: finding.span,
                })
                .collect();
            for provenance in related {
                if !candidate.provenance.contains(&provenance) {
                    candidate.provenance.push(provenance);
                }
            }
            candidate
        })
        .collect()
}

/// Recommends indexes with the given configuration
pub fn recommend(inventory: &ClauseInventory, config: &AdvisorConfig) -> Vec<IndexCandidate> {
    IndexAdvisor::with_config(config.clone()).recommend(inventory)
}
