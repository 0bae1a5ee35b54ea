//! Anti-Pattern Detection Module
//!
//! A registry of independent rules over a [`ClauseInventory`]. Each rule is a
//! pure function of the inventory; the detector runs them in parallel, skips
//! rules whose required clause kinds do not occur, and returns the union of
//! their findings in source order (ties by rule id).

mod rules;

pub use rules::*;

use crate::catalog::{SchemaCatalog, SemanticType};
use crate::inventory::{ClauseInventory, ClauseKind, LiteralKind, SubqueryPosition};
use crate::sql::{ScopeId, Span};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational suggestion for optimization
    Info,
    /// Warning that may impact performance
    Warning,
    /// Critical issue that should be addressed immediately
    Critical,
}

impl Severity {
    /// Returns true if this is a critical issue
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    /// Returns true if this is at least a warning
    pub fn is_warning_or_above(&self) -> bool {
        matches!(self, Self::Critical | Self::Warning)
    }

    /// Returns the severity level as a display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Numeric rank used as a scoring feature: info 1, warning 2, critical 3
    pub fn rank(&self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }
}

/// Why the branches of a UNION may be combined with UNION ALL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisjointnessBasis {
    /// Every branch projects a different literal at output position `position`
    LiteralDiscriminator { position: usize },
    /// Every branch pins the projected column `column` to a different literal
    DistinctEqualityLiterals { column: String },
    /// The compound statement feeds an IN or EXISTS test, where duplicates are irrelevant
    MembershipSubquery,
    /// Branches read pairwise-distinct base tables, assumed to hold distinct rows
    DistinctSources { tables: Vec<String> },
}

impl DisjointnessBasis {
    /// True when disjointness follows from the query text alone
    pub fn is_proven(&self) -> bool {
        !matches!(self, Self::DistinctSources { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::LiteralDiscriminator { position } => format!(
                "each branch projects a different constant in output column {}",
                position + 1
            ),
            Self::DistinctEqualityLiterals { column } => format!(
                "each branch restricts `{}` to a different constant value",
                column
            ),
            Self::MembershipSubquery => {
                "the result only feeds an IN/EXISTS test, so duplicate rows do not change the outcome"
                    .to_string()
            }
            Self::DistinctSources { tables } => format!(
                "the branches read different tables ({}) that are assumed to share no rows",
                tables.join(", ")
            ),
        }
    }
}

/// Rule-specific details of a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingPayload {
    UnboundedProjection {
        qualifier: Option<String>,
        tables: Vec<String>,
    },
    FunctionWrappedColumn {
        column: String,
        function: String,
    },
    ImplicitCoercion {
        column: String,
        column_type: SemanticType,
        literal_kind: LiteralKind,
        literal: String,
    },
    CorrelatedSubquery {
        subquery: ScopeId,
        position: Option<SubqueryPosition>,
        outer_columns: Vec<String>,
    },
    LeadingWildcard {
        column: Option<String>,
        pattern: String,
    },
    DisjointUnion {
        basis: DisjointnessBasis,
        branches: usize,
        /// Every branch is `SELECT DISTINCT`
        branches_distinct: bool,
    },
    CartesianProduct {
        tables: Vec<String>,
        components: usize,
    },
    OrAcrossColumns {
        group: usize,
        columns: Vec<String>,
    },
}

/// An anti-pattern detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier, e.g. `AP001`
    pub rule: String,
    pub severity: Severity,
    /// Scope that owns the triggering clause
    pub scope: ScopeId,
    pub span: Span,
    pub message: String,
    pub payload: FindingPayload,
}

impl Finding {
    pub fn new(
        rule: &str,
        severity: Severity,
        scope: ScopeId,
        span: Span,
        message: impl Into<String>,
        payload: FindingPayload,
    ) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            scope,
            span,
            message: message.into(),
            payload,
        }
    }

    /// Column the finding is about, when there is exactly one
    pub fn column(&self) -> Option<&str> {
        match &self.payload {
            FindingPayload::FunctionWrappedColumn { column, .. }
            | FindingPayload::ImplicitCoercion { column, .. } => Some(column),
            FindingPayload::LeadingWildcard { column, .. } => column.as_deref(),
            _ => None,
        }
    }
}

/// Configuration for the anti-pattern detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Severity of a correlated subquery under WHERE ... IN / EXISTS
    pub correlated_in_where: Severity,
    /// Severity of a correlated subquery anywhere else
    pub correlated_elsewhere: Severity,
    /// Treat UNION branches over pairwise-distinct base tables as disjoint
    pub assume_distinct_sources: bool,
    /// Rule ids that are not run
    pub disabled: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            correlated_in_where: Severity::Critical,
            correlated_elsewhere: Severity::Info,
            assume_distinct_sources: true,
            disabled: Vec::new(),
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlated_severities(mut self, in_where: Severity, elsewhere: Severity) -> Self {
        self.correlated_in_where = in_where;
        self.correlated_elsewhere = elsewhere;
        self
    }

    pub fn with_assume_distinct_sources(mut self, assume: bool) -> Self {
        self.assume_distinct_sources = assume;
        self
    }

    pub fn with_disabled(mut self, rule: impl Into<String>) -> Self {
        self.disabled.push(rule.into());
        self
    }

    pub fn is_enabled(&self, rule: &str) -> bool {
        !self.disabled.iter().any(|id| id.eq_ignore_ascii_case(rule))
    }
}

/// Read-only inputs shared by every rule
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub config: &'a DetectorConfig,
    pub catalog: Option<&'a SchemaCatalog>,
}

/// A single anti-pattern rule
///
/// Rules are stateless and must be `Send + Sync`; the detector runs them in
/// parallel against the same inventory.
pub trait AntiPatternRule: Send + Sync {
    /// Stable identifier, e.g. `AP001`
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Clause kinds that must occur somewhere in the inventory for the rule to run
    fn required_clauses(&self) -> &'static [ClauseKind] {
        &[]
    }

    fn check(&self, inventory: &ClauseInventory, ctx: &DetectionContext<'_>) -> Vec<Finding>;
}

/// Runs the rule registry over an inventory
pub struct AntiPatternDetector {
    rules: Vec<Box<dyn AntiPatternRule>>,
    config: DetectorConfig,
}

impl Default for AntiPatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiPatternDetector {
    /// Creates a detector with the built-in rules and default config
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            rules: builtin_rules(),
            config,
        }
    }

    /// Registers an additional rule
    pub fn with_rule(mut self, rule: impl AntiPatternRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn AntiPatternRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    /// Runs every enabled rule and returns findings ordered by span start, then rule id
    pub fn detect(
        &self,
        inventory: &ClauseInventory,
        catalog: Option<&SchemaCatalog>,
    ) -> Vec<Finding> {
        let ctx = DetectionContext {
            config: &self.config,
            catalog,
        };

        let mut findings: Vec<Finding> = self
            .rules
            .par_iter()
            .filter(|rule| self.config.is_enabled(rule.id()))
            .filter(|rule| {
                rule.required_clauses()
                    .iter()
                    .all(|kind| inventory.has_clause_kind(*kind))
            })
            .flat_map_iter(|rule| rule.check(inventory, &ctx))
            .collect();

        findings.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| a.rule.cmp(&b.rule))
                .then_with(|| a.span.end.cmp(&b.span.end))
                .then_with(|| a.scope.cmp(&b.scope))
        });

        tracing::debug!(
            rules = self.rules.len(),
            findings = findings.len(),
            "anti-pattern detection finished"
        );
        findings
    }
}

/// Runs the built-in rules with default configuration
pub fn detect(inventory: &ClauseInventory) -> Vec<Finding> {
    AntiPatternDetector::new().detect(inventory, None)
}

#[cfg(test)]
mod tests;
