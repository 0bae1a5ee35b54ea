//! Rewrite Engine
//!
//! Proposes semantically equivalent reformulations of a parsed statement.
//! Every rule checks an explicit equivalence precondition before it emits a
//! suggestion; when the precondition does not hold the rule reports
//! [`EquivalencePreconditionUnmet`] and the engine drops the suggestion.
//!
//! Rewrites operate on a clone of the AST and render the result, so the
//! rewritten SQL always reparses to the tree the rule built.

mod rules;

pub use rules::*;

use crate::antipattern::Finding;
use crate::inventory::ClauseInventory;
use crate::sql::{Span, Statement};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How strongly a rewrite is known to preserve the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquivalenceClass {
    /// Equivalent for every database state
    Strict,
    /// Equivalent only while the stated precondition holds for the data
    AssumptionDependent,
}

impl EquivalenceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::AssumptionDependent => "assumption_dependent",
        }
    }
}

/// A proposed rewrite of one region of the statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteSuggestion {
    /// Rule identifier, e.g. `RW001`
    pub rule: String,
    pub title: String,
    /// Region of the original statement that is replaced
    pub span: Span,
    /// The region as it reads before the rewrite
    pub original: String,
    /// Text that replaces the region
    pub replacement: String,
    /// The whole statement after the rewrite
    pub rewritten_sql: String,
    pub equivalence: EquivalenceClass,
    /// Condition under which the rewrite preserves the result set
    pub precondition: String,
    pub rationale: String,
    /// Finding that motivated the rewrite, if any
    pub finding: Option<String>,
    /// Raw heuristic score, before normalization by the impact scorer
    pub score: f64,
}

/// A rewrite whose equivalence precondition does not hold
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rule} not applicable at {span}: {reason}")]
pub struct EquivalencePreconditionUnmet {
    pub rule: String,
    pub span: Span,
    pub reason: String,
}

impl EquivalencePreconditionUnmet {
    pub fn new(rule: &str, span: Span, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            span,
            reason: reason.into(),
        }
    }
}

/// Read-only inputs shared by every rewrite rule
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub statement: &'a Statement,
    pub inventory: &'a ClauseInventory,
    pub findings: &'a [Finding],
}

/// A single rewrite rule
pub trait RewriteRule: Send + Sync {
    /// Stable identifier, e.g. `RW001`
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// One entry per site the rule looked at
    fn propose(
        &self,
        ctx: &RewriteContext<'_>,
    ) -> Vec<Result<RewriteSuggestion, EquivalencePreconditionUnmet>>;
}

/// Runs the rewrite rule registry
pub struct RewriteEngine {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl Default for RewriteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RewriteEngine {
    /// Creates an engine with the built-in rules
    pub fn new() -> Self {
        Self {
            rules: builtin_rewrites(),
        }
    }

    pub fn with_rule(mut self, rule: impl RewriteRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn RewriteRule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    /// Suggestions whose precondition holds, ordered by span start then rule id
    pub fn propose(
        &self,
        statement: &Statement,
        inventory: &ClauseInventory,
        findings: &[Finding],
    ) -> Vec<RewriteSuggestion> {
        let ctx = RewriteContext {
            statement,
            inventory,
            findings,
        };

        let mut suggestions = Vec::new();
        for rule in &self.rules {
            for outcome in rule.propose(&ctx) {
                match outcome {
                    Ok(suggestion) => suggestions.push(suggestion),
                    Err(unmet) => {
                        tracing::debug!(
                            rule = %unmet.rule,
                            span = %unmet.span,
                            reason = %unmet.reason,
                            "rewrite dropped"
                        );
                    }
                }
            }
        }

        suggestions.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then_with(|| a.rule.cmp(&b.rule))
        });
        suggestions
    }
}

/// Runs the built-in rewrite rules
pub fn propose(
    statement: &Statement,
    inventory: &ClauseInventory,
    findings: &[Finding],
) -> Vec<RewriteSuggestion> {
    RewriteEngine::new().propose(statement, inventory, findings)
}

#[cfg(test)]
mod tests;
