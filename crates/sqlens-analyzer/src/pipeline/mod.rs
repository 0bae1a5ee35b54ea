//! Static analysis pipeline
//!
//! Parse → extract → (detect ∥ advise) → rewrite. Everything here is pure;
//! scoring is the only step that may wait on I/O and lives in
//! [`QueryAnalyzer::score`].

use crate::advisor::{AdvisorConfig, IndexAdvisor, IndexCandidate, attach_findings};
use crate::antipattern::{AntiPatternDetector, DetectorConfig, Finding, Severity};
use crate::catalog::SchemaCatalog;
use crate::inventory::{ClauseInventory, UnresolvedReferenceWarning, extract_with_catalog};
use crate::rewrite::{RewriteEngine, RewriteSuggestion};
use crate::scoring::{ImpactPredictor, ImpactScore, ImpactScorer, ScorerConfig, ScoringContext};
use crate::sql::{ParseError, StatementKind, parse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of the static stages for one statement
#[derive(Debug, Clone, Serialize)]
pub struct StaticAnalysis {
    pub sql: String,
    /// The statement rendered back in normalized form
    pub normalized_sql: String,
    pub statement_kind: StatementKind,
    pub scope_count: usize,
    pub findings: Vec<Finding>,
    pub index_candidates: Vec<IndexCandidate>,
    pub rewrite_suggestions: Vec<RewriteSuggestion>,
    pub warnings: Vec<UnresolvedReferenceWarning>,
    /// Overall query health (0-100, higher = better)
    pub health_score: u8,
    pub summary: String,
    #[serde(skip)]
    pub inventory: ClauseInventory,
}

impl StaticAnalysis {
    fn penalize(&mut self) {
        for finding in &self.findings {
            let penalty = match finding.severity {
                Severity::Critical => 25,
                Severity::Warning => 10,
                Severity::Info => 3,
            };
            self.health_score = self.health_score.saturating_sub(penalty);
        }
    }

    /// Returns true if there are critical findings
    pub fn has_critical_issues(&self) -> bool {
        self.findings.iter().any(|f| f.severity.is_critical())
    }

    /// Returns true if there are warnings or critical findings
    pub fn has_warnings(&self) -> bool {
        self.findings.iter().any(|f| f.severity.is_warning_or_above())
    }

    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }

    /// Findings ordered critical first, source order within one severity
    pub fn sorted_findings(&self) -> Vec<&Finding> {
        let mut sorted: Vec<_> = self.findings.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
        sorted
    }

    fn generate_summary(&self) -> String {
        let count = |severity: Severity| {
            self.findings
                .iter()
                .filter(|f| f.severity == severity)
                .count()
        };
        let critical = count(Severity::Critical);
        let warnings = count(Severity::Warning);
        let info = count(Severity::Info);

        if self.findings.is_empty() {
            "No anti-patterns detected.".to_string()
        } else if critical > 0 {
            format!(
                "Query has {} critical issue(s), {} warning(s), and {} suggestion(s). Health score: {}/100",
                critical, warnings, info, self.health_score
            )
        } else if warnings > 0 {
            format!(
                "Query has {} warning(s) and {} suggestion(s). Health score: {}/100",
                warnings, info, self.health_score
            )
        } else {
            format!(
                "Query has {} minor suggestion(s). Health score: {}/100",
                info, self.health_score
            )
        }
    }
}

/// Configuration for every analysis stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub detector: DetectorConfig,
    pub advisor: AdvisorConfig,
    pub scorer: ScorerConfig,
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_advisor(mut self, advisor: AdvisorConfig) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_scorer(mut self, scorer: ScorerConfig) -> Self {
        self.scorer = scorer;
        self
    }
}

/// Runs the analysis stages with one configuration
pub struct QueryAnalyzer {
    config: AnalyzerConfig,
    detector: AntiPatternDetector,
    advisor: IndexAdvisor,
    rewriter: RewriteEngine,
    scorer: ImpactScorer,
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryAnalyzer {
    /// Creates a new analyzer with default config
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            detector: AntiPatternDetector::with_config(config.detector.clone()),
            advisor: IndexAdvisor::with_config(config.advisor.clone()),
            rewriter: RewriteEngine::new(),
            scorer: ImpactScorer::with_config(config.scorer.clone()),
            config,
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn ImpactPredictor>) -> Self {
        self.scorer = self.scorer.with_predictor(predictor);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn detector(&self) -> &AntiPatternDetector {
        &self.detector
    }

    /// Runs every pure stage. Only a parse error aborts the analysis.
    #[tracing::instrument(skip(self, sql, catalog), fields(sql_len = sql.len()))]
    pub fn analyze_static(
        &self,
        sql: &str,
        catalog: Option<&SchemaCatalog>,
    ) -> Result<StaticAnalysis, ParseError> {
        let statement = parse(sql)?;
        let inventory = extract_with_catalog(&statement, catalog);

        let (findings, candidates) = rayon::join(
            || self.detector.detect(&inventory, catalog),
            || self.advisor.recommend(&inventory),
        );
        let index_candidates = attach_findings(candidates, &findings);
        let rewrite_suggestions = self.rewriter.propose(&statement, &inventory, &findings);

        let mut analysis = StaticAnalysis {
            sql: sql.to_string(),
            normalized_sql: statement.to_string(),
            statement_kind: statement.kind(),
            scope_count: inventory.scope_count(),
            findings,
            index_candidates,
            rewrite_suggestions,
            warnings: inventory.warnings().cloned().collect(),
            health_score: 100,
            summary: String::new(),
            inventory,
        };
        analysis.penalize();
        analysis.summary = analysis.generate_summary();

        tracing::debug!(
            findings = analysis.findings.len(),
            candidates = analysis.index_candidates.len(),
            rewrites = analysis.rewrite_suggestions.len(),
            "static analysis finished"
        );
        Ok(analysis)
    }

    /// Scores every recommendation of `analysis`, consulting the predictor if configured
    pub async fn score(
        &self,
        analysis: &StaticAnalysis,
        catalog: Option<&SchemaCatalog>,
        cancel: &CancellationToken,
    ) -> Vec<ImpactScore> {
        let ctx = ScoringContext {
            inventory: &analysis.inventory,
            findings: &analysis.findings,
            catalog,
        };
        self.scorer
            .score_all(
                &analysis.index_candidates,
                &analysis.rewrite_suggestions,
                &ctx,
                cancel,
            )
            .await
    }

    /// Heuristic scores only, without touching the predictor
    pub fn heuristic_scores(
        &self,
        analysis: &StaticAnalysis,
        catalog: Option<&SchemaCatalog>,
    ) -> Vec<ImpactScore> {
        let ctx = ScoringContext {
            inventory: &analysis.inventory,
            findings: &analysis.findings,
            catalog,
        };
        self.scorer.heuristic_scores(
            &analysis.index_candidates,
            &analysis.rewrite_suggestions,
            &ctx,
        )
    }
}
