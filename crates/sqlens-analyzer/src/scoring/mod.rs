//! Impact Scorer
//!
//! Turns index candidates and rewrite suggestions into comparable scores in
//! `[0, 1]`. Every recommendation gets a heuristic score from its raw
//! heuristic (`raw / (raw + k)`); when an [`ImpactPredictor`] is configured
//! its prediction is blended in, weighted by the prediction's confidence.
//!
//! The predictor is an external collaborator: it is called under a timeout and
//! a cancellation token, and any failure leaves the heuristic score in place
//! with an [`InferenceUnavailable`] warning attached.

use crate::advisor::{IndexCandidate, Provenance};
use crate::antipattern::Finding;
use crate::catalog::SchemaCatalog;
use crate::inventory::{ClauseInventory, ClauseKind, PredicateLocation, PredicateOperator};
use crate::rewrite::RewriteSuggestion;
use crate::sql::Span;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Names of the feature vector fields, in wire order
pub const FEATURE_NAMES: [&str; 8] = [
    "clauses_satisfied",
    "table_rows_log10",
    "max_finding_severity",
    "estimated_selectivity",
    "join_count",
    "where_predicate_count",
    "column_count",
    "raw_heuristic",
];

/// Fixed-order numeric features describing one recommendation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Distinct clauses the recommendation serves
    pub clauses_satisfied: f64,
    /// `log10(rows + 1)` of the largest affected table, 0 when unknown
    pub table_rows_log10: f64,
    /// Highest severity rank among related findings (0 when none)
    pub max_finding_severity: f64,
    /// Estimated fraction of rows the served predicates keep
    pub estimated_selectivity: f64,
    pub join_count: f64,
    pub where_predicate_count: f64,
    pub column_count: f64,
    pub raw_heuristic: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.clauses_satisfied,
            self.table_rows_log10,
            self.max_finding_severity,
            self.estimated_selectivity,
            self.join_count,
            self.where_predicate_count,
            self.column_count,
            self.raw_heuristic,
        ]
    }

    pub fn names() -> &'static [&'static str; 8] {
        &FEATURE_NAMES
    }

    /// Builds the features of one recommendation
    pub fn build(recommendation: Recommendation<'_>, ctx: &ScoringContext<'_>) -> Self {
        let join_count = ctx.inventory.join_count() as f64;
        let where_predicate_count = ctx
            .inventory
            .scopes
            .iter()
            .flat_map(|s| s.predicates())
            .filter(|p| p.location == PredicateLocation::Where)
            .count() as f64;

        match recommendation {
            Recommendation::Index(candidate) => {
                let spans: Vec<Span> = candidate.provenance.iter().map(|p| p.span()).collect();
                Self {
                    clauses_satisfied: candidate.clause_count() as f64,
                    table_rows_log10: ctx.rows_log10(&candidate.table),
                    max_finding_severity: ctx.max_severity(|span| {
                        spans.iter().any(|s| s.contains(span) || span.contains(*s))
                    }),
                    estimated_selectivity: estimate_selectivity(candidate, ctx.inventory),
                    join_count,
                    where_predicate_count,
                    column_count: candidate.columns.len() as f64,
                    raw_heuristic: candidate.score,
                }
            }
            Recommendation::Rewrite(suggestion) => {
                let region = suggestion.span;
                let clauses_satisfied = ctx
                    .inventory
                    .clauses()
                    .filter(|(_, clause)| region.contains(clause.span()))
                    .count() as f64;
                let table_rows_log10 = ctx
                    .inventory
                    .scopes
                    .iter()
                    .filter(|scope| region.contains(scope.span))
                    .flat_map(|scope| scope.base_tables())
                    .map(|table| ctx.rows_log10(&table.name))
                    .fold(0.0, f64::max);
                Self {
                    clauses_satisfied,
                    table_rows_log10,
                    max_finding_severity: ctx.max_severity(|span| region.contains(span)),
                    estimated_selectivity: 1.0,
                    join_count,
                    where_predicate_count,
                    column_count: 0.0,
                    raw_heuristic: suggestion.score,
                }
            }
        }
    }
}

/// Product of per-clause selectivity guesses over the clauses a candidate serves
fn estimate_selectivity(candidate: &IndexCandidate, inventory: &ClauseInventory) -> f64 {
    let mut selectivity: f64 = 1.0;
    for provenance in &candidate.provenance {
        let Provenance::Clause {
            scope,
            clause,
            span,
            ..
        } = provenance
        else {
            continue;
        };
        selectivity *= match clause {
            ClauseKind::Join => 0.1,
            ClauseKind::Predicate => inventory
                .scope(*scope)
                .and_then(|s| s.predicates().find(|p| p.span == *span))
                .map_or(1.0, |p| match p.operator {
                    PredicateOperator::Equality
                    | PredicateOperator::In
                    | PredicateOperator::IsNull => 0.05,
                    PredicateOperator::Like if p.sargable => 0.1,
                    PredicateOperator::Range => 0.3,
                    PredicateOperator::InSubquery => 0.1,
                    _ => 1.0,
                }),
            _ => 1.0,
        };
    }
    selectivity.clamp(0.0, 1.0)
}

/// Which recommendation a score belongs to, by index into its result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum RecommendationRef {
    IndexCandidate(usize),
    RewriteSuggestion(usize),
}

/// A borrowed recommendation to score
#[derive(Debug, Clone, Copy)]
pub enum Recommendation<'a> {
    Index(&'a IndexCandidate),
    Rewrite(&'a RewriteSuggestion),
}

/// Per-request inputs the scorer reads
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub inventory: &'a ClauseInventory,
    pub findings: &'a [Finding],
    pub catalog: Option<&'a SchemaCatalog>,
}

impl ScoringContext<'_> {
    fn rows_log10(&self, table: &str) -> f64 {
        self.catalog
            .and_then(|catalog| catalog.row_count(table))
            .map_or(0.0, |rows| (rows as f64 + 1.0).log10())
    }

    fn max_severity(&self, related: impl Fn(Span) -> bool) -> f64 {
        self.findings
            .iter()
            .filter(|finding| related(finding.span))
            .map(|finding| finding.severity.rank())
            .max()
            .map_or(0.0, f64::from)
    }
}

/// Answer of the inference collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(value: f64, confidence: f64) -> Self {
        Self { value, confidence }
    }

    /// Rejects predictions outside `[0, 1]`
    pub fn validated(self) -> Result<Self, InferenceError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if in_range(self.value) && in_range(self.confidence) {
            Ok(self)
        } else {
            Err(InferenceError::OutOfRange {
                value: self.value,
                confidence: self.confidence,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("inference service unavailable: {0}")]
    Unavailable(String),
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("inference cancelled")]
    Cancelled,
    #[error("prediction {value} with confidence {confidence} is outside [0, 1]")]
    OutOfRange { value: f64, confidence: f64 },
}

/// Warning attached to a score whose ML adjustment was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("impact model unavailable: {reason}")]
pub struct InferenceUnavailable {
    pub reason: String,
}

impl From<InferenceError> for InferenceUnavailable {
    fn from(error: InferenceError) -> Self {
        Self {
            reason: error.to_string(),
        }
    }
}

/// External impact model
#[async_trait]
pub trait ImpactPredictor: Send + Sync {
    async fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError>;
}

/// How a score was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreProvenance {
    HeuristicOnly,
    MlAdjusted,
    BenchmarkVerified,
}

impl ScoreProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeuristicOnly => "heuristic_only",
            Self::MlAdjusted => "ml_adjusted",
            Self::BenchmarkVerified => "benchmark_verified",
        }
    }
}

/// Whether a recommendation was checked against measured execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationStatus {
    NotRequested,
    Verified,
    Unverified { reason: String },
}

/// Coarse impact bucket: up to 10% Low, up to 30% Medium, above that High
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn from_value(value: f64) -> Self {
        if value > 0.3 {
            Self::High
        } else if value > 0.1 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Bucket for a measured improvement given in percent
    pub fn from_improvement_percent(percent: f64) -> Self {
        Self::from_value(percent / 100.0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Score of one recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub recommendation: RecommendationRef,
    /// Final score in `[0, 1]`
    pub value: f64,
    pub level: ImpactLevel,
    /// Heuristic part of the score, kept when an ML prediction was blended in
    pub heuristic: f64,
    pub features: FeatureVector,
    pub prediction: Option<Prediction>,
    pub provenance: ScoreProvenance,
    pub verification: VerificationStatus,
    pub inference_warning: Option<InferenceUnavailable>,
}

impl ImpactScore {
    /// Records a valid benchmark comparison
    pub fn mark_verified(&mut self) {
        self.provenance = ScoreProvenance::BenchmarkVerified;
        self.verification = VerificationStatus::Verified;
    }

    /// Records a benchmark that could not confirm the recommendation; provenance is kept
    pub fn mark_unverified(&mut self, reason: impl Into<String>) {
        self.verification = VerificationStatus::Unverified {
            reason: reason.into(),
        };
    }

    pub fn is_verified(&self) -> bool {
        self.provenance == ScoreProvenance::BenchmarkVerified
    }
}

/// Configuration for the impact scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Raw heuristic at which the heuristic score reaches 0.5
    pub saturation: f64,
    /// Maximum share of the final score the ML prediction may take
    pub ml_weight: f64,
    /// Inference timeout in milliseconds
    pub inference_timeout_ms: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            saturation: 4.0,
            ml_weight: 0.5,
            inference_timeout_ms: 2_000,
        }
    }
}

impl ScorerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_saturation(mut self, saturation: f64) -> Self {
        self.saturation = saturation.max(f64::EPSILON);
        self
    }

    pub fn with_ml_weight(mut self, weight: f64) -> Self {
        self.ml_weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

/// Scores recommendations, optionally consulting an [`ImpactPredictor`]
#[derive(Clone, Default)]
pub struct ImpactScorer {
    config: ScorerConfig,
    predictor: Option<Arc<dyn ImpactPredictor>>,
}

impl std::fmt::Debug for ImpactScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpactScorer")
            .field("config", &self.config)
            .field("predictor", &self.predictor.is_some())
            .finish()
    }
}

impl ImpactScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScorerConfig) -> Self {
        Self {
            config,
            predictor: None,
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn ImpactPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Normalizes a raw heuristic into `[0, 1)`
    pub fn heuristic(&self, raw: f64) -> f64 {
        let raw = raw.max(0.0);
        // A zero saturation would make 0 / 0
        let saturation = self.config.saturation.max(f64::EPSILON);
        raw / (raw + saturation)
    }

    /// Heuristic-only score; never calls the predictor
    pub fn heuristic_score(
        &self,
        reference: RecommendationRef,
        recommendation: Recommendation<'_>,
        ctx: &ScoringContext<'_>,
    ) -> ImpactScore {
        let features = FeatureVector::build(recommendation, ctx);
        let heuristic = self.heuristic(features.raw_heuristic);
        ImpactScore {
            recommendation: reference,
            value: heuristic,
            level: ImpactLevel::from_value(heuristic),
            heuristic,
            features,
            prediction: None,
            provenance: ScoreProvenance::HeuristicOnly,
            verification: VerificationStatus::NotRequested,
            inference_warning: None,
        }
    }

    /// Scores one recommendation; inference failures degrade to the heuristic score
    pub async fn score(
        &self,
        reference: RecommendationRef,
        recommendation: Recommendation<'_>,
        ctx: &ScoringContext<'_>,
        cancel: &CancellationToken,
    ) -> ImpactScore {
        let mut score = self.heuristic_score(reference, recommendation, ctx);
        let Some(predictor) = &self.predictor else {
            return score;
        };

        match self.infer(predictor.as_ref(), &score.features, cancel).await {
            Ok(prediction) => {
                let weight = prediction.confidence * self.config.ml_weight;
                let value = (score.heuristic * (1.0 - weight) + prediction.value * weight)
                    .clamp(0.0, 1.0);
                score.value = value;
                score.level = ImpactLevel::from_value(value);
                score.prediction = Some(prediction);
                score.provenance = ScoreProvenance::MlAdjusted;
            }
            Err(error) => {
                tracing::warn!(
                    recommendation = ?reference,
                    error = %error,
                    "impact model unavailable, keeping heuristic score"
                );
                score.inference_warning = Some(error.into());
            }
        }
        score
    }

    async fn infer(
        &self,
        predictor: &dyn ImpactPredictor,
        features: &FeatureVector,
        cancel: &CancellationToken,
    ) -> Result<Prediction, InferenceError> {
        if cancel.is_cancelled() {
            return Err(InferenceError::Cancelled);
        }
        let timeout = self.config.inference_timeout();
        tokio::select! {
            _ = cancel.cancelled() => Err(InferenceError::Cancelled),
            outcome = tokio::time::timeout(timeout, predictor.predict(features)) => match outcome {
                Ok(prediction) => prediction?.validated(),
                Err(_) => Err(InferenceError::Timeout(timeout)),
            },
        }
    }

    /// Scores every recommendation concurrently; output is ordered by value descending
    pub async fn score_all(
        &self,
        candidates: &[IndexCandidate],
        suggestions: &[RewriteSuggestion],
        ctx: &ScoringContext<'_>,
        cancel: &CancellationToken,
    ) -> Vec<ImpactScore> {
        let jobs = recommendations(candidates, suggestions)
            .map(|(reference, recommendation)| self.score(reference, recommendation, ctx, cancel));
        let mut scores = join_all(jobs).await;
        sort_scores(&mut scores);
        scores
    }

    /// Heuristic scores for every recommendation, ordered like [`ImpactScorer::score_all`]
    pub fn heuristic_scores(
        &self,
        candidates: &[IndexCandidate],
        suggestions: &[RewriteSuggestion],
        ctx: &ScoringContext<'_>,
    ) -> Vec<ImpactScore> {
        let mut scores: Vec<ImpactScore> = recommendations(candidates, suggestions)
            .map(|(reference, recommendation)| {
                self.heuristic_score(reference, recommendation, ctx)
            })
            .collect();
        sort_scores(&mut scores);
        scores
    }
}

fn recommendations<'a>(
    candidates: &'a [IndexCandidate],
    suggestions: &'a [RewriteSuggestion],
) -> impl Iterator<Item = (RecommendationRef, Recommendation<'a>)> {
    let indexes = candidates.iter().enumerate().map(|(i, candidate)| {
        (
            RecommendationRef::IndexCandidate(i),
            Recommendation::Index(candidate),
        )
    });
    let rewrites = suggestions.iter().enumerate().map(|(i, suggestion)| {
        (
            RecommendationRef::RewriteSuggestion(i),
            Recommendation::Rewrite(suggestion),
        )
    });
    indexes.chain(rewrites)
}

fn sort_scores(scores: &mut [ImpactScore]) {
    scores.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.recommendation.cmp(&b.recommendation))
    });
}
