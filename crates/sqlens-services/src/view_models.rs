//! Result models returned to the transport layer

use serde::Serialize;
use sqlens_analyzer::{ImpactScore, RecommendationRef, StaticAnalysis};
use sqlens_bench::{BenchmarkResult, BenchmarkVariant};

use crate::analysis_service::SqlDialect;

/// Measured comparison for one recommendation
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationBenchmark {
    pub recommendation: RecommendationRef,
    /// The optimized variant that was run against the original query
    pub variant: BenchmarkVariant,
    /// `[baseline, optimized]`; empty when the run never started
    pub results: Vec<BenchmarkResult>,
    /// Why the run never started (no snapshot, cancellation)
    pub error: Option<String>,
}

impl RecommendationBenchmark {
    pub fn baseline(&self) -> Option<&BenchmarkResult> {
        self.results.first()
    }

    pub fn optimized(&self) -> Option<&BenchmarkResult> {
        self.results.get(1)
    }

    /// True when both variants ran and produced the same result set
    pub fn is_valid(&self) -> bool {
        self.results.len() == 2 && self.results.iter().all(|r| r.valid)
    }

    /// Why the recommendation could not be confirmed, `None` when it was
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        if let Some(baseline) = self.baseline().filter(|r| !r.valid) {
            return Some(format!(
                "baseline: {}",
                baseline.invalid_reason.as_deref().unwrap_or("invalid")
            ));
        }
        match self.optimized() {
            Some(optimized) if !optimized.valid => Some(
                optimized
                    .invalid_reason
                    .clone()
                    .unwrap_or_else(|| "invalid".to_string()),
            ),
            Some(_) => None,
            None => Some("benchmark produced no result".to_string()),
        }
    }
}

/// Everything one `analyze` call produced
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub analysis: StaticAnalysis,
    pub dialect: SqlDialect,
    /// Ordered by value, highest first
    pub scores: Vec<ImpactScore>,
    /// Present only when benchmarking was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmarks: Option<Vec<RecommendationBenchmark>>,
}

impl AnalysisResult {
    pub fn score_for(&self, recommendation: RecommendationRef) -> Option<&ImpactScore> {
        self.scores
            .iter()
            .find(|s| s.recommendation == recommendation)
    }

    pub fn benchmark_for(
        &self,
        recommendation: RecommendationRef,
    ) -> Option<&RecommendationBenchmark> {
        self.benchmarks
            .as_ref()?
            .iter()
            .find(|b| b.recommendation == recommendation)
    }

    pub fn verified_count(&self) -> usize {
        self.scores.iter().filter(|s| s.is_verified()).count()
    }

    pub fn recommendation_count(&self) -> usize {
        self.analysis.index_candidates.len() + self.analysis.rewrite_suggestions.len()
    }
}
