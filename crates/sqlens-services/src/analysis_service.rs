//! Query analysis service
//!
//! Runs the static pipeline, scores every recommendation and, on request,
//! verifies each recommendation by benchmarking it against the original query
//! on a disposable snapshot of a reference dataset.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sqlens_analyzer::{
    AdvisorConfig, AnalyzerConfig, ImpactPredictor, ImpactScore, IndexCandidate, ParseError,
    QueryAnalyzer, RecommendationRef, SchemaCatalog, SemanticType, StaticAnalysis, TableSchema,
    parse,
};
use sqlens_bench::{BenchmarkConfig, BenchmarkHarness, BenchmarkPool, BenchmarkVariant, PoolConfig};
use sqlens_core::{DatasetProvider, PlanTree, SqlensError, TableStats};
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};
use crate::view_models::{AnalysisResult, RecommendationBenchmark};

/// Dataset used when a request names none
pub const DEFAULT_DATASET: &str = "synthetic";

/// SQL flavour the recommendations are rendered for
///
/// Parsing always accepts the same SELECT subset. The dialect decides how
/// index DDL is written when it is applied to a benchmark snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    /// Standard SQL; DDL keeps schema-qualified table names
    #[default]
    Generic,
    /// SQLite; snapshots have a single `main` schema, so DDL is unqualified
    Sqlite,
}

impl SqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Sqlite => "sqlite",
        }
    }

    /// `CREATE INDEX` statement for `candidate` in this dialect, without a terminator
    pub fn index_ddl(&self, candidate: &IndexCandidate) -> String {
        match self {
            Self::Generic => candidate.ddl.trim_end_matches(';').to_string(),
            Self::Sqlite => format!(
                "CREATE INDEX {} ON {} ({})",
                candidate.name(),
                candidate.table,
                candidate.columns.join(", ")
            ),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "standard" | "ansi" => Ok(Self::Generic),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ServiceError::Configuration(format!(
                "unknown dialect '{}': expected generic or sqlite",
                other
            ))),
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub dialect: SqlDialect,
    /// Widest composite index the advisor may propose
    pub max_composite_width: usize,
    pub run_benchmark: bool,
    /// Reference dataset for benchmarks, e.g. `synthetic:5000` or `sqlite:/path/db`
    pub dataset: String,
    /// Column types and row counts; improves resolution and scoring
    pub catalog: Option<SchemaCatalog>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            max_composite_width: AdvisorConfig::default().max_composite_width,
            run_benchmark: false,
            dataset: DEFAULT_DATASET.to_string(),
            catalog: None,
        }
    }
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_max_composite_width(mut self, width: usize) -> Self {
        self.max_composite_width = width.max(1);
        self
    }

    /// Requests benchmark verification against `dataset`
    pub fn with_benchmark(mut self, dataset: impl Into<String>) -> Self {
        self.run_benchmark = true;
        self.dataset = dataset.into();
        self
    }

    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

/// Cancellation of one analysis request
///
/// `benchmarks` is a child of `request`: cancelling the request stops the
/// benchmarks too, while cancelling only the benchmarks leaves inference
/// running, so scores keep their model adjustment.
#[derive(Debug, Clone)]
pub struct AnalysisCancellation {
    pub request: CancellationToken,
    pub benchmarks: CancellationToken,
}

impl AnalysisCancellation {
    pub fn new() -> Self {
        Self::for_request(CancellationToken::new())
    }

    pub fn for_request(request: CancellationToken) -> Self {
        Self {
            benchmarks: request.child_token(),
            request,
        }
    }
}

impl Default for AnalysisCancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a catalog from introspected tables
///
/// Declared types SQLite cannot classify fall back to a name-based guess, then
/// to text, so every column still resolves.
pub fn catalog_from_stats(tables: &[TableStats]) -> SchemaCatalog {
    let mut catalog = SchemaCatalog::new();
    for table in tables {
        let schema = table.columns.iter().fold(
            TableSchema::new(&table.name).with_row_count(table.row_count),
            |schema, (column, declared)| {
                let ty = SemanticType::from_declared(declared)
                    .or_else(|| SemanticType::infer_from_name(column))
                    .unwrap_or(SemanticType::Text);
                schema.with_column(column, ty)
            },
        );
        catalog.insert(schema);
    }
    catalog
}

/// Orchestrates analysis, scoring and benchmark verification
pub struct AnalysisService {
    config: AnalyzerConfig,
    predictor: Option<Arc<dyn ImpactPredictor>>,
    provider: Arc<dyn DatasetProvider>,
    harness: Arc<BenchmarkHarness>,
}

impl AnalysisService {
    /// Creates a service with default analyzer, pool and benchmark settings
    pub fn new(provider: Arc<dyn DatasetProvider>) -> Self {
        let pool = BenchmarkPool::new(PoolConfig::default(), provider.clone());
        Self {
            config: AnalyzerConfig::default(),
            predictor: None,
            harness: Arc::new(BenchmarkHarness::new(Arc::new(pool))),
            provider,
        }
    }

    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn ImpactPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Replaces the snapshot pool and benchmark settings
    pub fn with_benchmarking(mut self, pool: PoolConfig, bench: BenchmarkConfig) -> Self {
        let pool = BenchmarkPool::new(pool, self.provider.clone());
        self.harness = Arc::new(BenchmarkHarness::new(Arc::new(pool)).with_config(bench));
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn harness(&self) -> &BenchmarkHarness {
        &self.harness
    }

    fn analyzer_for(&self, options: &AnalysisOptions) -> QueryAnalyzer {
        let mut config = self.config.clone();
        config.advisor = config
            .advisor
            .with_max_composite_width(options.max_composite_width);
        let analyzer = QueryAnalyzer::with_config(config);
        match &self.predictor {
            Some(predictor) => analyzer.with_predictor(predictor.clone()),
            None => analyzer,
        }
    }

    /// Analyzes one statement; `cancel` stops inference and benchmarks alike
    pub async fn analyze(
        &self,
        sql: &str,
        options: &AnalysisOptions,
        cancel: CancellationToken,
    ) -> Result<AnalysisResult, ParseError> {
        self.analyze_with(sql, options, &AnalysisCancellation::for_request(cancel))
            .await
    }

    /// Analyzes one statement with separate control over the benchmarks
    ///
    /// Only a parse error fails the request. When benchmarking is requested,
    /// every recommendation is measured against the original query; a score is
    /// upgraded to benchmark-verified only when both runs were valid, otherwise
    /// it keeps its provenance and is labelled unverified with the reason.
    #[tracing::instrument(
        skip(self, sql, options, cancel),
        fields(sql_len = sql.len(), dialect = options.dialect.as_str(), run_benchmark = options.run_benchmark)
    )]
    pub async fn analyze_with(
        &self,
        sql: &str,
        options: &AnalysisOptions,
        cancel: &AnalysisCancellation,
    ) -> Result<AnalysisResult, ParseError> {
        let analyzer = self.analyzer_for(options);
        let catalog = options.catalog.as_ref();

        let analysis = analyzer.analyze_static(sql, catalog)?;
        let mut scores = analyzer.score(&analysis, catalog, &cancel.request).await;

        let benchmarks = if options.run_benchmark {
            let benchmarks = self
                .benchmark_all(&analysis, options, &cancel.benchmarks)
                .await;
            apply_verification(&mut scores, &benchmarks);
            Some(benchmarks)
        } else {
            None
        };

        let result = AnalysisResult {
            analysis,
            dialect: options.dialect,
            scores,
            benchmarks,
        };
        tracing::info!(
            findings = result.analysis.findings.len(),
            recommendations = result.recommendation_count(),
            verified = result.verified_count(),
            "analysis finished"
        );
        Ok(result)
    }

    /// Runs one benchmark per recommendation; they share the snapshot pool
    async fn benchmark_all(
        &self,
        analysis: &StaticAnalysis,
        options: &AnalysisOptions,
        cancel: &CancellationToken,
    ) -> Vec<RecommendationBenchmark> {
        let original = BenchmarkVariant::new(analysis.sql.trim().trim_end_matches(';'));
        let jobs = benchmark_variants(analysis, options.dialect)
            .into_iter()
            .map(|(recommendation, variant)| {
                let original = &original;
                async move {
                    let outcome = self
                        .harness
                        .run(original, &variant, &options.dataset, cancel)
                        .await;
                    match outcome {
                        Ok(results) => RecommendationBenchmark {
                            recommendation,
                            variant,
                            results,
                            error: None,
                        },
                        Err(e) => {
                            tracing::warn!(
                                recommendation = ?recommendation,
                                error = %e,
                                "benchmark did not run"
                            );
                            RecommendationBenchmark {
                                recommendation,
                                variant,
                                results: Vec::new(),
                                error: Some(benchmark_error(&e)),
                            }
                        }
                    }
                }
            });
        join_all(jobs).await
    }

    /// Builds a catalog from a snapshot of `dataset`
    #[tracing::instrument(skip(self))]
    pub async fn load_catalog(&self, dataset: &str) -> ServiceResult<SchemaCatalog> {
        let snapshot = self.harness.pool().acquire(dataset).await?;
        let introspection = snapshot
            .as_schema_introspection()
            .ok_or(ServiceError::SchemaNotSupported)?;
        let tables = introspection.table_stats().await?;
        tracing::debug!(tables = tables.len(), "catalog loaded from dataset");
        Ok(catalog_from_stats(&tables))
    }

    /// Execution plan of `sql` on a snapshot of `dataset`
    ///
    /// The statement must parse; nothing outside the supported subset reaches
    /// the database.
    #[tracing::instrument(skip(self, sql), fields(sql_len = sql.len()))]
    pub async fn explain(&self, sql: &str, dataset: &str) -> ServiceResult<PlanTree> {
        parse(sql)?;
        let snapshot = self.harness.pool().acquire(dataset).await?;
        snapshot
            .explain(sql.trim().trim_end_matches(';'))
            .await
            .map_err(ServiceError::ExplainFailed)
    }
}

/// The optimized variant that tests each recommendation
///
/// Index candidates run the unchanged query with the index created on the
/// snapshot first; rewrites run the rewritten statement.
pub(crate) fn benchmark_variants(
    analysis: &StaticAnalysis,
    dialect: SqlDialect,
) -> Vec<(RecommendationRef, BenchmarkVariant)> {
    let sql = analysis.sql.trim().trim_end_matches(';');
    let indexes = analysis
        .index_candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let variant = BenchmarkVariant::new(sql)
                .with_setup(dialect.index_ddl(candidate))
                .with_teardown(format!("DROP INDEX {}", candidate.name()));
            (RecommendationRef::IndexCandidate(i), variant)
        });
    let rewrites = analysis
        .rewrite_suggestions
        .iter()
        .enumerate()
        .map(|(i, suggestion)| {
            (
                RecommendationRef::RewriteSuggestion(i),
                BenchmarkVariant::new(suggestion.rewritten_sql.clone()),
            )
        });
    indexes.chain(rewrites).collect()
}

fn benchmark_error(error: &SqlensError) -> String {
    match error {
        SqlensError::Cancelled => "benchmark cancelled".to_string(),
        other => other.to_string(),
    }
}

/// Upgrades scores whose benchmark was valid and labels the rest unverified
///
/// An invalid or missing benchmark never changes a score's provenance.
pub(crate) fn apply_verification(scores: &mut [ImpactScore], benchmarks: &[RecommendationBenchmark]) {
    for score in scores.iter_mut() {
        let verdict = benchmarks
            .iter()
            .find(|b| b.recommendation == score.recommendation)
            .map(RecommendationBenchmark::failure_reason);
        match verdict {
            Some(None) => score.mark_verified(),
            Some(Some(reason)) => score.mark_unverified(reason),
            None => score.mark_unverified("no benchmark was run"),
        }
    }
}

#[cfg(test)]
mod tests;
