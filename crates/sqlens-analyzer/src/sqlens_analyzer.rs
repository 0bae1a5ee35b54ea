//! SQLens Analyzer - static SQL query analysis
//!
//! This crate provides:
//! - A `sqlparser`-backed front end lowering into a closed AST for the supported SELECT subset, and its renderer
//! - Per-scope clause inventories with column resolution and correlation tracking
//! - Anti-pattern detection through a registry of typed rules
//! - Index candidates derived from predicate, join and ordering usage
//! - Equivalence-checked rewrite suggestions
//! - Impact scoring with an optional external prediction model

pub mod advisor;
pub mod antipattern;
pub mod catalog;
pub mod inventory;
pub mod pipeline;
pub mod rewrite;
pub mod scoring;
pub mod sql;

pub use advisor::{AdvisorConfig, Confidence, IndexAdvisor, IndexCandidate, IndexKind};
pub use antipattern::{AntiPatternDetector, AntiPatternRule, DetectorConfig, Finding, Severity};
pub use catalog::{SchemaCatalog, SemanticType, TableSchema};
pub use inventory::{ClauseInventory, UnresolvedReferenceWarning, extract, extract_with_catalog};
pub use pipeline::{AnalyzerConfig, QueryAnalyzer, StaticAnalysis};
pub use rewrite::{EquivalenceClass, RewriteEngine, RewriteRule, RewriteSuggestion};
pub use scoring::{
    FeatureVector, ImpactLevel, ImpactPredictor, ImpactScore, ImpactScorer, InferenceError,
    Prediction, RecommendationRef, ScoreProvenance, ScorerConfig, VerificationStatus,
};
pub use sql::{ParseError, Statement, parse, render};
