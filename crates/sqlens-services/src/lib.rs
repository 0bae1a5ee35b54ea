//! SQLens Services Layer
//!
//! This crate sits between the transport (the CLI, or any caller embedding
//! SQLens) and the analysis crates. It turns one request into one
//! [`AnalysisResult`].
//!
//! # Architecture
//!
//! ```text
//! Transport (sqlens-cli)
//!     ↓
//! Service Layer (sqlens-services) ← This crate
//!     ↓
//! Analysis (sqlens-analyzer)     Benchmarking (sqlens-bench)
//!     ↓                               ↓
//! Infrastructure (sqlens-core, sqlens-driver-sqlite)
//! ```
//!
//! # Services
//!
//! - [`AnalysisService`] - analyze, score, and optionally benchmark a query
//! - [`HttpImpactPredictor`] - JSON-over-HTTP client for the impact model
//!
//! Only a [`ParseError`](sqlens_analyzer::ParseError) aborts an analysis.
//! Inference and benchmark failures degrade the affected scores and are
//! reported next to them.

mod analysis_service;
mod error;
mod inference;
mod view_models;

pub use analysis_service::{
    AnalysisCancellation, AnalysisOptions, AnalysisService, DEFAULT_DATASET, SqlDialect,
    catalog_from_stats,
};
pub use error::{ServiceError, ServiceResult};
pub use inference::HttpImpactPredictor;
pub use view_models::{AnalysisResult, RecommendationBenchmark};
