//! Common test utilities and mocks

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlens_analyzer::{FeatureVector, ImpactPredictor, InferenceError, Prediction};
use sqlens_bench::{BenchmarkConfig, PoolConfig};
use sqlens_driver_sqlite::SqliteDatasetProvider;
use sqlens_services::AnalysisService;

/// Small enough to keep benchmarks fast, large enough for indexes to matter
pub const DATASET: &str = "synthetic:2000";

/// Service over synthetic SQLite snapshots with three timed runs per variant
pub fn sqlite_service() -> AnalysisService {
    AnalysisService::new(Arc::new(SqliteDatasetProvider::new())).with_benchmarking(
        PoolConfig::new(2),
        BenchmarkConfig::new().with_repetitions(3),
    )
}

/// Answers every request with the same prediction and counts calls
pub struct FixedPredictor {
    pub answer: Result<Prediction, InferenceError>,
    pub calls: AtomicUsize,
}

impl FixedPredictor {
    pub fn new(answer: Result<Prediction, InferenceError>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImpactPredictor for FixedPredictor {
    async fn predict(&self, _features: &FeatureVector) -> Result<Prediction, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}
