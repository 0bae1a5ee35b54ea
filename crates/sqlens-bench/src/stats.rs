//! Timing statistics and result-set fingerprints

use serde::{Serialize, Serializer};
use sqlens_core::Row;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Wall-time distribution of the timed runs, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingStats {
    pub min_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub mean_ms: f64,
    pub samples_ms: Vec<f64>,
}

impl TimingStats {
    /// Returns `None` when there are no samples
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let samples_ms: Vec<f64> = samples
            .iter()
            .map(|d| d.as_nanos() as f64 / 1_000_000.0)
            .collect();
        let mut sorted = samples_ms.clone();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let median_ms = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        // Nearest-rank percentile
        let p95_rank = ((0.95 * n as f64).ceil() as usize).clamp(1, n);

        Some(Self {
            min_ms: sorted[0],
            median_ms,
            p95_ms: sorted[p95_rank - 1],
            mean_ms: sorted.iter().sum::<f64>() / n as f64,
            samples_ms,
        })
    }
}

/// Order-insensitive fingerprint of a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowSetHash(pub u64);

impl fmt::Display for RowSetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// u64 does not survive JSON consumers that read numbers as doubles.
impl Serialize for RowSetHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hash every row, sort the row hashes, then hash the sorted list.
///
/// Duplicates count: `{a, a, b}` and `{a, b}` hash differently.
pub fn row_set_hash(rows: &[Row]) -> RowSetHash {
    let mut row_hashes: Vec<u64> = rows
        .iter()
        .map(|row| {
            let mut hasher = DefaultHasher::new();
            row.values.hash(&mut hasher);
            hasher.finish()
        })
        .collect();
    row_hashes.sort_unstable();

    let mut hasher = DefaultHasher::new();
    row_hashes.hash(&mut hasher);
    RowSetHash(hasher.finish())
}
