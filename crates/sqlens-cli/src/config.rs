//! `config.toml` loading
//!
//! Every section is optional; missing keys take their defaults. Command-line
//! flags override whatever the file sets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlens_analyzer::AnalyzerConfig;
use sqlens_bench::{BenchmarkConfig, PoolConfig};
use sqlens_services::AnalysisOptions;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlensConfig {
    /// Detector, advisor and scorer tuning
    pub analyzer: AnalyzerConfig,
    /// Request defaults: dialect, composite width, dataset
    pub defaults: AnalysisOptions,
    pub benchmark: BenchmarkConfig,
    pub pool: PoolConfig,
    pub inference: Option<InferenceSettings>,
    pub logging: LogSettings,
}

/// Where the impact model is served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub endpoint: String,
    #[serde(default = "default_inference_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_inference_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Also write JSON logs to daily files
    pub json_file: bool,
    /// Directory for JSON log files; defaults to the platform data directory
    pub directory: Option<PathBuf>,
    /// Filter directives used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

impl SqlensConfig {
    /// Loads `explicit` if given, otherwise the default file if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// `<config dir>/sqlens/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlens").join("config.toml"))
}

#[cfg(test)]
mod tests;
