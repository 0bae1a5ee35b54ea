//! Logging and tracing setup for the `sqlens` binary
//!
//! Console output goes to stderr so that `--format json` output on stdout
//! stays machine-readable. A JSON file layer can be enabled for bug reports.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::LogSettings;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where JSON log files are written
    pub log_dir: PathBuf,

    /// Whether to write JSON logs to daily files
    pub enable_json_logs: bool,

    /// Whether to log span open/close (for timing analysis and benchmark runs)
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: false,
            enable_spans: false,
            default_filter: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose console output for diagnosing a single run
    pub fn verbose() -> Self {
        Self {
            enable_spans: true,
            default_filter: "info,sqlens_services=debug,sqlens_bench=debug,sqlens_analyzer=debug,sqlens_driver_sqlite=debug".to_string(),
            ..Self::default()
        }
    }

    /// Applies the `[logging]` section of the config file
    pub fn with_settings(mut self, settings: &LogSettings) -> Self {
        self.enable_json_logs = settings.json_file;
        if let Some(dir) = &settings.directory {
            self.log_dir = dir.clone();
        }
        if let Some(filter) = &settings.filter {
            self.default_filter = filter.clone();
        }
        self
    }
}

/// Installs the global subscriber
///
/// The returned guard flushes the file writer when dropped; keep it alive for
/// the whole run.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_span_events(span_events.clone())
        .with_writer(std::io::stderr)
        .with_ansi(std::env::var_os("NO_COLOR").is_none())
        .compact()
        .with_filter(env_filter.clone())
        .boxed();
    layers.push(console_layer);

    let mut guard = None;
    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "sqlens.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        "Logging system initialized"
    );
    Ok(guard)
}

/// Default directory for JSON log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqlens")
        .join("logs")
}
