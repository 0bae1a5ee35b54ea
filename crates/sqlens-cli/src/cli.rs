//! `sqlens` command-line front end
//!
//! Analyzes a SQL statement, explains it on a reference dataset, or lists the
//! built-in rules. Results go to stdout as tables or JSON; logs go to stderr.

mod config;
mod logging;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sqlens_driver_sqlite::SqliteDatasetProvider;
use sqlens_services::{
    AnalysisCancellation, AnalysisOptions, AnalysisService, HttpImpactPredictor, SqlDialect,
};
use tokio::io::AsyncReadExt;

use crate::config::SqlensConfig;
use crate::logging::LoggingConfig;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "sqlens")]
#[command(version, about = "SQL query analysis: anti-patterns, index advice, rewrites and benchmarks")]
struct Cli {
    /// Config file; defaults to <config dir>/sqlens/config.toml
    #[arg(long, global = true, env = "SQLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect anti-patterns, suggest indexes and rewrites, optionally benchmark them
    Analyze {
        /// SQL statement; read from stdin when neither this nor --file is given
        sql: Option<String>,
        #[arg(long, conflicts_with = "sql")]
        file: Option<PathBuf>,
        /// generic or sqlite
        #[arg(long)]
        dialect: Option<String>,
        /// Widest composite index to propose
        #[arg(long)]
        max_composite_width: Option<usize>,
        /// Verify every recommendation on the dataset
        #[arg(long)]
        benchmark: bool,
        /// Reference dataset, e.g. `synthetic:5000` or `sqlite:/path/to.db`
        #[arg(long, env = "SQLENS_DATASET")]
        dataset: Option<String>,
        /// Resolve column types and row counts from the dataset schema
        #[arg(long)]
        catalog_from_dataset: bool,
        /// Impact model endpoint
        #[arg(long, env = "SQLENS_INFERENCE_URL")]
        inference_url: Option<String>,
    },
    /// Show the execution plan of a statement on the dataset
    Explain {
        sql: Option<String>,
        #[arg(long, conflicts_with = "sql")]
        file: Option<PathBuf>,
        #[arg(long, env = "SQLENS_DATASET")]
        dataset: Option<String>,
    },
    /// List the built-in anti-pattern and rewrite rules
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SqlensConfig::load(cli.config.as_deref())?;

    let log_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    }
    .with_settings(&config.logging);
    let _guard = logging::init(log_config)?;

    // First Ctrl-C stops the benchmarks and keeps the rest; the second cancels everything
    let cancel = AnalysisCancellation::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupted, stopping benchmarks");
        ctrl_c.benchmarks.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted again, cancelling");
            ctrl_c.request.cancel();
        }
    });

    match cli.command {
        Command::Analyze {
            sql,
            file,
            dialect,
            max_composite_width,
            benchmark,
            dataset,
            catalog_from_dataset,
            inference_url,
        } => {
            let sql = read_sql(sql, file.as_deref()).await?;
            let service = build_service(&config, inference_url)?;

            let mut options = config.defaults.clone();
            if let Some(dialect) = dialect {
                options = options.with_dialect(dialect.parse::<SqlDialect>()?);
            }
            if let Some(width) = max_composite_width {
                options = options.with_max_composite_width(width);
            }
            if let Some(dataset) = dataset {
                options.dataset = dataset;
            }
            if benchmark {
                let dataset = options.dataset.clone();
                options = options.with_benchmark(dataset);
            }
            if catalog_from_dataset {
                let catalog = service.load_catalog(&options.dataset).await?;
                options = options.with_catalog(catalog);
            }

            analyze(&service, &sql, &options, cancel, cli.format).await
        }
        Command::Explain { sql, file, dataset } => {
            let sql = read_sql(sql, file.as_deref()).await?;
            let service = build_service(&config, None)?;
            let dataset = dataset.unwrap_or_else(|| config.defaults.dataset.clone());
            let plan = service.explain(&sql, &dataset).await?;
            match cli.format {
                OutputFormat::Table => print!("{}", output::plan_report(&plan)),
                OutputFormat::Json => println!("{}", output::to_json(&plan)?),
            }
            Ok(())
        }
        Command::Rules => {
            let rules = output::rule_catalog();
            match cli.format {
                OutputFormat::Table => println!("{}", output::rules_report(&rules)),
                OutputFormat::Json => println!("{}", output::to_json(&rules)?),
            }
            Ok(())
        }
    }
}

async fn analyze(
    service: &AnalysisService,
    sql: &str,
    options: &AnalysisOptions,
    cancel: AnalysisCancellation,
    format: OutputFormat,
) -> Result<()> {
    let result = service.analyze_with(sql, options, &cancel).await?;
    match format {
        OutputFormat::Table => print!("{}", output::analysis_report(&result)),
        OutputFormat::Json => println!("{}", output::to_json(&result)?),
    }
    Ok(())
}

fn build_service(config: &SqlensConfig, inference_url: Option<String>) -> Result<AnalysisService> {
    let service = AnalysisService::new(Arc::new(SqliteDatasetProvider::new()))
        .with_config(config.analyzer.clone())
        .with_benchmarking(config.pool.clone(), config.benchmark.clone());

    let inference = match (inference_url, &config.inference) {
        (Some(url), settings) => Some((
            url,
            settings.as_ref().map_or(5_000, |s| s.timeout_ms),
        )),
        (None, Some(settings)) => Some((settings.endpoint.clone(), settings.timeout_ms)),
        (None, None) => None,
    };

    match inference {
        Some((endpoint, timeout_ms)) => {
            let predictor =
                HttpImpactPredictor::with_timeout(endpoint, Duration::from_millis(timeout_ms))?;
            tracing::info!(endpoint = predictor.endpoint(), "impact model enabled");
            Ok(service.with_predictor(Arc::new(predictor)))
        }
        None => Ok(service),
    }
}

async fn read_sql(sql: Option<String>, file: Option<&Path>) -> Result<String> {
    let sql = match (sql, file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read SQL from {:?}", path))?,
        (None, None) => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read SQL from stdin")?;
            buffer
        }
    };
    if sql.trim().is_empty() {
        bail!("no SQL given");
    }
    Ok(sql)
}
