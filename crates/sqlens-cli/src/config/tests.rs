use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sqlens_analyzer::Severity;
use sqlens_services::SqlDialect;

#[test]
fn test_empty_file_is_default() {
    assert_eq!(SqlensConfig::from_toml("").unwrap(), SqlensConfig::default());
}

#[test]
fn test_partial_sections() {
    let config = SqlensConfig::from_toml(indoc! {r#"
        [analyzer.detector]
        correlated_in_where = "warning"
        disabled = ["AP003"]

        [analyzer.advisor]
        max_composite_width = 2

        [defaults]
        dialect = "sqlite"
        dataset = "synthetic:500"

        [benchmark]
        repetitions = 7

        [pool]
        max_connections = 8

        [inference]
        endpoint = "http://localhost:8500/predict"

        [logging]
        json_file = true
    "#})
    .unwrap();

    assert_eq!(config.analyzer.detector.correlated_in_where, Severity::Warning);
    assert_eq!(config.analyzer.detector.disabled, vec!["AP003".to_string()]);
    assert!(config.analyzer.detector.assume_distinct_sources);
    assert_eq!(config.analyzer.advisor.max_composite_width, 2);
    assert_eq!(config.defaults.dialect, SqlDialect::Sqlite);
    assert_eq!(config.defaults.dataset, "synthetic:500");
    assert!(!config.defaults.run_benchmark);
    assert_eq!(config.benchmark.repetitions(), 7);
    assert_eq!(config.benchmark.warmup_runs, 1);
    assert_eq!(config.pool.max_connections(), 8);
    assert_eq!(
        config.inference,
        Some(InferenceSettings {
            endpoint: "http://localhost:8500/predict".into(),
            timeout_ms: 5_000,
        })
    );
    assert!(config.logging.json_file);
    assert_eq!(config.logging.filter, None);
}

#[test]
fn test_unknown_values_are_rejected() {
    let err = SqlensConfig::from_toml("[defaults]\ndialect = \"oracle\"\n").unwrap_err();
    assert!(err.to_string().contains("unknown variant"));
}

#[test]
fn test_explicit_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = SqlensConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"));
}

#[test]
fn test_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pool]\nmax_connections = 3\n").unwrap();

    let config = SqlensConfig::load(Some(&path)).unwrap();
    assert_eq!(config.pool.max_connections(), 3);
}

#[test]
fn test_default_path_location() {
    if let Some(path) = default_config_path() {
        assert!(path.ends_with("sqlens/config.toml"));
    }
}
