// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use hot_redeploy::config::{RedeployConfig, from_toml_str, load_and_validate};
use hot_redeploy::errors::RedeployError;
use hot_redeploy::logging::LogLevel;
use hot_redeploy::types::DetectionStrategy;

#[test]
fn empty_file_yields_defaults() {
    let file = NamedTempFile::new().unwrap();

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg, RedeployConfig::default());
    assert_eq!(cfg.strategy, DetectionStrategy::Watch);
    assert_eq!(cfg.tick_period, Duration::from_millis(200));
    assert_eq!(cfg.grace_period, Duration::from_millis(500));
    assert_eq!(cfg.redeploy_check_period, Duration::from_millis(1000));
    assert_eq!(cfg.marker_file, ".redeployme");
    assert!(cfg.ignore.is_empty());
    assert_eq!(cfg.log_level, None);
}

#[test]
fn full_section_is_read() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[redeploy]
strategy = "marker"
tick_period_ms = 100
grace_period_ms = 750
redeploy_check_period_ms = 2500
marker_file = ".rebuild"
ignore = ["**/*.swp", "**/*~"]
log_level = "debug"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.strategy, DetectionStrategy::Marker);
    assert_eq!(cfg.tick_period, Duration::from_millis(100));
    assert_eq!(cfg.grace_period, Duration::from_millis(750));
    assert_eq!(cfg.redeploy_check_period, Duration::from_millis(2500));
    assert_eq!(cfg.marker_file, ".rebuild");
    assert_eq!(cfg.ignore, vec!["**/*.swp", "**/*~"]);
    assert_eq!(cfg.log_level, Some(LogLevel::Debug));
}

#[test]
fn unknown_strategy_is_a_toml_error() {
    let result = from_toml_str("[redeploy]\nstrategy = \"poll\"\n");
    assert!(matches!(result, Err(RedeployError::TomlError(_))));
}

#[test]
fn unknown_key_is_rejected() {
    let result = from_toml_str("[redeploy]\ngrace_ms = 10\n");
    assert!(matches!(result, Err(RedeployError::TomlError(_))));
}

#[test]
fn zero_tick_period_is_a_config_error() {
    match from_toml_str("[redeploy]\ntick_period_ms = 0\n") {
        Err(RedeployError::ConfigError(msg)) => assert!(msg.contains("tick_period_ms")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn marker_file_with_directory_is_a_config_error() {
    let result = from_toml_str("[redeploy]\nmarker_file = \"build/.redeployme\"\n");
    assert!(matches!(result, Err(RedeployError::ConfigError(_))));
}

#[test]
fn invalid_ignore_glob_names_the_pattern() {
    match from_toml_str("[redeploy]\nignore = [\"src/[\"]\n") {
        Err(RedeployError::ConfigError(msg)) => assert!(msg.contains("src/[")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/here/Redeploy.toml");
    assert!(matches!(result, Err(RedeployError::IoError(_))));
}
