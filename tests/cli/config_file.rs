//! TOML configuration files and CLI overrides

use clap::Parser;
use std::fs;
use taskring::app::args::Args;
use taskring::app::{AppConfig, ConfigError, WorkloadKind};
use taskring::core::logging::LogFormat;
use taskring::executor::api::ExecutorKind;
use taskring::queue::WaitStrategy;

const SAMPLE: &str = r#"
[logging]
level = "warn"
format = "ext"

[executor]
name = "nightly"
kind = "work-queue"
threads = 3
backlog = 256
wait-strategy = "busy-spin"
auto-startup = false
phase = 7

[workload]
kind = "batch"
duration-secs = 2
producers = 4
batch-size = 25
"#;

#[test]
fn test_load_config_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskring.toml");
    fs::write(&path, SAMPLE).unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.logging.level.as_deref(), Some("warn"));
    assert_eq!(config.logging.format, LogFormat::Ext);
    assert_eq!(config.executor.name, "nightly");
    assert_eq!(config.executor.kind, ExecutorKind::WorkQueue);
    assert_eq!(config.executor.threads, Some(3));
    assert_eq!(config.executor.backlog, 256);
    assert_eq!(config.executor.wait_strategy, WaitStrategy::BusySpin);
    assert!(!config.executor.auto_startup);
    assert_eq!(config.executor.phase, 7);
    assert_eq!(config.workload.kind, WorkloadKind::Batch);
    assert_eq!(config.workload.batch_size, 25);
    assert!(config.validate().is_ok());
    println!("✓ Every section of the sample file loaded");
}

#[test]
fn test_cli_values_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskring.toml");
    fs::write(&path, SAMPLE).unwrap();

    let args = Args::try_parse_from([
        "taskring",
        "--config-file",
        path.to_str().unwrap(),
        "--workload",
        "schedule",
        "--threads",
        "2",
        "--period-ms",
        "40",
        "--log-level",
        "debug",
    ])
    .unwrap();
    let mut config = AppConfig::load(args.config_file.as_deref()).unwrap();
    config.apply_args(&args).unwrap();

    assert_eq!(config.workload.kind, WorkloadKind::Schedule);
    assert_eq!(config.executor.threads, Some(2));
    assert_eq!(config.workload.period_ms, 40);
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
    assert_eq!(config.workload.producers, 4, "file value kept when no flag given");
    println!("✓ Command line flags win over the configuration file");
}

#[test]
fn test_written_config_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round-trip.toml");
    let original = AppConfig::from_toml_str(SAMPLE).unwrap();

    fs::write(&path, original.to_toml_string().unwrap()).unwrap();
    let reloaded = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(reloaded, original);
    println!("✓ Rendered configuration reloads to the same values");
}

#[test]
fn test_invalid_values_are_reported() {
    let config = AppConfig::from_toml_str("[executor]\nbacklog = 0").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

    let unknown_kind = AppConfig::from_toml_str("[executor]\nkind = \"fork-join\"");
    assert!(matches!(unknown_kind, Err(ConfigError::Parse { .. })));
    println!("✓ Zero backlog and unknown executor kinds are rejected");
}
