//! The built `taskring` binary end to end

use std::fs;
use std::process::Command;

fn taskring() -> Command {
    Command::new(env!("CARGO_BIN_EXE_taskring"))
}

#[test]
fn test_print_config_renders_effective_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskring.toml");
    fs::write(&path, "[executor]\nname = \"from-file\"\nbacklog = 64\n").unwrap();

    let output = taskring()
        .args(["--config-file", path.to_str().unwrap(), "--print-config", "-b", "128"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("name = \"from-file\""));
    assert!(stdout.contains("backlog = 128"));
    println!("✓ --print-config shows file values with CLI overrides applied");
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = taskring()
        .args(["--config-file", dir.path().join("nope.toml").to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
    println!("✓ A missing explicit config file exits with status 2");
}

#[test]
fn test_short_throughput_run() {
    let output = taskring()
        .args([
            "--workload",
            "throughput",
            "--duration",
            "1",
            "--threads",
            "2",
            "--log-level",
            "off",
            "--no-color",
        ])
        .env("HOME", tempfile::tempdir().unwrap().path())
        .env_remove("XDG_CONFIG_HOME")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Throughput"));
    assert!(stdout.contains("operations:"));
    println!("✓ One-second throughput run completed and reported");
}
