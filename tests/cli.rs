//! CLI 端到端测试

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn kitwarden(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kitwarden").unwrap();
    cmd.arg("--config")
        .arg(config_dir.path().join("config.json"))
        .env_remove("KITWARDEN_SUPERVISOR_PID")
        .env_remove("KITWARDEN_WAIT_TIMEOUT_MS")
        .env_remove("KITWARDEN_WAIT_RETRY_MS")
        .env_remove("KITWARDEN_REAP_TIMEOUT_MS")
        .env_remove("KITWARDEN_REAP_RETRY_MS")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_version() {
    Command::cargo_bin("kitwarden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_kill_rejects_non_positive_pid() {
    let dir = TempDir::new().unwrap();
    kitwarden(&dir)
        .args(["kill", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Expected kit process id to be > 0, got 0",
        ));
}

#[test]
fn test_wait_rejects_interval_above_timeout() {
    let dir = TempDir::new().unwrap();
    kitwarden(&dir)
        .args(["wait", "--timeout-ms", "10", "--retry-ms", "50"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid retry policy"));
}

#[test]
fn test_status_with_invalid_supervisor_pid() {
    let dir = TempDir::new().unwrap();
    kitwarden(&dir)
        .args(["status", "--supervisor-pid", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("supervisor process id"));
}

#[cfg(unix)]
#[test]
fn test_status_json_for_live_supervisor() {
    let dir = TempDir::new().unwrap();
    let own = std::process::id().to_string();
    let output = kitwarden(&dir)
        .args(["status", "--json", "--supervisor-pid", own.as_str()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["supervisor"], serde_json::json!(std::process::id()));
    assert_eq!(report["kits"]["doc"], serde_json::json!([]));
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), "{ nope").unwrap();
    kitwarden(&dir)
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[cfg(unix)]
#[test]
fn test_wait_times_out_when_supervisor_has_no_kits() {
    let dir = TempDir::new().unwrap();
    let own = std::process::id().to_string();
    kitwarden(&dir)
        .args([
            "wait",
            "--supervisor-pid",
            own.as_str(),
            "--timeout-ms",
            "30",
            "--retry-ms",
            "10",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("after 4 attempts"));
}

#[test]
fn test_log_file_receives_error_log() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("logs").join("kitwarden.log");
    kitwarden(&dir)
        .arg("--log-file")
        .arg(&log_path)
        .args(["kill", "0"])
        .assert()
        .code(2);

    let written = std::fs::read_to_string(&log_path).unwrap();
    assert!(written.contains("Expected kit process id to be > 0, got 0"), "{}", written);
}
