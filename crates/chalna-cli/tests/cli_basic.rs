//! Basic CLI E2E tests.
//!
//! Each test runs the binary against its own temporary HOME so the config
//! file and session database start fresh.

use std::process::{Command, Stdio};

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_chalna-cli"))
        .args(args)
        .env("HOME", home.path())
        .env("CHALNA_ENV", "dev")
        .env("TZ", "UTC")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("event line is JSON"))
        .collect()
}

#[test]
fn test_config_defaults() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["config", "get", "defaults.life_expectancy"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "80");
}

#[test]
fn test_config_set_rejects_invalid_value() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&home, &["config", "set", "defaults.life_expectancy", "200"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, _, code) = run_cli(&home, &["config", "set", "sleep.start_time", "23:30"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(&home, &["config", "get", "sleep.start_time"]);
    assert_eq!(stdout.trim(), "23:30");
}

#[test]
fn test_profile_set_emits_countdown() {
    let home = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_cli(&home, &["profile", "set", "--birth-date", "2000-01-01"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let events = json_lines(&stdout);
    assert!(events.iter().any(|e| e["type"] == "CountdownUpdated"));

    let (stdout, _, code) = run_cli(&home, &["profile", "show"]);
    assert_eq!(code, 0);
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(profile["birth_date"], "2000-01-01");
    assert_eq!(profile["deadline"], "2080-01-01T00:00:00");
}

#[test]
fn test_invalid_birth_date_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&home, &["profile", "set", "--birth-date", "not-a-date"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_start_without_birth_date_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&home, &["timer", "start"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("birth date"));
}

#[test]
fn test_timer_status() {
    let home = TempDir::new().unwrap();
    run_cli(&home, &["profile", "set", "--birth-date", "1990-06-15", "--life-expectancy", "85"]);
    let (stdout, _, code) = run_cli(&home, &["timer", "status"]);
    assert_eq!(code, 0);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["ticking"], true);
    assert_eq!(status["snapshot"]["type"], "StateSnapshot");
    assert_eq!(status["snapshot"]["deadline"], "2075-06-15T00:00:00");
}

#[test]
fn test_stop_and_watch() {
    let home = TempDir::new().unwrap();
    run_cli(&home, &["profile", "set", "--birth-date", "2000-01-01"]);
    let (stdout, _, code) = run_cli(&home, &["timer", "stop"]);
    assert_eq!(code, 0);
    assert_eq!(json_lines(&stdout)[0]["type"], "TimerStopped");

    // Stopped: watching produces no countdown events.
    let (stdout, _, code) = run_cli(&home, &["timer", "watch", "--ticks", "1"]);
    assert_eq!(code, 0);
    assert!(json_lines(&stdout)
        .iter()
        .all(|e| e["type"] != "CountdownUpdated"));
}

#[test]
fn test_diagnostics_health() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["diagnostics", "health"]);
    assert_eq!(code, 0);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["storage"]["healthy"], true);
    assert_eq!(report["timezone"]["zone"], "UTC");
    assert!(report["keys"]
        .as_array()
        .unwrap()
        .iter()
        .any(|key| key == "death_clock_analytics"));
}

#[test]
fn test_birth_date_after_low_life_expectancy_fails() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(&home, &["profile", "set", "--life-expectancy", "30"]);
    assert_eq!(code, 0);
    let (_, stderr, code) = run_cli(&home, &["profile", "set", "--birth-date", "1950-01-01"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("below the current age"));

    let (_, stderr, code) = run_cli(
        &home,
        &["profile", "set", "--birth-date", "1950-01-01", "--life-expectancy", "100"],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
}
