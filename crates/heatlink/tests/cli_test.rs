//! Integration tests for the `heatlink` CLI binary.
//!
//! These validate argument parsing, help output, and error handling —
//! all without requiring a live cloud account.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `heatlink` binary with env isolation.
///
/// Clears all `HEATLINK_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn heatlink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("heatlink");
    cmd.env("HOME", "/tmp/heatlink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/heatlink-cli-test-nonexistent")
        .env_remove("HEATLINK_PROFILE")
        .env_remove("HEATLINK_TOKEN")
        .env_remove("HEATLINK_OUTPUT")
        .env_remove("HEATLINK_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = heatlink_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    heatlink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("heat pumps")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("vane")),
    );
}

#[test]
fn test_version_flag() {
    heatlink_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("heatlink"));
}

#[test]
fn test_unknown_subcommand_fails() {
    heatlink_cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ── Auth preconditions ──────────────────────────────────────────────

#[test]
fn test_devices_without_token_exits_auth_code() {
    let output = heatlink_cmd().args(["devices", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected auth exit code 3");
    let text = combined_output(&output);
    assert!(
        text.contains("No access token"),
        "Expected token guidance, got:\n{text}"
    );
}

#[test]
fn test_set_without_token_exits_auth_code() {
    let output = heatlink_cmd()
        .args(["set", "42", "--temp", "21"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_set_rejects_non_numeric_device_id() {
    heatlink_cmd()
        .args(["set", "not-a-device", "--temp", "21"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_vane_rejects_unknown_position() {
    heatlink_cmd()
        .args(["vane", "42", "horizontal", "sideways"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_watch_interval_out_of_range_is_rejected() {
    // Interval validation happens at the configuration boundary,
    // before any network credentials are even resolved.
    for bad in ["0", "90"] {
        let output = heatlink_cmd()
            .args(["--token", "dummy", "watch", "--interval", bad])
            .output()
            .unwrap();
        assert_eq!(
            output.status.code(),
            Some(2),
            "interval {bad} should be a usage error"
        );
        let text = combined_output(&output);
        assert!(
            text.contains("refresh_interval"),
            "expected validation message for {bad}, got:\n{text}"
        );
    }
}

#[test]
fn test_config_set_interval_out_of_range_is_rejected() {
    let output = heatlink_cmd()
        .args(["config", "set-interval", "90"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Config inspection ───────────────────────────────────────────────

#[test]
fn test_config_path_prints_a_path() {
    heatlink_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_with_no_profiles() {
    heatlink_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no profiles configured"));
}
