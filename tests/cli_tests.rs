//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn session_recorder_bin(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("session-recorder").expect("binary is built");
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("SESSION_RECORDER_API_URL")
        .env_remove("SESSION_RECORDER_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_output() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn record_help_lists_flags() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .args(["record", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cadence"))
        .stdout(predicate::str::contains("--notify"))
        .stdout(predicate::str::contains("--api-url"));
}

#[test]
fn version_output() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("session-recorder"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_subcommand_is_usage_error() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home).assert().code(2);
}

#[test]
fn config_path_command() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("session-recorder"))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .args(["config", "set", "cadence", "5s"])
        .assert()
        .success();
    session_recorder_bin(&home)
        .args(["config", "get", "cadence"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5s"));
}

#[test]
fn config_list_masks_token() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .args(["config", "set", "token", "0123456789abcdef"])
        .assert()
        .success();
    session_recorder_bin(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0123...cdef"))
        .stdout(predicate::str::contains("0123456789abcdef").not());
}

#[test]
fn auth_set_token_and_status() {
    let home = TempDir::new().unwrap();
    session_recorder_bin(&home)
        .args(["auth", "set-token", "tok-abcdefghijkl"])
        .assert()
        .success();
    session_recorder_bin(&home)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tok-...ijkl"))
        .stdout(predicate::str::contains("credential file"));
    session_recorder_bin(&home)
        .args(["auth", "clear"])
        .assert()
        .success();
    session_recorder_bin(&home)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not set)"));
}
