//! Integration tests for the `fmc` CLI binary.
//!
//! Argument parsing, config handling, and end-to-end requests against a
//! wiremock FMC. Nothing here touches the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `fmc` binary with env isolation.
///
/// Clears all `FMC_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn fmc_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fmc");
    cmd.env("HOME", "/tmp/fmc-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fmc-cli-test-nonexistent")
        .env_remove("FMC_PROFILE")
        .env_remove("FMC_CONFIG")
        .env_remove("FMC_HOST")
        .env_remove("FMC_USERNAME")
        .env_remove("FMC_PASSWORD")
        .env_remove("FMC_INSECURE")
        .env_remove("FMC_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// `fmc_cmd()` pointed at a config file inside `dir`.
fn fmc_with_config(dir: &TempDir) -> (assert_cmd::Command, PathBuf) {
    let path = dir.path().join("config.toml");
    let mut cmd = fmc_cmd();
    cmd.arg("--config").arg(&path);
    (cmd, path)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_profile(path: &Path, host: &str) {
    std::fs::write(
        path,
        format!(
            r#"
default_profile = "lab"

[profiles.lab]
host = "{host}"
username = "api"
password = "hunter2"
"#
        ),
    )
    .unwrap();
}

async fn mock_fmc() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_platform/v1/auth/generatetoken"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("X-auth-access-token", "tok-1")
                .insert_header("DOMAIN_UUID", "dom-1"),
        )
        .mount(&server)
        .await;
    server
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = fmc_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    fmc_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("login")
            .and(predicate::str::contains("get"))
            .and(predicate::str::contains("request"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    fmc_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fmc"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    fmc_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    fmc_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = fmc_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_get_without_config_fails_with_usage() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = fmc_with_config(&dir);
    cmd.args(["get", "object/networks"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No FMC host configured"));
}

#[test]
fn test_unknown_profile_fails_with_usage() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, "fmc.lab.local");
    cmd.args(["--profile", "prod", "login"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("prod").and(predicate::str::contains("lab")));
}

#[test]
fn test_bad_method_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, "fmc.lab.local");
    cmd.args(["request", "GE T", "object/networks"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("method"));
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    cmd.args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(path.display().to_string()));
}

#[test]
fn test_config_show_without_file_renders_defaults() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = fmc_with_config(&dir);
    cmd.args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gate_capacity = 1"));
}

#[test]
fn test_config_show_redacts_passwords() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, "fmc.lab.local");
    cmd.args(["config", "show"]).assert().success().stdout(
        predicate::str::contains("fmc.lab.local")
            .and(predicate::str::contains("hunter2").not())
            .and(predicate::str::contains("********")),
    );
}

#[test]
fn test_config_init_from_flags() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    cmd.args([
        "--profile",
        "lab",
        "--host",
        "10.0.0.5:8443",
        "--username",
        "api",
        "--insecure",
        "config",
        "init",
    ])
    .assert()
    .success();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[profiles.lab]"), "{text}");
    assert!(text.contains("10.0.0.5:8443"), "{text}");
    assert!(text.contains("insecure = true"), "{text}");

    let (mut cmd, _) = fmc_with_config(&dir);
    cmd.args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab *"));
}

#[test]
fn test_config_use_switches_default() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, "fmc.lab.local");

    cmd.args(["config", "use", "missing"]).assert().code(2);

    let (mut cmd, _) = fmc_with_config(&dir);
    cmd.args(["config", "use", "lab"]).assert().success();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(r#"default_profile = "lab""#), "{text}");
}

// ── Requests against a mock FMC ─────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_login_prints_domain() {
    let server = mock_fmc().await;
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, &server.uri());

    cmd.arg("login").assert().success().stdout(
        predicate::str::contains("dom-1")
            .and(predicate::str::contains("/api/fmc_config/v1/domain/dom-1")),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_prints_json() {
    let server = mock_fmc().await;
    Mock::given(method("GET"))
        .and(path("/api/fmc_config/v1/domain/dom-1/object/networks"))
        .and(header("X-auth-access-token", "tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"name": "net1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, &server.uri());

    cmd.args(["get", "object/networks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"net1\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_request_posts_body() {
    let server = mock_fmc().await;
    Mock::given(method("POST"))
        .and(path("/api/fmc_config/v1/domain/dom-1/object/hosts"))
        .and(wiremock::matchers::body_json(json!({"name": "h1", "value": "10.1.1.1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "h-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, &server.uri());

    cmd.args([
        "request",
        "post",
        "object/hosts",
        "--data",
        r#"{"name":"h1","value":"10.1.1.1"}"#,
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("h-1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_api_error_shows_envelope() {
    let server = mock_fmc().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {
                "category": "Fatal",
                "severity": "ERROR",
                "messages": [{ "description": "boom" }]
            }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, &server.uri());

    cmd.args(["get", "object/networks"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("boom"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_not_found_exit_code() {
    let server = mock_fmc().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, &server.uri());

    cmd.args(["get", "object/networks/nope"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("object/networks/nope"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_login_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = fmc_with_config(&dir);
    write_profile(&path, &server.uri());

    cmd.arg("login")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Authentication failed"));
}
