//! End-to-end tests running the `fqapi` binary against a mock daemon.

use std::path::Path;
use std::process::Output;

use fqapi_test_utils::daemon::MockDaemon;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::process::Command;

async fn fqapi(socket: &Path, args: &[&str]) -> Output {
    let config_dir = tempfile::tempdir().unwrap();
    Command::new(env!("CARGO_BIN_EXE_fqapi"))
        .arg("--config")
        .arg(config_dir.path().join("fqapi.toml"))
        .arg("--socket")
        .arg(socket)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .await
        .unwrap()
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_get_prints_payload() {
    let daemon = MockDaemon::start().await;
    daemon.reply(
        "GET",
        "/1/ftp",
        200,
        Some(json!({"bob": {"directory": "www/bob", "rw": "ro"}})),
    );

    let output = fqapi(daemon.socket_path(), &["get", "/1/ftp"]).await;
    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout_json(&output),
        json!({"bob": {"directory": "www/bob", "rw": "ro"}})
    );
}

#[test_log::test(tokio::test)]
async fn test_post_sends_json_body() {
    let daemon = MockDaemon::start().await;
    daemon.reply("POST", "/1/ftp", 201, None);

    let output = fqapi(
        daemon.socket_path(),
        &["post", "/1/ftp", r#"{"name":"x","directory":"d","rw":"wo"}"#],
    )
    .await;
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());

    let requests = daemon.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].json(),
        Some(json!({"name": "x", "directory": "d", "rw": "wo"}))
    );
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
}

#[test_log::test(tokio::test)]
async fn test_api_error_exits_with_message() {
    let daemon = MockDaemon::start().await;
    daemon.reply("POST", "/1/ftp", 200, Some(json!({"name": "x"})));

    let output = fqapi(
        daemon.socket_path(),
        &["--fail", "200=already exists", "post", "/1/ftp", r#"{"name":"x"}"#],
    )
    .await;
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fqapi: already exists"), "{stderr}");
}

#[test_log::test(tokio::test)]
async fn test_unlisted_error_uses_generic_message() {
    let daemon = MockDaemon::start().await;

    let output = fqapi(daemon.socket_path(), &["delete", "/1/ftp/nobody"]).await;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fqapi: API error: 404 Not Found"), "{stderr}");
}

#[test_log::test(tokio::test)]
async fn test_allowed_code_prints_payload() {
    let daemon = MockDaemon::start().await;

    let output = fqapi(daemon.socket_path(), &["--allow", "404", "get", "/1/ftp/nobody"]).await;
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout_json(&output), json!({"error": "not found"}));
}

#[test_log::test(tokio::test)]
async fn test_missing_daemon_reports_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let output = fqapi(&dir.path().join("absent.sock"), &["get", "/1/ftp"]).await;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not running"), "{stderr}");
}

#[test_log::test(tokio::test)]
async fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_fqapi"))
        .args(["--config", "/nonexistent/fqapi.toml", "version"])
        .output()
        .await
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(&format!("fqapi {}", env!("CARGO_PKG_VERSION"))));
}

#[test_log::test(tokio::test)]
async fn test_relative_path_is_rejected() {
    let daemon = MockDaemon::start().await;

    let output = fqapi(daemon.socket_path(), &["get", "1/ftp"]).await;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid resource path"), "{stderr}");
    assert!(daemon.requests().is_empty());
}
