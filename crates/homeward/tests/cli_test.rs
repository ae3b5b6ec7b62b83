//! Integration tests for the `homeward` CLI binary.
//!
//! Argument parsing, config handling and error exits run without a hub;
//! the end-to-end tests talk to an in-process websocket server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use futures_util::{SinkExt, StreamExt};
use predicates::prelude::*;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `homeward` binary with env isolation.
///
/// Clears all `HOMEWARD_*` env vars and points the config file at
/// `config` so tests never touch the user's real configuration.
fn homeward_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("homeward");
    cmd.env("HOMEWARD_CONFIG", config)
        .env("NO_COLOR", "1")
        .env_remove("HOMEWARD_PROFILE")
        .env_remove("HOMEWARD_URL")
        .env_remove("HOMEWARD_TOKEN")
        .env_remove("HOMEWARD_OUTPUT")
        .env_remove("HOMEWARD_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

/// Serve one authenticated connection that answers `get_states` with
/// `states` and acknowledges everything else.
async fn serve_hub(states: Value) -> (String, tokio::task::JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let task = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let mut seen = Vec::new();

        ws.send(Message::text(json!({"type": "auth_required"}).to_string()))
            .await
            .unwrap();
        let mut authed = false;

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();

            if !authed {
                let reply = if frame["access_token"] == "tok" {
                    authed = true;
                    json!({"type": "auth_ok"})
                } else {
                    json!({"type": "auth_invalid", "message": "Invalid access token"})
                };
                ws.send(Message::text(reply.to_string())).await.unwrap();
                continue;
            }

            let reply = match frame["type"].as_str() {
                Some("ping") => json!({"id": frame["id"], "type": "pong"}),
                Some("get_states") => {
                    json!({"id": frame["id"], "type": "result", "success": true, "result": states})
                }
                _ => json!({"id": frame["id"], "type": "result", "success": true, "result": null}),
            };
            seen.push(frame);
            if ws.send(Message::text(reply.to_string())).await.is_err() {
                break;
            }
        }
        seen
    });

    (url, task)
}

fn sample_states() -> Value {
    json!([
        {"entity_id": "sensor.outside", "state": "12.5",
         "attributes": {"unit_of_measurement": "°C", "friendly_name": "Outside"},
         "last_changed": "2026-02-10T12:00:00+00:00", "last_updated": "2026-02-10T12:00:00+00:00"},
        {"entity_id": "light.kitchen", "state": "on",
         "attributes": {"friendly_name": "Kitchen"},
         "last_changed": "2026-02-10T11:00:00+00:00", "last_updated": "2026-02-10T11:00:00+00:00"}
    ])
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = homeward_cmd(&dir.path().join("config.toml"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("states")
                .and(predicate::str::contains("call"))
                .and(predicate::str::contains("watch")),
        );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("homeward"));
}

#[test]
fn test_completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .arg("lights-out")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .args(["-o", "xml", "states"])
        .assert()
        .failure()
        .code(2);
}

// ── Config handling ─────────────────────────────────────────────────

#[test]
fn test_states_without_config_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let output = homeward_cmd(&dir.path().join("config.toml"))
        .arg("states")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("No hub configured"), "{text}");
}

#[test]
fn test_url_without_token_is_auth_exit() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .args(["--url", "ws://127.0.0.1:9/api/websocket", "states"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_unknown_profile_lists_available() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
default_profile = "home"

[profiles.home]
url = "http://hub.local:8123"
token = "secret"
"#,
    );
    let output = homeward_cmd(&path)
        .args(["--profile", "office", "states"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("office"), "{text}");
    assert!(text.contains("home"), "{text}");
}

#[test]
fn test_config_path_honors_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    homeward_cmd(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_masks_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[profiles.home]
url = "http://hub.local:8123"
token = "super-secret-token"
"#,
    );
    homeward_cmd(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("hub.local")
                .and(predicate::str::contains("super-secret-token").not()),
        );
}

#[test]
fn test_config_use_switches_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
default_profile = "home"

[profiles.home]
url = "http://hub.local:8123"

[profiles.lab]
url = "http://lab.local:8123"
"#,
    );
    homeward_cmd(&path)
        .args(["config", "use", "lab"])
        .assert()
        .success();

    homeward_cmd(&path)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* lab"));
}

#[test]
fn test_config_use_unknown_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[profiles.home]\nurl = \"http://hub.local:8123\"\n");
    homeward_cmd(&path)
        .args(["config", "use", "nowhere"])
        .assert()
        .failure();
}

#[test]
fn test_call_rejects_malformed_entity_id() {
    let dir = tempfile::tempdir().unwrap();
    homeward_cmd(&dir.path().join("config.toml"))
        .args([
            "--url",
            "ws://127.0.0.1:9/api/websocket",
            "--token",
            "tok",
            "call",
            "light",
            "turn_on",
            "kitchen",
        ])
        .assert()
        .failure()
        .code(2);
}

// ── End to end ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_states_json_against_hub() {
    let (url, hub) = serve_hub(sample_states()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = tokio::task::spawn_blocking(move || {
        homeward_cmd(&config)
            .args(["--url", &url, "--token", "tok", "-o", "json", "states"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let states: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = states
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["entity_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["light.kitchen", "sensor.outside"]);
    assert_eq!(states[0]["category"], "light");

    let seen = hub.await.unwrap();
    assert_eq!(seen[0]["type"], "get_states");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_states_plain_filters_by_category() {
    let (url, _hub) = serve_hub(sample_states()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = tokio::task::spawn_blocking(move || {
        homeward_cmd(&config)
            .env("HOMEWARD_TOKEN", "tok")
            .args(["--url", &url, "-o", "plain", "states", "-c", "sensor"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "sensor.outside");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_missing_entity_is_not_found() {
    let (url, _hub) = serve_hub(sample_states()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = tokio::task::spawn_blocking(move || {
        homeward_cmd(&config)
            .args(["--url", &url, "--token", "tok", "get", "light.garage"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_sends_action() {
    let (url, hub) = serve_hub(json!([])).await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = tokio::task::spawn_blocking(move || {
        homeward_cmd(&config)
            .args([
                "--url",
                &url,
                "--token",
                "tok",
                "call",
                "light",
                "turn_on",
                "light.kitchen",
                "--data",
                r#"{"brightness": 128}"#,
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let seen = hub.await.unwrap();
    assert_eq!(seen[0]["type"], "call_service");
    assert_eq!(seen[0]["domain"], "light");
    assert_eq!(seen[0]["service"], "turn_on");
    assert_eq!(seen[0]["target"]["entity_id"], "light.kitchen");
    assert_eq!(seen[0]["service_data"]["brightness"], 128);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_token_exits_with_auth_code() {
    let (url, _hub) = serve_hub(json!([])).await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = tokio::task::spawn_blocking(move || {
        homeward_cmd(&config)
            .args(["--url", &url, "--token", "wrong", "states"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}
