//! CLI integration tests running the compiled binary against a mock service.

use std::io::Write;
use std::process::Output;

use serde_json::json;
use tempfile::NamedTempFile;
use tokio::process::Command;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run the CLI binary with arguments and extra environment variables.
///
/// The archivist environment variables are cleared first so ambient
/// configuration cannot leak into the tests.
async fn run_cli(args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_archivist"));
    cmd.args(args);
    for var in [
        "ARCHIVIST_URL",
        "ARCHIVIST_AUTHTOKEN",
        "ARCHIVIST_CLIENT_ID",
        "ARCHIVIST_CLIENT_SECRET",
    ] {
        cmd.env_remove(var);
    }
    for (var, value) in envs {
        cmd.env(var, value);
    }
    cmd.output().await.expect("Failed to execute CLI")
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

const CREATE_STORY: &str = "\
steps:
  - step:
      action: ASSETS_CREATE
      description: Create the door asset
    attributes:
      arc_display_name: Front door
";

#[tokio::test]
async fn test_run_replays_the_story() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets"))
        .and(header("authorization", "Bearer cli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identity": "assets/a1",
            "confirmation_status": "PENDING"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let story = temp_file(CREATE_STORY);
    let url = format!("http://127.0.0.1:{}", server.address().port());

    let output = run_cli(
        &[
            "run",
            story.path().to_str().unwrap(),
            "--url",
            &url,
            "--auth-token",
            "cli-token",
        ],
        &[],
    )
    .await;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "CLI failed: {stderr}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Story complete"));
}

#[tokio::test]
async fn test_connection_settings_come_from_the_environment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets"))
        .and(header("authorization", "Bearer env-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identity": "assets/a1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let story = temp_file(CREATE_STORY);
    let url = format!("http://127.0.0.1:{}", server.address().port());

    let output = run_cli(
        &["run", story.path().to_str().unwrap()],
        &[
            ("ARCHIVIST_URL", url.as_str()),
            ("ARCHIVIST_AUTHTOKEN", "env-token"),
        ],
    )
    .await;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "CLI failed: {stderr}");
}

#[tokio::test]
async fn test_token_file_supplies_the_credential() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets"))
        .and(header("authorization", "Bearer file-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identity": "assets/a1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let story = temp_file(CREATE_STORY);
    // Trailing newline is trimmed on read.
    let token = temp_file("file-token\n");
    let url = format!("http://127.0.0.1:{}", server.address().port());

    let output = run_cli(
        &[
            "run",
            story.path().to_str().unwrap(),
            "--url",
            &url,
            "--auth-token-file",
            token.path().to_str().unwrap(),
        ],
        &[],
    )
    .await;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "CLI failed: {stderr}");
}

#[tokio::test]
async fn test_run_without_a_url_fails() {
    let story = temp_file("steps: []\n");

    let output = run_cli(
        &["run", story.path().to_str().unwrap(), "--auth-token", "t"],
        &[],
    )
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ARCHIVIST_URL"));
}

#[tokio::test]
async fn test_run_with_a_missing_story_file_fails() {
    let output = run_cli(
        &[
            "run",
            "/nonexistent/story.yaml",
            "--url",
            "https://app.datatrails.ai",
            "--auth-token",
            "t",
        ],
        &[],
    )
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read story file"));
}

#[tokio::test]
async fn test_failing_story_exits_nonzero() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/archivist/v2/assets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "quota",
            "message": "tenancy over limit"
        })))
        .mount(&server)
        .await;

    let story = temp_file(CREATE_STORY);
    let url = format!("http://127.0.0.1:{}", server.address().port());

    let output = run_cli(
        &[
            "run",
            story.path().to_str().unwrap(),
            "--url",
            &url,
            "--auth-token",
            "t",
        ],
        &[],
    )
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Story failed"));
}
