// Shared test helpers for integration tests
#![allow(dead_code)]

use api_harness::core::identity::Credentials;
use api_harness::harness::TestHarness;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn harness_for(server: &MockServer) -> TestHarness {
    TestHarness::new(server.uri()).expect("Failed to build harness")
}

pub fn credentials(persona: &str, token: &str) -> Credentials {
    Credentials {
        persona: persona.to_string(),
        email: format!("{}@example.com", persona),
        token: token.to_string(),
        user_id: Some(format!("{}-id", persona)),
    }
}

/// Mounts `POST /auth/register` answering with a fixed token for every caller.
pub async fn mount_register(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "user": {"id": "u-1"},
        })))
        .mount(server)
        .await;
}

/// Writes `content` as `scenarios.toml` inside a fresh temporary directory.
pub fn write_suite(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    let suite_path = temp_dir.path().join("scenarios.toml");
    fs::write(&suite_path, content).expect("Failed to write suite");
    (temp_dir, suite_path)
}

/// Helper function to create an invalid TOML suite
pub fn create_invalid_toml() -> (TempDir, PathBuf) {
    write_suite(
        r#"
[harness]
base_url = "http://localhost:1"
# Invalid TOML - missing closing bracket
[[scenarios]
name = "broken"
"#,
    )
}
