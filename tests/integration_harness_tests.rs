//! # Harness Integration Tests / 测试工具集成测试
//!
//! These tests drive `TestHarness::run_test` against `wiremock` servers and
//! check the call contract: status comparison, the `{}` failure body, the
//! counters, and which bearer token a call carries.
//!
//! 这些测试针对 `wiremock` 服务器驱动 `TestHarness::run_test`，检查调用约定：
//! 状态码比较、失败时的 `{}` 响应体、计数器以及调用携带的 bearer 令牌。

mod common;

use api_harness::core::models::FailureReason;
use api_harness::harness::{Auth, Call, HarnessOptions, TestHarness};
use api_harness::infra::http::FilePart;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{credentials, harness_for};

#[tokio::test]
async fn test_health_check_passes_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let outcome = harness.run_test("Health", Call::get("health", 200)).await;

    assert!(outcome.success);
    assert_eq!(outcome.status, Some(200));
    assert_eq!(outcome.body, json!({"status": "healthy"}));
    let counters = harness.counters();
    assert_eq!((counters.tests_run, counters.tests_passed), (1, 1));
}

#[tokio::test]
async fn test_unexpected_status_fails_with_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "x@example.com", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})))
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let call = Call::post("auth/login", 200).json(json!({"email": "x@example.com", "password": "wrong"}));
    let outcome = harness.run_test("Bad Login", call).await;

    assert!(!outcome.success);
    assert_eq!(outcome.status, Some(401));
    assert_eq!(outcome.body, json!({}));
    assert!(outcome.raw.is_none());

    let counters = harness.counters();
    assert_eq!((counters.tests_run, counters.tests_passed), (1, 0));
    assert_eq!(counters.tests_failed(), 1);

    let result = &harness.results()[0];
    assert_eq!(result.reason, Some(FailureReason::StatusMismatch));
    assert!(result.details.contains("Expected 200, got 401"));
    assert!(result.details.contains("Invalid credentials"));
}

#[tokio::test]
async fn test_expected_error_status_counts_as_pass() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let outcome = harness.run_test("Anonymous notes", Call::get("notes", 401)).await;
    assert!(outcome.success);
    assert_eq!(harness.counters().tests_passed, 1);
}

#[tokio::test]
async fn test_network_error_is_a_logged_failure() {
    // Nothing listens on the port of a dropped server.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let mut harness = TestHarness::new(uri).unwrap();
    let outcome = harness.run_test("Unreachable", Call::get("health", 200)).await;

    assert!(!outcome.success);
    assert_eq!(outcome.status, None);
    assert_eq!(outcome.body, json!({}));
    assert_eq!(harness.counters().tests_run, 1);
    assert_eq!(harness.results()[0].reason, Some(FailureReason::Network));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let call = Call::get("reports/slow", 200).timeout(Duration::from_millis(200));
    let outcome = harness.run_test("Slow report", call).await;

    assert!(!outcome.success);
    assert_eq!(harness.results()[0].reason, Some(FailureReason::Timeout));
}

#[tokio::test]
async fn test_requires_auth_attaches_stored_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer token-regular"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "regular@example.com"})))
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    harness.set_credential(credentials("regular", "token-regular"));
    let outcome = harness.run_test("Me", Call::get("auth/me", 200).requires_auth()).await;

    assert!(outcome.success);
    assert_eq!(outcome.body["email"], "regular@example.com");
}

#[tokio::test]
async fn test_requires_auth_without_credential_sends_no_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let outcome = harness.run_test("Anonymous", Call::get("notes", 401).requires_auth()).await;
    assert!(outcome.success);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_explicit_identity_beats_default_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer token-special"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "special@example.com"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer token-regular"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "regular@example.com"})))
        .mount(&server)
        .await;

    let regular = credentials("regular", "token-regular");
    let special = credentials("special", "token-special");
    let mut harness = harness_for(&server);
    harness.set_credential(regular.clone());

    // Alternate identities without touching the stored credential.
    let as_special = harness
        .run_test("Me as special", Call::get("auth/me", 200).as_identity(&special))
        .await;
    let as_default = harness.run_test("Me as default", Call::get("auth/me", 200).requires_auth()).await;
    let as_regular = harness
        .run_test("Me as regular", Call::get("auth/me", 200).with_auth(Auth::As(regular.clone())))
        .await;

    assert_eq!(as_special.body["email"], "special@example.com");
    assert_eq!(as_default.body["email"], "regular@example.com");
    assert_eq!(as_regular.body["email"], "regular@example.com");
    assert_eq!(harness.credential(), Some(&regular));
    assert_eq!(harness.counters().tests_passed, 3);
}

#[tokio::test]
async fn test_non_json_body_is_summarized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4 test".to_vec()),
        )
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let outcome = harness.run_test("Export", Call::get("export", 200)).await;

    assert!(outcome.success);
    assert_eq!(outcome.body["content_type"], "application/pdf");
    assert_eq!(outcome.body["size"], 13);
    assert_eq!(outcome.raw.unwrap().bytes, b"%PDF-1.4 test".to_vec());
}

#[tokio::test]
async fn test_multipart_upload_carries_file_and_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notes/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "n-1"})))
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let call = Call::post("notes/upload", 200)
        .field("title", "QA audio")
        .file(FilePart {
            field: "file".into(),
            file_name: "test_audio.wav".into(),
            mime: "audio/wav".into(),
            bytes: api_harness::core::payload::synth_wav(100),
        });
    let outcome = harness.run_test("Upload", call).await;
    assert!(outcome.success);

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap().to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"title\""));
    assert!(body.contains("filename=\"test_audio.wav\""));
    assert!(body.contains("RIFF"));
}

#[tokio::test]
async fn test_every_call_increments_tests_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    let mut harness = TestHarness::with_options(
        server.uri(),
        HarnessOptions {
            locale: "zh-CN".into(),
            ..HarnessOptions::default()
        },
    )
    .unwrap();
    harness.run_test("ok", Call::get("health", 200)).await;
    harness.run_test("wrong status", Call::get("health", 201)).await;
    harness.run_test("missing", Call::get("nothing-here", 200)).await;
    harness.record_skip("never ran", "required step failed");

    let counters = harness.counters();
    assert_eq!(counters.tests_run, 3);
    assert_eq!(counters.tests_passed, 1);
    assert_eq!(harness.results().len(), 4);
    assert!((counters.success_rate() - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_undeclared_json_is_still_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/notes/n-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_bytes(br#"{"id": "n-1", "title": "patched"}"#.to_vec()),
        )
        .mount(&server)
        .await;

    let mut harness = harness_for(&server);
    let call = Call::patch("notes/n-1", 200).json(json!({"title": "patched"}));
    let outcome = harness.run_test("Patch note", call).await;

    assert!(outcome.success);
    assert_eq!(outcome.body, json!({"id": "n-1", "title": "patched"}));
}
