//! # Scenario Execution Integration Tests / 场景执行集成测试
//!
//! Runs small suites through the `Executor` against `wiremock` servers:
//! persona establishment, saved variables, body checks, required steps,
//! polling, export format checks and multiple identities.
//!
//! 通过 `Executor` 针对 `wiremock` 服务器运行小型套件：身份建立、保存的变量、
//! 响应体检查、必需步骤、轮询、导出格式检查以及多身份。

mod common;

use api_harness::config::Suite;
use api_harness::core::execution::Executor;
use api_harness::core::models::{FailureReason, ScenarioReport};
use serde_json::json;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{harness_for, mount_register};

fn suite(toml_text: &str) -> Suite {
    let suite: Suite = toml::from_str(toml_text).expect("suite parses");
    suite.validate().expect("suite validates");
    suite
}

async fn run_first(server: &MockServer, suite: &Suite) -> ScenarioReport {
    let mut executor = Executor::new(harness_for(server), suite.personas.clone());
    executor.run_scenario(&suite.scenarios[0]).await
}

fn names(report: &ScenarioReport) -> Vec<&str> {
    report.results.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn test_persona_saved_variables_and_checks() {
    let server = MockServer::start().await;
    mount_register(&server, "tok-1").await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "n-42", "title": "QA note"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/n-42"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "n-42",
            "title": "QA note",
            "owner": "u-1",
            "tags": ["meeting", "qa"],
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/notes/n-42"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[personas.regular]

[[scenarios]]
name = "notes"
persona = "regular"

[[scenarios.steps]]
name = "Create"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "QA note" }
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Get"
path = "notes/${note_id}"
checks = [
    { pointer = "/id", equals = "${note_id}" },
    { pointer = "/owner", equals = "${user_id}", label = "owned by persona" },
    { pointer = "/tags", contains = "qa" },
]

[[scenarios.steps]]
name = "Delete"
method = "DELETE"
path = "notes/${note_id}"
expect = 204
"#,
    );

    let report = run_first(&server, &suite).await;

    assert_eq!(
        names(&report),
        vec![
            "Register persona 'regular'",
            "Create",
            "Get",
            "Get › /id == \"n-42\"",
            "Get › owned by persona",
            "Get › /tags contains 'qa'",
            "Delete",
        ]
    );
    let counters = report.counters();
    assert_eq!((counters.tests_run, counters.tests_passed), (7, 7));
    assert!(report.is_clean());
    assert!(report.results.iter().all(|r| r.scenario.as_deref() == Some("notes")));
}

#[tokio::test]
async fn test_failed_required_step_skips_the_rest() {
    let server = MockServer::start().await;
    mount_register(&server, "tok-1").await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[personas.regular]

[[scenarios]]
name = "notes"
persona = "regular"

[[scenarios.steps]]
name = "Create"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "QA note" }
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Get"
path = "notes/${note_id}"

[[scenarios.steps]]
name = "Delete"
method = "DELETE"
path = "notes/${note_id}"
expect = 204
"#,
    );

    let report = run_first(&server, &suite).await;

    let counters = report.counters();
    assert_eq!((counters.tests_run, counters.tests_passed), (2, 1));
    assert_eq!(report.skipped_count(), 2);
    let create = &report.results[1];
    assert_eq!(create.reason, Some(FailureReason::StatusMismatch));
    assert!(create.details.contains("boom"));
    assert!(report.results[2].details.contains("Create"));
    // Only register and create reached the server.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_required_failure_continues_and_unresolved_vars_skip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"title": "no id here"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[[scenarios]]
name = "anonymous"

[[scenarios.steps]]
name = "Create"
method = "POST"
path = "notes"
expect = 201
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Get"
path = "notes/${note_id}"

[[scenarios.steps]]
name = "Health"
path = "health"
"#,
    );

    let report = run_first(&server, &suite).await;

    assert_eq!(names(&report), vec!["Create", "Create › save note_id", "Get", "Health"]);
    assert!(report.results[0].success);
    assert!(!report.results[1].success);
    assert!(report.results[2].is_skipped());
    assert!(report.results[2].details.contains("note_id"));
    assert!(report.results[3].success);
    let counters = report.counters();
    assert_eq!((counters.tests_run, counters.tests_passed), (3, 2));
}

#[tokio::test]
async fn test_polling_waits_for_ready_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notes/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a-1", "status": "processing"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/a-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transcription_status": "processing"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/a-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transcription_status": "Completed",
            "transcription": "hello world",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[[scenarios]]
name = "audio"

[[scenarios.steps]]
name = "Upload"
method = "POST"
path = "notes/upload"
form = { title = "QA audio" }
save = { note_id = "/id" }

[[scenarios.steps.upload]]
kind = "wav"
size = 100

[scenarios.steps.poll]
path = "notes/${note_id}"
pointer = "/transcription_status"
interval_secs = 0.05
max_wait_secs = 5.0
save = { transcript = "/transcription" }

[[scenarios.steps]]
name = "Search transcript"
path = "search"
checks = [{ exists = true }]
"#,
    );

    let report = run_first(&server, &suite).await;

    assert_eq!(names(&report), vec!["Upload", "Upload › poll", "Search transcript", "Search transcript › body exists"]);
    let poll = &report.results[1];
    assert!(poll.success, "{}", poll.details);
    assert!(poll.details.contains('3'));
    assert_eq!(poll.call_label().as_deref(), Some("GET notes/a-1"));
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_polling_reports_failed_status_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"job_id": 9})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "ERROR"})))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[[scenarios]]
name = "jobs"

[[scenarios.steps]]
name = "Start job"
method = "POST"
path = "jobs"
expect = 202
save = { job = "/job_id" }

[scenarios.steps.poll]
path = "jobs/${job}"
pointer = "state"
interval_secs = 0.05
max_wait_secs = 2.0
"#,
    );

    let report = run_first(&server, &suite).await;

    assert_eq!(report.results.len(), 2);
    let poll = &report.results[1];
    assert!(!poll.success);
    assert_eq!(poll.reason, Some(FailureReason::Poll));
    assert!(poll.details.contains("error"));
    assert_eq!(report.counters().tests_run, 2);
}

#[tokio::test]
async fn test_polling_uses_the_step_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"job_id": 4})))
        .mount(&server)
        .await;
    // Ready, but slower than the step allows.
    Mock::given(method("GET"))
        .and(path("/jobs/4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "done"}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[[scenarios]]
name = "jobs"

[[scenarios.steps]]
name = "Start job"
method = "POST"
path = "jobs"
expect = 202
timeout_secs = 1
save = { job = "/job_id" }

[scenarios.steps.poll]
path = "jobs/${job}"
interval_secs = 0.1
max_wait_secs = 2.0
"#,
    );

    let report = run_first(&server, &suite).await;

    assert!(report.results[0].success);
    let poll = &report.results[1];
    assert_eq!(poll.name, "Start job › poll");
    assert!(!poll.success);
    assert_eq!(poll.reason, Some(FailureReason::Poll));
}

#[tokio::test]
async fn test_export_format_checks_and_artifacts() {
    let server = MockServer::start().await;
    let mut docx = b"PK\x03\x04".to_vec();
    docx.extend_from_slice(b"....[Content_Types].xml....word/document.xml....");
    Mock::given(method("POST"))
        .and(path("/reports/batch"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-type",
                    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                )
                .set_body_bytes(docx.clone()),
        )
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[[scenarios]]
name = "export"

[[scenarios.steps]]
name = "Export docx"
method = "POST"
path = "reports/batch"
json = { note_ids = ["a", "b"], format = "docx" }
expect_format = "docx"
min_bytes = 10
save_artifact = "batch.docx"

[[scenarios.steps]]
name = "Export pdf"
method = "POST"
path = "reports/batch"
json = { note_ids = ["a", "b"], format = "pdf" }
expect_format = "pdf"
"#,
    );

    let artifacts = tempdir().unwrap();
    let mut executor = Executor::new(harness_for(&server), suite.personas.clone())
        .with_artifacts_dir(Some(artifacts.path().to_path_buf()));
    let report = executor.run_scenario(&suite.scenarios[0]).await;

    assert_eq!(
        names(&report),
        vec![
            "Export docx",
            "Export docx › format docx",
            "Export docx › size ≥ 10",
            "Export pdf",
            "Export pdf › format pdf",
        ]
    );
    assert!(report.results[1].success);
    assert!(!report.results[4].success);
    assert!(report.results[4].details.contains("detected docx"));

    let saved = artifacts.path().join("export").join("batch.docx");
    assert_eq!(std::fs::read(saved).unwrap(), docx);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent, json!({"note_ids": ["a", "b"], "format": "docx"}));
}

#[tokio::test]
async fn test_unwritable_artifact_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/1/export"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"plain report".to_vec()))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[[scenarios]]
name = "export"

[[scenarios.steps]]
name = "Export txt"
path = "reports/1/export"
save_artifact = "report.txt"
"#,
    );

    // A regular file where the artifacts directory should be.
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("artifacts");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut executor = Executor::new(harness_for(&server), suite.personas.clone())
        .with_artifacts_dir(Some(blocker));
    let report = executor.run_scenario(&suite.scenarios[0]).await;

    assert_eq!(names(&report), vec!["Export txt", "Export txt › artifact"]);
    assert!(report.results[0].success);
    let artifact = &report.results[1];
    assert!(!artifact.success);
    assert_eq!(artifact.reason, Some(FailureReason::Setup));
    assert!(artifact.details.contains("artifacts directory"));
    assert_eq!(report.counters().tests_run, 2);
    assert_eq!(report.counters().tests_passed, 1);
}

#[tokio::test]
async fn test_two_personas_without_swapping_credentials() {
    let server = MockServer::start().await;
    mount_register(&server, "tok-regular").await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-special", "user_id": 77})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(header("authorization", "Bearer tok-regular"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "n-1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/n-1"))
        .and(header("authorization", "Bearer tok-special"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/n-1"))
        .and(header("authorization", "Bearer tok-regular"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "n-1"})))
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[personas.regular]

[personas.special]
login_only = true
email = "special@special.example.com"

[[scenarios]]
name = "isolation"
persona = "regular"

[[scenarios.steps]]
name = "Create"
method = "POST"
path = "notes"
expect = 201
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Other user denied"
path = "notes/${note_id}"
auth = "special"
expect = 404

[[scenarios.steps]]
name = "Owner reads"
path = "notes/${note_id}"
checks = [{ pointer = "/id", equals = "${note_id}" }]

[[scenarios.steps]]
name = "Special id is visible"
path = "notes/${special.user_id}"
auth = "none"
expect = 404
"#,
    );

    let mut executor = Executor::new(harness_for(&server), suite.personas.clone());
    let report = executor.run_scenario(&suite.scenarios[0]).await;

    assert_eq!(report.results[0].name, "Register persona 'regular'");
    assert_eq!(report.results[2].name, "Login persona 'special'");
    let failures: Vec<_> = report.results.iter().filter(|r| !r.success).map(|r| r.name.clone()).collect();
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
    assert!(executor.identities().get("regular").is_some());
    assert_eq!(executor.identities().get("special").unwrap().user_id.as_deref(), Some("77"));
    // The scenario credential is dropped when the scenario ends.
    assert!(executor.harness().credential().is_none());

    let requests = server.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.url.path(), "/notes/77");
    assert!(last.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_cancelled_run_skips_every_step() {
    let server = MockServer::start().await;
    let suite = suite(
        r#"
[[scenarios]]
name = "health"

[[scenarios.steps]]
name = "Health"
path = "health"

[[scenarios.steps]]
name = "Health again"
path = "health"
"#,
    );

    let stop = CancellationToken::new();
    stop.cancel();
    let mut executor = Executor::new(harness_for(&server), suite.personas.clone()).with_stop_token(stop);
    let report = executor.run_scenario(&suite.scenarios[0]).await;

    assert!(report.cancelled);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(report.counters().tests_run, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unavailable_persona_skips_scenario_and_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "check your inbox"})))
        .expect(1)
        .mount(&server)
        .await;

    let suite = suite(
        r#"
[personas.regular]

[[scenarios]]
name = "first"
persona = "regular"

[[scenarios.steps]]
name = "Me"
path = "auth/me"

[[scenarios]]
name = "second"
persona = "regular"

[[scenarios.steps]]
name = "Me"
path = "auth/me"
"#,
    );

    let mut executor = Executor::new(harness_for(&server), suite.personas.clone());
    let first = executor.run_scenario(&suite.scenarios[0]).await;
    let second = executor.run_scenario(&suite.scenarios[1]).await;

    // Registration call passed, token extraction failed, the step was skipped.
    assert_eq!(first.counters().tests_run, 2);
    assert_eq!(first.counters().tests_passed, 1);
    assert_eq!(first.results[1].name, "Register persona 'regular' token");
    assert_eq!(first.skipped_count(), 1);
    assert_eq!(second.counters().tests_run, 0);
    assert_eq!(second.skipped_count(), 1);
    assert_eq!(executor.harness().counters().tests_run, 2);
}
