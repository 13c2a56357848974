//! # Test Harness Module / 测试工具模块
//!
//! `TestHarness` issues one HTTP call at a time against a base URL, compares
//! the observed status with the expected one, keeps run/pass counters and
//! prints a timestamped line per call. Network, status and decoding failures
//! never escape to the caller: they are logged and folded into
//! `success = false` with an empty body, so a long scenario keeps going.
//!
//! `TestHarness` 针对基础 URL 每次发出一个 HTTP 调用，将实际状态码与预期状态码比较，
//! 维护运行/通过计数器，并为每次调用打印一行带时间戳的日志。网络、状态码和解码失败
//! 从不抛给调用方：它们被记录并折叠为 `success = false` 和空响应体，
//! 因此长场景可以继续执行。

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use reqwest::{Client, Method};
use serde_json::{Map, Value};
use std::error::Error as _;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::identity::Credentials;
use crate::core::models::{Counters, FailureReason, TestResult};
use crate::infra::http::{self, Body, FilePart, RawResponse, TEXT_PREVIEW_CHARS};
use crate::infra::t;

/// Default per-call timeout when neither the call nor the suite sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which bearer token, if any, a call carries.
/// 调用携带哪个 bearer 令牌（如果有）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Auth {
    /// No `Authorization` header.
    #[default]
    None,
    /// The harness's default credential when one is held, otherwise no header.
    /// 测试工具持有默认凭据时使用它，否则不附加请求头。
    Default,
    /// An explicit identity; always wins over the default credential.
    /// 显式身份；始终优先于默认凭据。
    As(Credentials),
}

/// One HTTP call and the status code that counts as success.
/// 一次 HTTP 调用及其视为成功的状态码。
#[derive(Debug, Clone)]
pub struct Call {
    method: Method,
    path: String,
    expected_status: u16,
    body: Body,
    timeout: Option<Duration>,
    auth: Auth,
}

impl Call {
    pub fn new(method: Method, path: impl Into<String>, expected_status: u16) -> Self {
        Self {
            method,
            path: path.into(),
            expected_status,
            body: Body::Empty,
            timeout: None,
            auth: Auth::None,
        }
    }

    pub fn get(path: impl Into<String>, expected_status: u16) -> Self {
        Self::new(Method::GET, path, expected_status)
    }

    pub fn post(path: impl Into<String>, expected_status: u16) -> Self {
        Self::new(Method::POST, path, expected_status)
    }

    pub fn put(path: impl Into<String>, expected_status: u16) -> Self {
        Self::new(Method::PUT, path, expected_status)
    }

    pub fn patch(path: impl Into<String>, expected_status: u16) -> Self {
        Self::new(Method::PATCH, path, expected_status)
    }

    pub fn delete(path: impl Into<String>, expected_status: u16) -> Self {
        Self::new(Method::DELETE, path, expected_status)
    }

    /// Sends `body` as JSON. Replaces any multipart payload.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    /// Attaches a file to a multipart upload. Replaces any JSON body.
    pub fn file(mut self, part: FilePart) -> Self {
        match &mut self.body {
            Body::Multipart { files, .. } => files.push(part),
            _ => {
                self.body = Body::Multipart {
                    files: vec![part],
                    fields: Vec::new(),
                }
            }
        }
        self
    }

    /// Adds a text field to a multipart upload. Replaces any JSON body.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let entry = (name.into(), value.into());
        match &mut self.body {
            Body::Multipart { fields, .. } => fields.push(entry),
            _ => {
                self.body = Body::Multipart {
                    files: Vec::new(),
                    fields: vec![entry],
                }
            }
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches the harness's default credential if one is held.
    pub fn requires_auth(mut self) -> Self {
        self.auth = Auth::Default;
        self
    }

    /// Runs the call as an explicit identity.
    pub fn as_identity(mut self, credentials: &Credentials) -> Self {
        self.auth = Auth::As(credentials.clone());
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn expected_status(&self) -> u16 {
        self.expected_status
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }
}

/// What a call produced. On any failure `body` is `{}` and `raw` is `None`.
/// 调用的产出。任何失败时 `body` 为 `{}`，`raw` 为 `None`。
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub success: bool,
    /// The observed status, `None` when no response arrived.
    pub status: Option<u16>,
    /// Decoded JSON, or the fallback mapping for non-JSON bodies.
    /// 解码后的 JSON，或非 JSON 响应体的后备映射。
    pub body: Value,
    /// The raw response, kept for byte-level checks on exports.
    pub raw: Option<RawResponse>,
}

impl CallOutcome {
    fn failed(status: Option<u16>) -> Self {
        Self {
            success: false,
            status,
            body: Value::Object(Map::new()),
            raw: None,
        }
    }
}

/// Transport-level failures. They are converted into failed results and
/// never returned from `run_test`.
///
/// 传输层失败。它们被转换为失败结果，从不由 `run_test` 返回。
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl HarnessError {
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return HarnessError::Timeout(timeout);
        }
        // reqwest's Display hides the cause ("error sending request"); keep the chain.
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        if err.is_builder() {
            HarnessError::Request(message)
        } else if err.is_decode() || err.is_body() {
            HarnessError::Decode(message)
        } else {
            HarnessError::Network(message)
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            HarnessError::Timeout(_) => FailureReason::Timeout,
            HarnessError::Network(_) => FailureReason::Network,
            HarnessError::Request(_) => FailureReason::Setup,
            HarnessError::Decode(_) => FailureReason::Decode,
        }
    }
}

/// Harness settings that are not per call.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub default_timeout: Duration,
    pub user_agent: Option<String>,
    pub locale: String,
    /// Print request and response details for every call.
    pub verbose: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            locale: "en".to_string(),
            verbose: false,
        }
    }
}

/// The request/assert/log utility shared by every scenario.
/// 所有场景共享的请求/断言/日志工具。
pub struct TestHarness {
    client: Client,
    base_url: String,
    options: HarnessOptions,
    credential: Option<Credentials>,
    counters: Counters,
    results: Vec<TestResult>,
    scenario: Option<String>,
}

impl TestHarness {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, HarnessOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, options: HarnessOptions) -> Result<Self> {
        let client = http::build_client(options.user_agent.as_deref())
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            options,
            credential: None,
            counters: Counters::default(),
            results: Vec::new(),
            scenario: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        http::join_url(&self.base_url, path)
    }

    pub fn locale(&self) -> &str {
        &self.options.locale
    }

    /// Holds `credentials` as the default for calls that require auth.
    pub fn set_credential(&mut self, credentials: Credentials) {
        self.credential = Some(credentials);
    }

    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    pub fn credential(&self) -> Option<&Credentials> {
        self.credential.as_ref()
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Results recorded since the last `take_results`.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn take_results(&mut self) -> Vec<TestResult> {
        std::mem::take(&mut self.results)
    }

    /// Tags subsequent results with a scenario name.
    pub fn set_scenario(&mut self, scenario: Option<String>) {
        self.scenario = scenario;
    }

    /// Issues `call`, checks its status and records the result.
    ///
    /// Returns `success = true` and the decoded body only when the observed
    /// status equals the expected one and the body decodes; anything else is
    /// `success = false` with `{}`. Always increments `tests_run` by one.
    ///
    /// 发出 `call`，检查其状态码并记录结果。
    /// 仅当实际状态码等于预期状态码且响应体可解码时返回 `success = true` 和解码后的响应体；
    /// 其他情况均为 `success = false` 和 `{}`。`tests_run` 总是加一。
    pub async fn run_test(&mut self, name: &str, call: Call) -> CallOutcome {
        let start = Instant::now();
        let sent = self.send(&call).await;
        let duration = start.elapsed();
        let method = call.method.as_str().to_string();

        let raw = match sent {
            Ok(raw) => raw,
            Err(err) => {
                let result = TestResult::failed(name, err.reason(), err.to_string())
                    .with_call(method, &call.path, call.expected_status, None)
                    .with_duration(duration);
                self.push(result);
                return CallOutcome::failed(None);
            }
        };

        let status = raw.status;
        if status != call.expected_status {
            let details = t!(
                "harness.status_mismatch",
                locale = &self.options.locale,
                expected = call.expected_status,
                actual = status,
                body = describe_body(&raw)
            )
            .to_string();
            let result = TestResult::failed(name, FailureReason::StatusMismatch, details)
                .with_call(method, &call.path, call.expected_status, Some(status))
                .with_duration(duration);
            self.push(result);
            return CallOutcome::failed(Some(status));
        }

        let body = if raw.is_json() {
            match raw.json() {
                Ok(body) => body,
                Err(err) => {
                    let details = HarnessError::Decode(err.to_string()).to_string();
                    let result = TestResult::failed(name, FailureReason::Decode, details)
                        .with_call(method, &call.path, call.expected_status, Some(status))
                        .with_duration(duration);
                    self.push(result);
                    return CallOutcome::failed(Some(status));
                }
            }
        } else {
            // Some endpoints send JSON without declaring it.
            serde_json::from_slice(&raw.bytes).unwrap_or_else(|_| raw.fallback_body())
        };

        let result = TestResult::passed(name, "")
            .with_call(method, &call.path, call.expected_status, Some(status))
            .with_duration(duration);
        self.push(result);
        CallOutcome {
            success: true,
            status: Some(status),
            body,
            raw: Some(raw),
        }
    }

    /// Sends `call` without checking or recording anything. Used by polling
    /// loops, where only the final verdict is recorded.
    ///
    /// 发送 `call` 但不检查也不记录。用于轮询循环，只记录最终结果。
    pub async fn fetch(&self, call: &Call) -> Result<RawResponse, HarnessError> {
        self.send(call).await
    }

    async fn send(&self, call: &Call) -> Result<RawResponse, HarnessError> {
        let timeout = call.timeout.unwrap_or(self.options.default_timeout);
        let bearer = match &call.auth {
            Auth::None => None,
            Auth::Default => self.credential.as_ref().map(|c| c.token.as_str()),
            Auth::As(credentials) => Some(credentials.token.as_str()),
        };
        let url = self.url_for(&call.path);

        if self.options.verbose {
            let auth = match (&call.auth, bearer) {
                (Auth::As(c), _) => format!("bearer:{}", c.persona),
                (_, Some(_)) => "bearer:default".to_string(),
                (_, None) => "anonymous".to_string(),
            };
            println!(
                "{}",
                format!("    → {} {} ({}, timeout {:?})", call.method, url, auth, timeout).dimmed()
            );
        }

        let request = http::prepare(&self.client, call.method.clone(), &url, &call.body, bearer, timeout)
            .map_err(|e| HarnessError::from_reqwest(e, timeout))?;
        let response = request
            .send()
            .await
            .map_err(|e| HarnessError::from_reqwest(e, timeout))?;
        let raw = RawResponse::read(response)
            .await
            .map_err(|e| HarnessError::from_reqwest(e, timeout))?;

        if self.options.verbose {
            println!(
                "{}",
                format!(
                    "    ← {} {} ({} bytes) {}",
                    raw.status,
                    raw.content_type.as_deref().unwrap_or("-"),
                    raw.bytes.len(),
                    raw.text_preview(TEXT_PREVIEW_CHARS)
                )
                .dimmed()
            );
        }
        Ok(raw)
    }

    /// Records a non-HTTP assertion with the same counters and logging as a call.
    pub fn record(&mut self, name: &str, success: bool, details: impl Into<String>) {
        let result = if success {
            TestResult::passed(name, details)
        } else {
            TestResult::failed(name, FailureReason::Check, details)
        };
        self.push(result);
    }

    pub fn record_failure(&mut self, name: &str, reason: FailureReason, details: impl Into<String>) {
        self.push(TestResult::failed(name, reason, details));
    }

    /// Records a step that never ran. Skips are logged but not counted.
    pub fn record_skip(&mut self, name: &str, details: impl Into<String>) {
        self.push(TestResult::skipped(name, details));
    }

    /// Records a fully built result (used for polls, which carry their own timing).
    pub fn record_result(&mut self, result: TestResult) {
        self.push(result);
    }

    fn push(&mut self, result: TestResult) {
        let result = result.with_scenario(self.scenario.clone());
        if !result.is_skipped() {
            self.counters.record(result.success);
        }
        self.log(&result);
        self.results.push(result);
    }

    fn log(&self, result: &TestResult) {
        let locale = &self.options.locale;
        let stamp = format!("[{}]", Local::now().format("%H:%M:%S")).dimmed();
        let mark = if result.success {
            format!("✅ {}", t!("harness.pass", locale = locale)).green()
        } else if result.is_skipped() {
            format!("⏭  {}", t!("harness.skip", locale = locale)).dimmed()
        } else {
            format!("❌ {}", t!("harness.fail", locale = locale)).red()
        };
        let call = result
            .call_label()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default();
        let status = match (result.status, result.method.is_some()) {
            (Some(status), _) => format!(" → {}", status),
            (None, true) => " → -".to_string(),
            (None, false) => String::new(),
        };
        let timing = if result.duration.is_zero() {
            String::new()
        } else {
            format!(" · {:.2}s", result.duration.as_secs_f64())
        };
        println!("{} {} {}{}{}{}", stamp, mark, result.name, call.dimmed(), status, timing);

        if !result.success && !result.details.is_empty() {
            println!("           {} {}", "↳".yellow(), result.details);
        }
    }
}

/// A short description of an unexpected response: compact JSON when the body
/// decodes, otherwise the first slice of raw text.
fn describe_body(raw: &RawResponse) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(&raw.bytes) {
        let text = value.to_string();
        if text.chars().count() > TEXT_PREVIEW_CHARS {
            return format!("{}…", text.chars().take(TEXT_PREVIEW_CHARS).collect::<String>());
        }
        return text;
    }
    let preview = raw.text_preview(TEXT_PREVIEW_CHARS);
    if preview.trim().is_empty() {
        format!("<{} bytes>", raw.bytes.len())
    } else {
        preview
    }
}
