//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the harness.
//! It includes models for per-assertion results, run counters, failure reasons
//! and the per-scenario and per-run reports built from them.
//!
//! 此模块定义了整个测试工具中使用的核心数据结构。
//! 它包括单次断言结果、运行计数器、失败原因以及由它们构建的场景报告和运行报告。

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::infra::t;

/// Enumerates the possible reasons for a failed assertion.
/// The harness folds all of them into a single `success = false` signal;
/// the reason only drives reporting.
///
/// 枚举断言失败的可能原因。
/// 测试工具将它们统一折叠为 `success = false`；原因仅用于报告。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum FailureReason {
    /// The server answered with a status code other than the expected one.
    /// 服务器返回的状态码与预期不符。
    StatusMismatch,
    /// Connection refused, DNS failure or any other transport error.
    /// 连接被拒绝、DNS 失败或其他传输错误。
    Network,
    /// The request did not complete within its timeout.
    /// 请求未在超时时间内完成。
    Timeout,
    /// The response body could not be decoded.
    /// 无法解码响应体。
    Decode,
    /// A body, size or format check on a successful response failed.
    /// 对成功响应的响应体、大小或格式检查失败。
    Check,
    /// A polled server-side operation failed or did not finish in time.
    /// 轮询的服务器端操作失败或未及时完成。
    Poll,
    /// The request could not be prepared (missing upload file, unknown persona...).
    /// 无法准备请求（缺少上传文件、未知身份等）。
    Setup,
    /// The step never ran because a required earlier step failed or the run was interrupted.
    /// 由于之前的必需步骤失败或运行被中断，该步骤未执行。
    Skipped,
}

/// The outcome of a single assertion: one harness call, one body check,
/// one poll, or one skipped step. Created once and never mutated.
///
/// 单次断言的结果：一次调用、一次响应体检查、一次轮询或一个被跳过的步骤。
/// 创建后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Human-readable label / 可读标签
    pub name: String,
    /// The scenario this result belongs to, if any / 所属场景
    pub scenario: Option<String>,
    pub success: bool,
    /// Human-readable details, usually empty on success / 详细信息
    pub details: String,
    pub timestamp: DateTime<Local>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub expected_status: Option<u16>,
    /// The observed status code; `None` when no response arrived.
    /// 实际状态码；未收到响应时为 `None`。
    pub status: Option<u16>,
    pub reason: Option<FailureReason>,
    pub duration: Duration,
}

impl TestResult {
    /// Creates a passing result with no HTTP context.
    pub fn passed(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(name, true, details, None)
    }

    /// Creates a failing result with no HTTP context.
    pub fn failed(
        name: impl Into<String>,
        reason: FailureReason,
        details: impl Into<String>,
    ) -> Self {
        Self::new(name, false, details, Some(reason))
    }

    /// Creates a result for a step that never ran.
    pub fn skipped(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(name, false, details, Some(FailureReason::Skipped))
    }

    fn new(
        name: impl Into<String>,
        success: bool,
        details: impl Into<String>,
        reason: Option<FailureReason>,
    ) -> Self {
        Self {
            name: name.into(),
            scenario: None,
            success,
            details: details.into(),
            timestamp: Local::now(),
            method: None,
            path: None,
            expected_status: None,
            status: None,
            reason,
            duration: Duration::default(),
        }
    }

    /// Attaches the HTTP call that produced this result.
    pub fn with_call(
        mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        expected_status: u16,
        status: Option<u16>,
    ) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self.expected_status = Some(expected_status);
        self.status = status;
        self
    }

    pub fn with_scenario(mut self, scenario: Option<String>) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Skipped steps are reported but never counted.
    pub fn is_skipped(&self) -> bool {
        self.reason == Some(FailureReason::Skipped)
    }

    /// A failure that counts against the pass rate.
    pub fn is_failure(&self) -> bool {
        !self.success && !self.is_skipped()
    }

    /// Gets the appropriate CSS class for the result status.
    pub fn get_status_class(&self) -> &'static str {
        match (self.success, self.reason) {
            (true, _) => "status-Passed",
            (false, Some(FailureReason::Skipped)) => "status-Skipped",
            (false, Some(FailureReason::Timeout)) => "status-Timeout",
            (false, _) => "status-Failed",
        }
    }

    /// Gets the status of the result as a localized string for display.
    /// 以本地化字符串形式获取结果状态以供显示。
    pub fn get_status_str(&self, locale: &str) -> String {
        match (self.success, self.reason) {
            (true, _) => t!("report.status_passed", locale = locale).to_string(),
            (false, Some(FailureReason::Skipped)) => {
                t!("report.status_skipped", locale = locale).to_string()
            }
            (false, Some(FailureReason::Timeout)) => {
                t!("report.status_timeout", locale = locale).to_string()
            }
            (false, _) => t!("report.status_failed", locale = locale).to_string(),
        }
    }

    /// `METHOD path` when the result came from an HTTP call.
    pub fn call_label(&self) -> Option<String> {
        match (&self.method, &self.path) {
            (Some(method), Some(path)) => Some(format!("{} {}", method, path)),
            _ => None,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.success { "PASS" } else { "FAIL" };
        write!(f, "{} {}", mark, self.name)?;
        if !self.details.is_empty() {
            write!(f, ": {}", self.details)?;
        }
        Ok(())
    }
}

/// Monotonic run/pass counters.
/// 单调递增的运行/通过计数器。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub tests_run: usize,
    pub tests_passed: usize,
}

impl Counters {
    pub fn record(&mut self, success: bool) {
        self.tests_run += 1;
        if success {
            self.tests_passed += 1;
        }
    }

    pub fn tests_failed(&self) -> usize {
        self.tests_run - self.tests_passed
    }

    /// Pass percentage in `0.0..=100.0`; zero runs count as 0 %.
    pub fn success_rate(&self) -> f64 {
        if self.tests_run == 0 {
            0.0
        } else {
            self.tests_passed as f64 * 100.0 / self.tests_run as f64
        }
    }
}

/// All results produced by one scenario, in execution order.
/// 一个场景按执行顺序产生的所有结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub description: String,
    pub results: Vec<TestResult>,
    pub duration: Duration,
    /// `true` when the run was interrupted while this scenario was active.
    pub cancelled: bool,
}

impl ScenarioReport {
    pub fn counters(&self) -> Counters {
        let mut counters = Counters::default();
        for result in self.results.iter().filter(|r| !r.is_skipped()) {
            counters.record(result.success);
        }
        counters
    }

    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// The outcome of a whole `run` invocation.
/// 一次完整 `run` 调用的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub base_url: String,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub counters: Counters,
    pub min_pass_rate: f64,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunSummary {
    /// Whether the pass rate meets the configured threshold. An empty run is
    /// acceptable only if nothing was expected to run.
    pub fn is_acceptable(&self) -> bool {
        if self.counters.tests_run == 0 {
            return self.scenarios.iter().all(|s| s.results.is_empty());
        }
        self.counters.success_rate() + f64::EPSILON >= self.min_pass_rate
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.scenarios
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| r.is_failure())
    }

    pub fn skipped_count(&self) -> usize {
        self.scenarios.iter().map(ScenarioReport::skipped_count).sum()
    }
}
