//! # JSON Reporting Module / JSON 报告模块
//!
//! A machine-readable report for CI dashboards: totals at the top, then
//! scenarios with their results.
//!
//! 面向 CI 仪表板的机器可读报告：顶部为总计，其后是场景及其结果。

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;

use crate::core::models::{RunSummary, ScenarioReport, TestResult};
use crate::infra::fs;

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub base_url: &'a str,
    pub started_at: DateTime<Local>,
    pub duration_ms: u64,
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub skipped: usize,
    pub success_rate: f64,
    pub min_pass_rate: f64,
    pub acceptable: bool,
    pub scenarios: Vec<JsonScenario<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonScenario<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub cancelled: bool,
    pub duration_ms: u64,
    pub tests_run: usize,
    pub tests_passed: usize,
    pub results: &'a [TestResult],
}

impl<'a> JsonReport<'a> {
    pub fn new(summary: &'a RunSummary) -> Self {
        let counters = summary.counters;
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            base_url: &summary.base_url,
            started_at: summary.started_at,
            duration_ms: summary.duration.as_millis() as u64,
            tests_run: counters.tests_run,
            tests_passed: counters.tests_passed,
            tests_failed: counters.tests_failed(),
            skipped: summary.skipped_count(),
            success_rate: (counters.success_rate() * 10.0).round() / 10.0,
            min_pass_rate: summary.min_pass_rate,
            acceptable: summary.is_acceptable(),
            scenarios: summary.scenarios.iter().map(JsonScenario::new).collect(),
        }
    }
}

impl<'a> JsonScenario<'a> {
    fn new(report: &'a ScenarioReport) -> Self {
        let counters = report.counters();
        Self {
            name: &report.name,
            description: &report.description,
            cancelled: report.cancelled,
            duration_ms: report.duration.as_millis() as u64,
            tests_run: counters.tests_run,
            tests_passed: counters.tests_passed,
            results: &report.results,
        }
    }
}

pub fn render_json_report(summary: &RunSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport::new(summary))?)
}

/// Writes the JSON report to `output_path`.
pub fn generate_json_report(summary: &RunSummary, output_path: &Path) -> Result<()> {
    fs::write_report(output_path, &render_json_report(summary)?)
}
