//! # HTML Reporting Module / HTML 报告模块
//!
//! This module renders a run into a single self-contained HTML file: the
//! overall statistics, then one table per scenario with an expandable
//! details row for every failed or skipped assertion.
//!
//! 此模块将一次运行渲染为单个独立的 HTML 文件：总体统计，然后每个场景一个表格，
//! 每个失败或跳过的断言都有可展开的详情行。

use anyhow::Result;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::path::Path;

use crate::core::models::{RunSummary, ScenarioReport};
use crate::infra::{fs, t};
use crate::reporting::console::format_duration;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = include_str!("assets/report.js");

/// Renders the report markup. Text is escaped by `maud`.
///
/// 渲染报告标记。文本由 `maud` 转义。
pub fn render_html_report(summary: &RunSummary, locale: &str) -> String {
    let counters = summary.counters;
    let verdict_class = if summary.is_acceptable() { "passed-text" } else { "failed-text" };

    let markup = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale)) }
                p.meta {
                    (summary.base_url) " · "
                    (summary.started_at.format("%Y-%m-%d %H:%M:%S").to_string()) " · "
                    (format_duration(summary.duration))
                }
                div.summary-container {
                    (summary_item(&counters.tests_run.to_string(), "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(&counters.tests_passed.to_string(), "passed-text", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(&counters.tests_failed().to_string(), "failed-text", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(&summary.skipped_count().to_string(), "skipped-text", &t!("html_report.summary.skipped", locale = locale)))
                    (summary_item(&format!("{:.1}%", counters.success_rate()), verdict_class, &t!("html_report.summary.rate", locale = locale, required = format!("{:.1}%", summary.min_pass_rate))))
                }
                @for (index, scenario) in summary.scenarios.iter().enumerate() {
                    (scenario_section(index, scenario, locale))
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    };
    markup.into_string()
}

fn summary_item(count: &str, class: &str, label: &str) -> Markup {
    html! {
        div.summary-item {
            span class={ "count " (class) } { (count) }
            span.label { (label) }
        }
    }
}

fn scenario_section(index: usize, scenario: &ScenarioReport, locale: &str) -> Markup {
    let counters = scenario.counters();
    html! {
        section.scenario {
            h2 {
                (scenario.name)
                span.scenario-stats {
                    (counters.tests_passed) "/" (counters.tests_run)
                    " · " (format_duration(scenario.duration))
                    @if scenario.cancelled {
                        " · " (t!("summary.interrupted", locale = locale))
                    }
                }
            }
            @if !scenario.description.is_empty() {
                p.description { (scenario.description) }
            }
            table {
                thead {
                    tr {
                        th { (t!("html_report.table.header.name", locale = locale)) }
                        th { (t!("html_report.table.header.call", locale = locale)) }
                        th.status-col { (t!("html_report.table.header.status", locale = locale)) }
                        th.duration-cell { (t!("html_report.table.header.duration", locale = locale)) }
                    }
                }
                tbody {
                    @for (i, result) in scenario.results.iter().enumerate() {
                        @let output_id = format!("output-{}-{}", index, i);
                        @let has_details = !result.success && !result.details.is_empty();
                        tr {
                            td { (result.name) }
                            td.call-cell { (result.call_label().unwrap_or_default()) }
                            td.status-col {
                                div class={ "status-cell " (result.get_status_class()) } {
                                    (result.get_status_str(locale))
                                }
                                @if has_details {
                                    div.output-toggle onclick={ "toggleOutput('" (output_id) "')" } {
                                        (t!("html_report.toggle_output", locale = locale))
                                    }
                                }
                            }
                            td.duration-cell {
                                @if result.method.is_some() {
                                    (format_duration(result.duration))
                                }
                            }
                        }
                        @if has_details {
                            tr id=(output_id) style="display:none;" {
                                td colspan="4" {
                                    pre.output-content { (result.details) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Generates the HTML report and writes it to `output_path`.
///
/// 生成 HTML 报告并写入 `output_path`。
///
/// # Errors / 错误
/// Fails if the file or its parent directory cannot be written.
/// 如果无法写入文件或其父目录则失败。
pub fn generate_html_report(summary: &RunSummary, output_path: &Path, locale: &str) -> Result<()> {
    fs::write_report(output_path, &render_html_report(summary, locale))
}
