//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the end-of-run summary: one line per scenario, the
//! overall counters and pass rate, and the details of every failure.
//!
//! 此模块打印运行结束时的摘要：每个场景一行、总体计数器和通过率，以及每个失败的详情。

use colored::*;
use std::time::Duration;

use crate::core::models::{RunSummary, TestResult};
use crate::infra::t;

/// Formats a duration the way every report shows it.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{}m{:02}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}

/// Prints a formatted summary of the run to the console.
///
/// 在控制台打印格式化的运行摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Test Summary ---
///   - Passed   | health                                   |    2/2    |    120ms
///   - Failed   | notes-crud                               |    5/7    |    3.41s
///
///   Tests run: 9   Passed: 7   Failed: 2   Skipped: 1
///   Success rate: 77.8% (required 80.0%)
/// ```
pub fn print_summary(summary: &RunSummary, locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());

    for scenario in &summary.scenarios {
        let counters = scenario.counters();
        let (status, colored_status) = if scenario.cancelled {
            let s = t!("summary.interrupted", locale = locale).to_string();
            (s.clone(), s.yellow())
        } else if counters.tests_failed() == 0 {
            let s = t!("report.status_passed", locale = locale).to_string();
            (s.clone(), s.green())
        } else {
            let s = t!("report.status_failed", locale = locale).to_string();
            (s.clone(), s.red())
        };
        // Pad on the plain text; ANSI codes would throw the width off.
        let padding = " ".repeat(10usize.saturating_sub(status.chars().count()));
        println!(
            "  - {}{} | {:<40} | {:>4}/{:<4} | {:>8}",
            colored_status,
            padding,
            scenario.name,
            counters.tests_passed,
            counters.tests_run,
            format_duration(scenario.duration)
        );
    }

    let counters = summary.counters;
    println!();
    println!(
        "  {}",
        t!(
            "summary.totals",
            locale = locale,
            run = counters.tests_run,
            passed = counters.tests_passed.to_string().green(),
            failed = counters.tests_failed().to_string().red(),
            skipped = summary.skipped_count().to_string().dimmed()
        )
    );

    let rate = format!("{:.1}%", counters.success_rate());
    let rate = if summary.is_acceptable() { rate.green().bold() } else { rate.red().bold() };
    println!(
        "  {}",
        t!(
            "summary.rate",
            locale = locale,
            rate = rate,
            required = format!("{:.1}%", summary.min_pass_rate),
            duration = format_duration(summary.duration)
        )
    );
}

/// Prints every failed assertion with the call that produced it and the
/// recorded details.
///
/// 打印每个失败的断言，包括产生它的调用和记录的详情。
pub fn print_failure_details(failures: &[&TestResult], locale: &str) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("summary.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        let scenario = result.scenario.as_deref().unwrap_or("-");
        println!(
            "[{}/{}] {} › {}",
            i + 1,
            failures.len(),
            scenario.cyan(),
            result.name.bold()
        );
        if let Some(call) = result.call_label() {
            println!("      {}", call.dimmed());
        }
        if let Some(reason) = result.reason {
            println!("      {}: {:?}", t!("summary.reason", locale = locale), reason);
        }
        if !result.details.is_empty() {
            for line in result.details.lines() {
                println!("      {}", line);
            }
        }
    }
    println!("{}", "-".repeat(80));
}
