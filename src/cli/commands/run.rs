//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command: it loads the suite, applies the
//! command-line overrides, plans which scenarios run, drives them through
//! the executor and reports. The exit code reflects the pass rate.
//!
//! 此模块实现 `run` 命令：加载套件、应用命令行覆盖、规划要运行的场景、
//! 通过执行器驱动它们并生成报告。退出码反映通过率。

use anyhow::Result;
use chrono::Local;
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config::Suite,
        execution::Executor,
        harness::{HarnessOptions, TestHarness},
        models::RunSummary,
        planner::{self, Selection},
    },
    infra::{fs, t},
    reporting::{
        console::{print_failure_details, print_summary},
        html::generate_html_report,
        json::generate_json_report,
    },
};

/// Options of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    pub base_url: Option<String>,
    pub scenarios: Vec<String>,
    pub tags: Vec<String>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
    pub min_pass_rate: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub verbose: bool,
    /// Set only when `--lang` was given; otherwise the suite's language wins.
    pub lang: Option<String>,
}

/// Applies command-line overrides on top of the suite's `[harness]` table.
pub fn apply_overrides(suite: &mut Suite, args: &RunArgs) {
    let settings = &mut suite.harness;
    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(rate) = args.min_pass_rate {
        settings.min_pass_rate = rate;
    }
    if let Some(timeout) = args.timeout_secs {
        settings.timeout_secs = timeout;
    }
    if let Some(dir) = &args.artifacts_dir {
        settings.artifacts_dir = Some(dir.clone());
    }
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// `ExitCode::SUCCESS` when the pass rate is at least the configured
/// minimum, `ExitCode::FAILURE` otherwise.
///
/// # Errors
/// Configuration and planning errors. Failed assertions are never errors.
pub async fn execute(args: RunArgs) -> Result<ExitCode> {
    let mut suite = Suite::load(&args.config)?;
    apply_overrides(&mut suite, &args);
    suite.validate()?;

    let locale = crate::resolve_locale(args.lang.as_deref().unwrap_or(&suite.harness.language)).to_string();
    rust_i18n::set_locale(&locale);

    let suite_dir = suite_dir(&args.config);
    let base_url = fs::expand(&suite.harness.base_url)?;
    let artifacts_dir = match &suite.harness.artifacts_dir {
        Some(dir) => Some(fs::expand_path(&dir.to_string_lossy(), Some(&suite_dir))?),
        None => None,
    };

    println!(
        "{}",
        t!("run.loading_suite", locale = &locale, path = args.config.display())
    );
    println!(
        "{}",
        t!("run.target", locale = &locale, url = base_url.yellow())
    );

    let selection = Selection {
        names: args.scenarios.clone(),
        tags: args.tags.clone(),
    };
    let min_pass_rate = suite.harness.min_pass_rate;
    let plan = planner::plan_execution(suite.scenarios, &selection, args.total_runners, args.runner_index)?;

    if plan.filtered_count > 0 {
        println!(
            "{}",
            t!("run.filtered", locale = &locale, count = plan.filtered_count).cyan()
        );
    }
    if plan.skipped_count > 0 {
        println!(
            "{}",
            t!("run.skipped_scenarios", locale = &locale, count = plan.skipped_count).yellow()
        );
    }
    if let (true, Some(total), Some(index)) = (plan.is_distributed, args.total_runners, args.runner_index) {
        println!(
            "{}",
            t!(
                "run.split_runner",
                locale = &locale,
                index = index + 1,
                total = total,
                count = plan.scenarios_to_run.len()
            )
            .bold()
        );
    } else {
        println!(
            "{}",
            t!("run.single_runner", locale = &locale, count = plan.scenarios_to_run.len()).bold()
        );
    }

    if plan.scenarios_to_run.is_empty() {
        println!("{}", t!("run.nothing_to_run", locale = &locale).green());
        return Ok(ExitCode::SUCCESS);
    }

    let stop = setup_signal_handler(&locale);
    let harness = TestHarness::with_options(
        base_url.clone(),
        HarnessOptions {
            default_timeout: Duration::from_secs(suite.harness.timeout_secs),
            user_agent: suite.harness.user_agent.clone(),
            locale: locale.clone(),
            verbose: args.verbose,
        },
    )?;
    let mut executor = Executor::new(harness, suite.personas)
        .with_artifacts_dir(artifacts_dir)
        .with_suite_dir(Some(suite_dir))
        .with_stop_token(stop.clone());

    let started_at = Local::now();
    let start = Instant::now();
    let mut reports = Vec::with_capacity(plan.scenarios_to_run.len());
    for scenario in &plan.scenarios_to_run {
        if stop.is_cancelled() {
            break;
        }
        reports.push(executor.run_scenario(scenario).await);
    }

    let summary = RunSummary {
        base_url,
        started_at,
        duration: start.elapsed(),
        counters: executor.harness().counters(),
        min_pass_rate,
        scenarios: reports,
    };

    print_summary(&summary, &locale);

    let failures: Vec<_> = summary.failures().collect();
    print_failure_details(&failures, &locale);

    if let Some(path) = &args.html {
        println!("\n{}", t!("run.writing_html", locale = &locale, path = path.display()));
        if let Err(e) = generate_html_report(&summary, path, &locale) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = &locale).red(), e);
        }
    }
    if let Some(path) = &args.json {
        println!("{}", t!("run.writing_json", locale = &locale, path = path.display()));
        if let Err(e) = generate_json_report(&summary, path) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = &locale).red(), e);
        }
    }

    if stop.is_cancelled() {
        println!("{}", t!("run.partial_results", locale = &locale).yellow());
    }

    if summary.is_acceptable() {
        println!("\n{}", t!("run.verdict_pass", locale = &locale).green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("\n{}", t!("run.verdict_fail", locale = &locale).red().bold());
        Ok(ExitCode::FAILURE)
    }
}

/// Relative upload and artifact paths resolve against the suite's directory.
fn suite_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Cancels the returned token on Ctrl-C so the executor can skip the
/// remaining steps and still print a summary.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
            token_clone.cancel();
        }
    });

    token
}
