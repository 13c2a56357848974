//! # Command Line Interface Module / 命令行接口模块
//!
//! Builds the `clap` command tree with localized help text and dispatches to
//! the `run` and `init` commands. The language is pre-parsed from `--lang`
//! so that help output is already translated.
//!
//! 构建带有本地化帮助文本的 `clap` 命令树，并分派到 `run` 和 `init` 命令。
//! 语言从 `--lang` 预解析，因此帮助输出已被翻译。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, process::ExitCode};

use crate::infra::t;
use commands::run::RunArgs;

/// Finds `--lang <VALUE>` or `--lang=<VALUE>` before clap runs.
fn pre_parse_language(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--lang" {
            return iter.next().cloned();
        }
        if let Some(value) = arg.strip_prefix("--lang=") {
            return Some(value.to_string());
        }
    }
    None
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("api-harness")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.run_about", locale = locale).to_string())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("cli.arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value("scenarios.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .help(t!("cli.arg_base_url", locale = locale).to_string())
                        .value_name("URL")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("scenario")
                        .short('s')
                        .long("scenario")
                        .help(t!("cli.arg_scenario", locale = locale).to_string())
                        .value_name("NAME")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .help(t!("cli.arg_tag", locale = locale).to_string())
                        .value_name("TAG")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("cli.arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("cli.arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("cli.arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("cli.arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("artifacts-dir")
                        .long("artifacts-dir")
                        .help(t!("cli.arg_artifacts_dir", locale = locale).to_string())
                        .value_name("DIR")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("min-pass-rate")
                        .long("min-pass-rate")
                        .help(t!("cli.arg_min_pass_rate", locale = locale).to_string())
                        .value_name("PERCENT")
                        .value_parser(clap::value_parser!(f64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help(t!("cli.arg_timeout", locale = locale).to_string())
                        .value_name("SECS")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help(t!("cli.arg_verbose", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("cli.arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value("scenarios.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help(t!("cli.arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("cli.arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn run_args(matches: &ArgMatches, lang: Option<String>) -> RunArgs {
    let strings = |id: &str| -> Vec<String> {
        matches
            .get_many::<String>(id)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };
    RunArgs {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("scenarios.toml")),
        base_url: matches.get_one::<String>("base-url").cloned(),
        scenarios: strings("scenario"),
        tags: strings("tag"),
        total_runners: matches.get_one::<usize>("total-runners").copied(),
        runner_index: matches.get_one::<usize>("runner-index").copied(),
        html: matches.get_one::<PathBuf>("html").cloned(),
        json: matches.get_one::<PathBuf>("json").cloned(),
        artifacts_dir: matches.get_one::<PathBuf>("artifacts-dir").cloned(),
        min_pass_rate: matches.get_one::<f64>("min-pass-rate").copied(),
        timeout_secs: matches.get_one::<u64>("timeout").copied(),
        verbose: matches.get_flag("verbose"),
        lang,
    }
}

/// Parses the process arguments and runs the selected command.
///
/// # Returns
/// The process exit code: for `run`, success only when the pass rate meets
/// the threshold.
pub async fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();
    let requested = pre_parse_language(&args);
    let language = crate::init(requested.as_deref());

    let matches = build_cli(language).get_matches_from(args);

    match matches.subcommand() {
        Some(("run", run_matches)) => commands::run::execute(run_args(run_matches, requested)).await,
        Some(("init", init_matches)) => {
            let output = init_matches
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("scenarios.toml"));
            commands::init::execute(
                output,
                init_matches.get_flag("force"),
                init_matches.get_flag("non-interactive"),
                language,
            )
        }
        // `subcommand_required` makes clap exit before we get here.
        _ => Ok(ExitCode::FAILURE),
    }
}
