//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a starter
//! scenario suite. With a terminal attached it asks for the base URL, the
//! language and which scenario groups to include; otherwise (or with
//! `--non-interactive`) it writes everything with defaults.
//!
//! 此模块实现 `init` 命令，用于写入初始场景套件。连接终端时会询问基础 URL、
//! 语言以及要包含的场景组；否则（或使用 `--non-interactive` 时）使用默认值写入全部内容。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect, Select};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::core::config::HarnessSettings;
use crate::infra::{fs, t};

const SUITE_HEADER: &str = r#"# API Harness scenario suite / API Harness 场景套件
#
# Every step is one harness call: `expect` is the status that counts as a
# pass. `${var}` refers to values saved by earlier steps of the same scenario
# (`save = { var = "/json/pointer" }`), to `${email}` / `${user_id}` of the
# scenario persona, to `${<persona>.email}` of any persona used so far, and to
# the built-ins `${uuid}`, `${timestamp}`, `${date}` and `${time}`.
# Expected values below describe one particular backend; adjust them to yours.

[harness]
base_url = "@BASE_URL@"
language = "@LANGUAGE@"
timeout_secs = 30
# Exit code is 0 when at least this percentage of assertions pass.
# 当至少此百分比的断言通过时，退出码为 0。
min_pass_rate = 80.0
artifacts_dir = "artifacts"

# Personas register a fresh user with a unique email on first use.
# 身份在首次使用时以唯一邮箱注册新用户。
[personas.regular]
email_domain = "example.com"
full_name = "QA Regular User"

[personas.special]
email_domain = "special.example.com"
full_name = "QA Special User"
"#;

/// A named group of scenarios the wizard can include or leave out.
struct Template {
    key: &'static str,
    body: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        key: "health",
        body: r#"
[[scenarios]]
name = "health"
description = "Service health check"
tags = ["smoke"]

[[scenarios.steps]]
name = "Health check"
path = "health"
checks = [{ pointer = "/status", equals = "healthy" }]
"#,
    },
    Template {
        key: "auth",
        body: r#"
[[scenarios]]
name = "auth"
description = "Registration, token use and rejected credentials"
tags = ["smoke", "auth"]
persona = "regular"

[[scenarios.steps]]
name = "Current user"
path = "auth/me"
checks = [{ pointer = "/email", equals = "${email}" }]

[[scenarios.steps]]
name = "Bad login"
method = "POST"
path = "auth/login"
expect = 401
auth = "none"
json = { email = "${email}", password = "definitely-wrong" }

[[scenarios]]
name = "anonymous-access"
description = "Protected endpoints reject calls without a token"
tags = ["auth"]

[[scenarios.steps]]
name = "List notes anonymously"
path = "notes"
expect = 401

[[scenarios.steps]]
name = "Create note anonymously"
method = "POST"
path = "notes"
expect = 401
json = { title = "should not exist", content = "" }
"#,
    },
    Template {
        key: "notes",
        body: r#"
[[scenarios]]
name = "notes-crud"
description = "Create, read, update, list and delete a note"
tags = ["notes"]
persona = "regular"

[[scenarios.steps]]
name = "Create note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "QA note ${timestamp}", content = "Weekly sync. Decision: ship v2 on Friday. Action item: Alice updates the docs." }
save = { note_id = "/id" }
checks = [{ pointer = "/title", contains = "QA note" }]

[[scenarios.steps]]
name = "Get note"
path = "notes/${note_id}"
checks = [{ pointer = "/id", equals = "${note_id}" }]

[[scenarios.steps]]
name = "Update note"
method = "PUT"
path = "notes/${note_id}"
json = { title = "QA note (edited)" }
checks = [{ pointer = "/title", equals = "QA note (edited)" }]

[[scenarios.steps]]
name = "List notes"
path = "notes"
checks = [{ min_len = 1 }]

[[scenarios.steps]]
name = "Delete note"
method = "DELETE"
path = "notes/${note_id}"
expect = 204

[[scenarios.steps]]
name = "Deleted note is gone"
path = "notes/${note_id}"
expect = 404
"#,
    },
    Template {
        key: "audio",
        body: r#"
[[scenarios]]
name = "audio-transcription"
description = "Upload a synthetic recording and wait for its transcription"
tags = ["upload", "slow"]
persona = "regular"

[[scenarios.steps]]
name = "Upload audio"
method = "POST"
path = "notes/upload"
timeout_secs = 120
required = true
form = { title = "QA audio ${timestamp}" }
save = { note_id = "/id" }

[[scenarios.steps.upload]]
kind = "wav"
size = 3000

[scenarios.steps.poll]
path = "notes/${note_id}"
pointer = "/transcription_status"
interval_secs = 3.0
max_wait_secs = 180.0

[[scenarios.steps]]
name = "Upload image"
method = "POST"
path = "notes/upload"
form = { title = "QA image" }

[[scenarios.steps.upload]]
kind = "png"
"#,
    },
    Template {
        key: "ai",
        body: r#"
[[scenarios]]
name = "ai-chat"
description = "Ask the assistant about a note's content"
tags = ["ai", "slow"]
persona = "regular"

[[scenarios.steps]]
name = "Create note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "Planning meeting", content = "Bob presents the roadmap. Carol owns the migration. Deadline is March 1st." }
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Chat about note"
method = "POST"
path = "notes/${note_id}/chat"
timeout_secs = 120
json = { message = "Who owns the migration?" }
checks = [{ pointer = "/response", min_len = 1 }]

[[scenarios]]
name = "report-generation"
description = "Generate a single meeting report"
tags = ["ai", "reports", "slow"]
persona = "regular"

[[scenarios.steps]]
name = "Create note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "Sprint review", content = "Summary of the sprint. Completed: login page. Blocked: payments. Next: load testing." }
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Generate report"
method = "POST"
path = "reports/generate"
timeout_secs = 180
json = { note_id = "${note_id}", report_type = "meeting_summary" }
checks = [
    { pointer = "/report", min_len = 50 },
    { pointer = "/report", contains = "Summary", label = "report has a summary section" },
]
"#,
    },
    Template {
        key: "export",
        body: r#"
[[scenarios]]
name = "batch-export"
description = "Batch report over two notes in every export format"
tags = ["reports", "export", "slow"]
persona = "regular"

[[scenarios.steps]]
name = "Create first note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "Batch A", content = "Customer call. Renewal confirmed for next year." }
save = { note_a = "/id" }

[[scenarios.steps]]
name = "Create second note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "Batch B", content = "Vendor call. Price increase of five percent." }
save = { note_b = "/id" }

[[scenarios.steps]]
name = "Batch export txt"
method = "POST"
path = "reports/batch"
timeout_secs = 180
json = { note_ids = ["${note_a}", "${note_b}"], title = "QA batch", format = "txt" }
expect_format = "txt"
min_bytes = 50
save_artifact = "batch.txt"

[[scenarios.steps]]
name = "Batch export rtf"
method = "POST"
path = "reports/batch"
timeout_secs = 180
json = { note_ids = ["${note_a}", "${note_b}"], title = "QA batch", format = "rtf" }
expect_format = "rtf"
save_artifact = "batch.rtf"

[[scenarios.steps]]
name = "Batch export pdf"
method = "POST"
path = "reports/batch"
timeout_secs = 180
json = { note_ids = ["${note_a}", "${note_b}"], title = "QA batch", format = "pdf" }
expect_format = "pdf"
min_bytes = 500
save_artifact = "batch.pdf"

[[scenarios.steps]]
name = "Batch export docx"
method = "POST"
path = "reports/batch"
timeout_secs = 180
json = { note_ids = ["${note_a}", "${note_b}"], title = "QA batch", format = "docx" }
expect_format = "docx"
min_bytes = 500
save_artifact = "batch.docx"

[[scenarios]]
name = "conversation-export"
description = "Export an AI conversation as a document"
tags = ["ai", "export", "slow"]
persona = "regular"

[[scenarios.steps]]
name = "Create note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "Retro", content = "What went well: releases. What to improve: on-call handover." }
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Chat about note"
method = "POST"
path = "notes/${note_id}/chat"
timeout_secs = 120
required = true
json = { message = "List the improvement points." }

[[scenarios.steps]]
name = "Export conversation pdf"
method = "POST"
path = "notes/${note_id}/chat/export"
timeout_secs = 120
json = { format = "pdf" }
expect_format = "pdf"
save_artifact = "conversation.pdf"

[[scenarios.steps]]
name = "Export conversation docx"
method = "POST"
path = "notes/${note_id}/chat/export"
timeout_secs = 120
json = { format = "docx" }
expect_format = "docx"
save_artifact = "conversation.docx"
"#,
    },
    Template {
        key: "diagram",
        body: r#"
[[scenarios]]
name = "network-diagram"
description = "Generate network diagrams from a description and from a CSV inventory"
tags = ["ai", "diagram", "slow"]
persona = "regular"

[[scenarios.steps]]
name = "Diagram from text"
method = "POST"
path = "diagrams/generate"
timeout_secs = 120
json = { input_type = "text", description = "A core switch connects two access switches, a firewall and a router to the internet." }
checks = [{ pointer = "/diagram", exists = true }]

[[scenarios.steps]]
name = "Diagram from CSV"
method = "POST"
path = "diagrams/generate/csv"
timeout_secs = 120
form = { input_type = "csv" }
checks = [{ pointer = "/diagram", exists = true }]

[[scenarios.steps.upload]]
kind = "csv"
"#,
    },
    Template {
        key: "personas",
        body: r#"
[[scenarios]]
name = "two-personas"
description = "Two users cannot see each other's notes"
tags = ["auth", "notes"]
persona = "regular"

[[scenarios.steps]]
name = "Create private note"
method = "POST"
path = "notes"
expect = 201
required = true
json = { title = "Private", content = "Only the owner may read this." }
save = { note_id = "/id" }

[[scenarios.steps]]
name = "Other user is denied"
path = "notes/${note_id}"
auth = "special"
expect = 404

[[scenarios.steps]]
name = "Other user sees own identity"
path = "auth/me"
auth = "special"
checks = [{ pointer = "/email", equals = "${special.email}" }]

[[scenarios.steps]]
name = "Owner still reads note"
path = "notes/${note_id}"
"#,
    },
];

/// Renders a suite from the header and the chosen templates.
fn render_suite(base_url: &str, language: &str, keys: &[&str]) -> String {
    let mut suite = SUITE_HEADER
        .replace("@BASE_URL@", base_url)
        .replace("@LANGUAGE@", language);
    for template in TEMPLATES.iter().filter(|t| keys.contains(&t.key)) {
        suite.push_str(template.body);
    }
    suite
}

/// The suite `init --non-interactive` writes.
pub fn default_suite() -> String {
    let settings = HarnessSettings::default();
    let keys: Vec<&str> = TEMPLATES.iter().map(|t| t.key).collect();
    render_suite(&settings.base_url, &settings.language, &keys)
}

fn group_label(key: &str, locale: &str) -> String {
    let label = match key {
        "health" => t!("init.group_health", locale = locale),
        "auth" => t!("init.group_auth", locale = locale),
        "notes" => t!("init.group_notes", locale = locale),
        "audio" => t!("init.group_audio", locale = locale),
        "ai" => t!("init.group_ai", locale = locale),
        "export" => t!("init.group_export", locale = locale),
        "diagram" => t!("init.group_diagram", locale = locale),
        "personas" => t!("init.group_personas", locale = locale),
        other => return other.to_string(),
    };
    label.to_string()
}

fn run_wizard(locale: &str) -> Result<Option<String>> {
    let theme = ColorfulTheme::default();
    let defaults = HarnessSettings::default();

    let base_url: String = Input::with_theme(&theme)
        .with_prompt(t!("init.prompt_base_url", locale = locale))
        .default(defaults.base_url)
        .interact_text()?;

    let languages = ["en", "zh-CN"];
    let language = Select::with_theme(&theme)
        .with_prompt(t!("init.prompt_language", locale = locale))
        .items(&languages)
        .default(languages.iter().position(|l| *l == locale).unwrap_or(0))
        .interact()?;

    let labels: Vec<String> = TEMPLATES
        .iter()
        .map(|template| group_label(template.key, locale))
        .collect();
    let selected = MultiSelect::with_theme(&theme)
        .with_prompt(t!("init.prompt_groups", locale = locale))
        .items(&labels)
        .defaults(&vec![true; labels.len()])
        .interact()?;
    let keys: Vec<&str> = selected.iter().map(|&i| TEMPLATES[i].key).collect();

    let confirmed = Confirm::with_theme(&theme)
        .with_prompt(t!("init.prompt_confirm", locale = locale, count = keys.len()))
        .default(true)
        .interact()?;
    if !confirmed {
        return Ok(None);
    }
    Ok(Some(render_suite(&base_url, languages[language], &keys)))
}

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path for the new suite file
/// * `force` - Whether to overwrite an existing file
/// * `non_interactive` - Skip the wizard even when a terminal is attached
/// * `locale` - Language for messages
///
/// # Returns
/// `ExitCode::FAILURE` when the file exists and `force` is not set.
pub fn execute(output: PathBuf, force: bool, non_interactive: bool, locale: &str) -> Result<ExitCode> {
    if output.exists() && !force {
        println!(
            "{}",
            t!("init.file_exists", locale = locale, path = output.display()).red()
        );
        println!("{}", t!("init.use_force", locale = locale).yellow());
        return Ok(ExitCode::FAILURE);
    }

    let contents = if non_interactive || !std::io::stdin().is_terminal() {
        default_suite()
    } else {
        match run_wizard(locale)? {
            Some(contents) => contents,
            None => {
                println!("{}", t!("init.cancelled", locale = locale).yellow());
                return Ok(ExitCode::SUCCESS);
            }
        }
    };

    fs::write_report(&output, &contents)
        .with_context(|| t!("init.write_failed", locale = locale, path = output.display()).to_string())?;

    println!(
        "{}",
        t!("init.success", locale = locale, path = output.display()).green()
    );
    println!("{}", t!("init.next_steps", locale = locale, path = output.display()));
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Suite;

    #[test]
    fn default_suite_parses_and_validates() {
        let suite: Suite = toml::from_str(&default_suite()).expect("default suite is valid TOML");
        suite.validate().expect("default suite validates");
        assert_eq!(suite.personas.len(), 2);
        let names: Vec<&str> = suite.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"health"));
        assert!(names.contains(&"batch-export"));
        assert!(names.contains(&"two-personas"));

        let audio = suite.scenarios.iter().find(|s| s.name == "audio-transcription").unwrap();
        assert_eq!(audio.steps[0].upload.len(), 1);
        assert!(audio.steps[0].poll.is_some());
        assert!(audio.steps[1].poll.is_none());
    }

    #[test]
    fn partial_suites_keep_the_header() {
        let suite: Suite = toml::from_str(&render_suite("http://qa.test/api", "zh-CN", &["health"])).unwrap();
        assert_eq!(suite.harness.base_url, "http://qa.test/api");
        assert_eq!(suite.harness.language, "zh-CN");
        assert_eq!(suite.scenarios.len(), 1);
    }
}
