//! # Configuration Module / 配置模块
//!
//! The suite file (`scenarios.toml` by default) declares harness settings,
//! personas and an ordered list of scenarios, each an ordered list of steps.
//!
//! 套件文件（默认 `scenarios.toml`）声明测试工具设置、身份以及有序的场景列表，
//! 每个场景是有序的步骤列表。

use anyhow::{bail, Context, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::identity::Persona;
use crate::core::payload::{ExportFormat, PayloadKind};
use crate::infra::t;

/// Auth selector meaning "no Authorization header".
pub const AUTH_NONE: &str = "none";
/// Auth selector meaning "the scenario's default persona, if one is held".
pub const AUTH_DEFAULT: &str = "default";

/// Longest sleep, poll interval or poll wait a step may ask for.
pub const MAX_WAIT_SECS: f64 = 86_400.0;

/// Longest synthetic WAV upload, in milliseconds.
pub const MAX_WAV_MS: usize = 600_000;

/// Largest synthetic text upload, in bytes.
pub const MAX_TEXT_BYTES: usize = 64 * 1024 * 1024;

/// Settings under `[harness]`.
/// `[harness]` 下的设置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessSettings {
    /// Base URL every step path is joined onto. `${VAR}` and `~` are expanded.
    /// 每个步骤路径拼接的基础 URL。会展开 `${VAR}` 和 `~`。
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// The language for console and report messages (e.g., "en", "zh-CN").
    /// 控制台和报告消息的语言。
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum pass percentage for a successful exit code.
    /// 成功退出码所需的最低通过率。
    #[serde(default = "default_min_pass_rate")]
    pub min_pass_rate: f64,
    /// Where `save_artifact` steps write response bytes.
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_min_pass_rate() -> f64 {
    80.0
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
            min_pass_rate: default_min_pass_rate(),
            artifacts_dir: None,
            user_agent: None,
        }
    }
}

/// HTTP method of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// A file attached to a multipart step under `[[scenarios.steps.upload]]`.
/// 附加到 multipart 步骤的文件。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Upload {
    #[serde(default = "default_upload_field")]
    pub field: String,
    pub kind: PayloadKind,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    /// Source file for `kind = "file"`, relative to the suite file.
    #[serde(default)]
    pub path: Option<String>,
    /// Milliseconds of audio for `wav`, bytes for `text`.
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub text: Option<String>,
}

fn default_upload_field() -> String {
    "file".to_string()
}

/// An assertion on the decoded body of a successful step.
/// 对成功步骤解码后响应体的断言。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Check {
    /// JSON pointer into the body, e.g. `/report/sections/0`. Empty means the whole body.
    #[serde(default)]
    pub pointer: String,
    #[serde(default)]
    pub label: Option<String>,
    /// `true`: the pointer must resolve; `false`: it must not.
    #[serde(default)]
    pub exists: Option<bool>,
    #[serde(default)]
    pub equals: Option<Value>,
    /// Substring of a string value, element of an array, or key of an object.
    #[serde(default)]
    pub contains: Option<String>,
    /// Minimum length of a string, array or object.
    #[serde(default)]
    pub min_len: Option<usize>,
    /// `true`: the value must not be null, `""`, `[]` or `{}`.
    #[serde(default)]
    pub not_empty: Option<bool>,
}

/// Polling for asynchronous server-side work after a step succeeds.
/// 步骤成功后对异步服务器端工作的轮询。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Poll {
    pub path: String,
    #[serde(default = "default_poll_pointer")]
    pub pointer: String,
    #[serde(default = "default_ready_values")]
    pub ready: Vec<String>,
    #[serde(default = "default_failed_values")]
    pub failed: Vec<String>,
    #[serde(default = "default_poll_interval")]
    pub interval_secs: f64,
    #[serde(default = "default_poll_max_wait")]
    pub max_wait_secs: f64,
    #[serde(default = "default_expect")]
    pub expect: u16,
    /// Defaults to the step's auth.
    #[serde(default)]
    pub auth: Option<String>,
    /// Captures from the final (ready) poll response.
    #[serde(default)]
    pub save: BTreeMap<String, String>,
}

fn default_poll_pointer() -> String {
    "/status".to_string()
}

fn default_ready_values() -> Vec<String> {
    ["completed", "complete", "done", "ready", "success"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_failed_values() -> Vec<String> {
    ["failed", "error"].iter().map(|s| s.to_string()).collect()
}

fn default_poll_interval() -> f64 {
    2.0
}

fn default_poll_max_wait() -> f64 {
    120.0
}

fn default_expect() -> u16 {
    200
}

/// One harness call and everything checked around it.
/// 一次测试工具调用及其周围的所有检查。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub path: String,
    #[serde(default = "default_expect")]
    pub expect: u16,
    /// `"none"`, `"default"` or a persona name. Defaults to the scenario's `auth`.
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default)]
    pub upload: Vec<Upload>,
    /// Multipart text fields.
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Fixed wait before the call.
    #[serde(default)]
    pub sleep_secs: Option<f64>,
    /// Skip the rest of the scenario when this step fails.
    /// 此步骤失败时跳过场景的其余步骤。
    #[serde(default)]
    pub required: bool,
    /// `var name -> JSON pointer` captured from the response.
    #[serde(default)]
    pub save: BTreeMap<String, String>,
    #[serde(default)]
    pub checks: Vec<Check>,
    #[serde(default)]
    pub expect_format: Option<ExportFormat>,
    #[serde(default)]
    pub min_bytes: Option<usize>,
    #[serde(default)]
    pub poll: Option<Poll>,
    /// File name for the raw response under the artifacts directory.
    #[serde(default)]
    pub save_artifact: Option<String>,
}

/// Represents a named, ordered list of steps.
/// 表示一个具名的有序步骤列表。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub skip: bool,
    /// Persona established at the start and held as the default credential.
    /// 在开始时建立并作为默认凭据持有的身份。
    #[serde(default)]
    pub persona: Option<String>,
    /// Default auth selector for the steps. `"default"` when `persona` is set, otherwise `"none"`.
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// The auth selector that applies to `step`.
    pub fn auth_for<'a>(&'a self, step: &'a Step) -> &'a str {
        step.auth
            .as_deref()
            .or(self.auth.as_deref())
            .unwrap_or(if self.persona.is_some() { AUTH_DEFAULT } else { AUTH_NONE })
    }
}

/// Represents the entire suite configuration, loaded from a TOML file.
/// 代表从 TOML 文件加载的整个套件配置。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Suite {
    #[serde(default)]
    pub harness: HarnessSettings,
    #[serde(default)]
    pub personas: BTreeMap<String, Persona>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Reads, parses and validates a suite file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| t!("config.read_failed", path = path.display()).to_string())?;
        let suite: Suite = toml::from_str(&content)
            .with_context(|| t!("config.parse_failed", path = path.display()).to_string())?;
        suite.validate()?;
        Ok(suite)
    }

    /// Checks cross-references the type system cannot: unique scenario
    /// names, known personas, sane numbers, and JSON/upload exclusivity.
    ///
    /// 检查类型系统无法保证的交叉引用：场景名称唯一、身份已知、数值合理、
    /// JSON 与上传互斥。
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.harness.min_pass_rate) {
            bail!("harness.min_pass_rate must be between 0 and 100, got {}", self.harness.min_pass_rate);
        }
        if self.harness.timeout_secs == 0 {
            bail!("harness.timeout_secs must be greater than 0");
        }

        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            if !names.insert(scenario.name.as_str()) {
                bail!("duplicate scenario name '{}'", scenario.name);
            }
            if let Some(persona) = &scenario.persona {
                self.check_persona(persona, &scenario.name, "persona")?;
            }
            for step in &scenario.steps {
                let at = format!("{} › {}", scenario.name, step.name);
                self.check_auth(scenario.auth_for(step), &at)?;
                if step.json.is_some() && (!step.upload.is_empty() || !step.form.is_empty()) {
                    bail!("step '{}' sets both json and upload/form", at);
                }
                for upload in &step.upload {
                    if upload.kind == PayloadKind::File && upload.path.is_none() {
                        bail!("step '{}' uploads kind = \"file\" without a path", at);
                    }
                    check_upload_size(upload, &at)?;
                }
                if let Some(poll) = &step.poll {
                    if poll.interval_secs <= 0.0 {
                        bail!("step '{}' has a non-positive poll interval", at);
                    }
                    check_secs(poll.interval_secs, &at, "poll.interval_secs")?;
                    check_secs(poll.max_wait_secs, &at, "poll.max_wait_secs")?;
                    if let Some(auth) = &poll.auth {
                        self.check_auth(auth, &at)?;
                    }
                }
                if let Some(secs) = step.sleep_secs {
                    check_secs(secs, &at, "sleep_secs")?;
                }
            }
        }
        Ok(())
    }

    fn check_auth(&self, auth: &str, at: &str) -> Result<()> {
        match auth {
            AUTH_NONE | AUTH_DEFAULT => Ok(()),
            persona => self.check_persona(persona, at, "auth"),
        }
    }

    fn check_persona(&self, persona: &str, at: &str, field: &str) -> Result<()> {
        if self.personas.contains_key(persona) {
            Ok(())
        } else {
            bail!("'{}' refers to unknown persona '{}' in {}", at, persona, field)
        }
    }
}

fn check_secs(value: f64, at: &str, field: &str) -> Result<()> {
    if !value.is_finite() || !(0.0..=MAX_WAIT_SECS).contains(&value) {
        bail!(
            "step '{}' sets {} = {}, expected a number of seconds between 0 and {}",
            at,
            field,
            value,
            MAX_WAIT_SECS
        );
    }
    Ok(())
}

fn check_upload_size(upload: &Upload, at: &str) -> Result<()> {
    let limit = match upload.kind {
        PayloadKind::Wav => MAX_WAV_MS,
        PayloadKind::Text => MAX_TEXT_BYTES,
        _ => return Ok(()),
    };
    match upload.size {
        Some(size) if size > limit => bail!(
            "step '{}' asks for a {:?} upload of size {}, the limit is {}",
            at,
            upload.kind,
            size,
            limit
        ),
        _ => Ok(()),
    }
}
