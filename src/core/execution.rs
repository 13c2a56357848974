//! # Scenario Execution Module / 场景执行模块
//!
//! This module runs scenarios step by step through the harness: it resolves
//! identities, renders templates, builds JSON or multipart calls, applies
//! body/byte checks, captures variables and polls for asynchronous work.
//! A failed step is logged and the scenario continues, unless the step is
//! `required`, in which case the remaining steps are recorded as skipped.
//!
//! 此模块通过测试工具逐步运行场景：解析身份、渲染模板、构建 JSON 或 multipart 调用、
//! 执行响应体/字节检查、捕获变量并轮询异步工作。失败的步骤会被记录，场景继续执行；
//! 除非该步骤为 `required`，此时其余步骤被记录为跳过。

use colored::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::config::{Check, Poll, Scenario, Step, Upload, AUTH_DEFAULT, AUTH_NONE, MAX_WAIT_SECS};
use crate::core::harness::{Auth, Call, TestHarness};
use crate::core::identity::{self, Credentials, Identities, Persona};
use crate::core::models::{FailureReason, ScenarioReport, TestResult};
use crate::core::payload::{self, ExportFormat, PayloadKind};
use crate::core::polling::{wait_until, PollOutcome, PollStatus};
use crate::core::template::Vars;
use crate::infra::http::FilePart;
use crate::infra::{fs, t};

/// Runs scenarios against one harness, holding identities for the whole run.
/// 针对一个测试工具运行场景，并在整个运行期间持有身份。
pub struct Executor {
    harness: TestHarness,
    personas: BTreeMap<String, Persona>,
    identities: Identities,
    unavailable: HashSet<String>,
    artifacts_dir: Option<PathBuf>,
    suite_dir: Option<PathBuf>,
    stop: CancellationToken,
}

impl Executor {
    pub fn new(harness: TestHarness, personas: BTreeMap<String, Persona>) -> Self {
        Self {
            harness,
            personas,
            identities: Identities::default(),
            unavailable: HashSet::new(),
            artifacts_dir: None,
            suite_dir: None,
            stop: CancellationToken::new(),
        }
    }

    pub fn with_artifacts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.artifacts_dir = dir;
        self
    }

    /// Directory that relative upload paths are resolved against.
    pub fn with_suite_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.suite_dir = dir;
        self
    }

    /// Steps are skipped once `stop` is cancelled.
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn harness(&self) -> &TestHarness {
        &self.harness
    }

    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    pub fn into_harness(self) -> TestHarness {
        self.harness
    }

    /// Runs every step of `scenario` and returns its results.
    ///
    /// The scenario's persona, if any, is held as the harness's default
    /// credential for the duration of the scenario only.
    ///
    /// 运行 `scenario` 的每个步骤并返回其结果。
    /// 场景的身份（如果有）仅在该场景期间作为测试工具的默认凭据。
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> ScenarioReport {
        let start = Instant::now();
        let locale = self.harness.locale().to_string();

        println!(
            "\n{} {}",
            "▶".cyan().bold(),
            t!("run.scenario_start", locale = &locale, name = &scenario.name).cyan().bold()
        );
        if !scenario.description.is_empty() {
            println!("  {}", scenario.description.dimmed());
        }

        self.harness.set_scenario(Some(scenario.name.clone()));
        self.harness.clear_credential();

        let mut vars = Vars::new();
        let mut abort_reason: Option<String> = None;
        let mut cancelled = false;

        if let Some(persona) = &scenario.persona {
            match self.identity(persona).await {
                Some(credentials) => {
                    expose(&mut vars, &credentials);
                    vars.set("email", json!(credentials.email));
                    if let Some(user_id) = &credentials.user_id {
                        vars.set("user_id", json!(user_id));
                    }
                    self.harness.set_credential(credentials);
                }
                None => {
                    abort_reason = Some(
                        t!("run.persona_unavailable", locale = &locale, persona = persona).to_string(),
                    );
                }
            }
        }

        for step in &scenario.steps {
            if self.stop.is_cancelled() {
                cancelled = true;
                self.harness
                    .record_skip(&step.name, t!("run.interrupted", locale = &locale));
                continue;
            }
            if let Some(reason) = &abort_reason {
                self.harness.record_skip(&step.name, reason.clone());
                continue;
            }

            let passed = self.run_step(scenario, step, &mut vars).await;
            if !passed && step.required {
                abort_reason = Some(
                    t!("run.required_step_failed", locale = &locale, step = &step.name).to_string(),
                );
            }
        }

        self.harness.clear_credential();
        self.harness.set_scenario(None);

        ScenarioReport {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            results: self.harness.take_results(),
            duration: start.elapsed(),
            cancelled,
        }
    }

    /// Establishes a persona once per run; later lookups reuse the credentials.
    /// A persona that failed to establish is not retried.
    async fn identity(&mut self, name: &str) -> Option<Credentials> {
        if let Some(credentials) = self.identities.get(name) {
            return Some(credentials.clone());
        }
        if self.unavailable.contains(name) {
            return None;
        }
        let persona = self.personas.get(name)?.clone();
        let credentials = identity::establish(&mut self.harness, name, &persona).await;
        match &credentials {
            Some(c) => self.identities.insert(c.clone()),
            None => {
                self.unavailable.insert(name.to_string());
            }
        }
        credentials
    }

    async fn resolve_auth(&mut self, selector: &str, vars: &mut Vars) -> Result<Auth, String> {
        match selector {
            AUTH_NONE => Ok(Auth::None),
            AUTH_DEFAULT => Ok(Auth::Default),
            persona => match self.identity(persona).await {
                Some(credentials) => {
                    expose(vars, &credentials);
                    Ok(Auth::As(credentials))
                }
                None => Err(t!(
                    "run.persona_unavailable",
                    locale = self.harness.locale(),
                    persona = persona
                )
                .to_string()),
            },
        }
    }

    /// Runs one step; returns whether the call and all of its checks passed.
    async fn run_step(&mut self, scenario: &Scenario, step: &Step, vars: &mut Vars) -> bool {
        let locale = self.harness.locale().to_string();

        if let Some(secs) = step.sleep_secs.filter(|s| *s > 0.0) {
            println!(
                "  {}",
                t!("run.sleeping", locale = &locale, secs = secs).dimmed()
            );
            tokio::time::sleep(bounded_secs(secs)).await;
        }

        let auth = match self.resolve_auth(scenario.auth_for(step), vars).await {
            Ok(auth) => auth,
            Err(reason) => {
                self.harness.record_skip(&step.name, reason);
                return false;
            }
        };

        let path = vars.render_str(&step.path);
        let unresolved = vars.unresolved(&path);
        if !unresolved.is_empty() {
            self.harness.record_skip(
                &step.name,
                t!("run.unresolved_vars", locale = &locale, vars = unresolved.join(", ")),
            );
            return false;
        }

        let call = match self.build_call(step, &path, vars, auth.clone()).await {
            Ok(call) => call,
            Err(reason) => {
                self.harness
                    .record_failure(&step.name, FailureReason::Setup, reason);
                return false;
            }
        };

        let outcome = self.harness.run_test(&step.name, call).await;
        if !outcome.success {
            return false;
        }

        let mut passed = true;

        for (var, pointer) in &step.save {
            match lookup(&outcome.body, pointer) {
                Some(value) => vars.set(var.clone(), value.clone()),
                None => {
                    self.harness.record(
                        &format!("{} › save {}", step.name, var),
                        false,
                        t!("run.pointer_missing", locale = &locale, pointer = pointer),
                    );
                    passed = false;
                }
            }
        }

        for check in &step.checks {
            let rendered = render_check(check, vars);
            let label = format!("{} › {}", step.name, check_label(&rendered));
            match evaluate_check(&rendered, &outcome.body) {
                Ok(()) => self.harness.record(&label, true, ""),
                Err(reason) => {
                    self.harness.record(&label, false, reason);
                    passed = false;
                }
            }
        }

        if let Some(raw) = &outcome.raw {
            if let Some(format) = step.expect_format {
                let ok = format.matches(&raw.bytes);
                let details = if ok {
                    String::new()
                } else {
                    let detected = ExportFormat::detect(&raw.bytes)
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    t!(
                        "run.format_mismatch",
                        locale = &locale,
                        expected = format,
                        detected = detected,
                        size = raw.bytes.len()
                    )
                    .to_string()
                };
                self.harness
                    .record(&format!("{} › format {}", step.name, format), ok, details);
                passed &= ok;
            }

            if let Some(min) = step.min_bytes {
                let ok = raw.bytes.len() >= min;
                let details = if ok {
                    String::new()
                } else {
                    t!("run.too_small", locale = &locale, size = raw.bytes.len(), min = min).to_string()
                };
                self.harness
                    .record(&format!("{} › size ≥ {}", step.name, min), ok, details);
                passed &= ok;
            }

            if let (Some(name), Some(dir)) = (&step.save_artifact, &self.artifacts_dir) {
                match fs::write_artifact(dir, &scenario.name, &vars.render_str(name), &raw.bytes) {
                    Ok(path) => println!(
                        "           {}",
                        t!("run.artifact_saved", locale = &locale, path = path.display()).dimmed()
                    ),
                    Err(e) => {
                        self.harness.record_failure(
                            &format!("{} › artifact", step.name),
                            FailureReason::Setup,
                            format!("{:#}", e),
                        );
                        passed = false;
                    }
                }
            }
        }

        if let Some(poll) = &step.poll {
            let poll_auth = match &poll.auth {
                Some(selector) => match self.resolve_auth(selector, vars).await {
                    Ok(auth) => auth,
                    Err(reason) => {
                        self.harness
                            .record_skip(&format!("{} › poll", step.name), reason);
                        return false;
                    }
                },
                None => auth,
            };
            passed &= self.run_poll(step, poll, poll_auth, vars).await;
        }

        passed
    }

    async fn build_call(&self, step: &Step, path: &str, vars: &Vars, auth: Auth) -> Result<Call, String> {
        let mut call = Call::new(step.method.into(), path, step.expect).with_auth(auth);
        if let Some(secs) = step.timeout_secs {
            call = call.timeout(Duration::from_secs(secs));
        }
        if let Some(body) = &step.json {
            call = call.json(vars.render_value(body));
        }
        for upload in &step.upload {
            call = call.file(self.file_part(upload, vars).await?);
        }
        for (name, value) in &step.form {
            call = call.field(name.clone(), vars.render_str(value));
        }
        Ok(call)
    }

    async fn file_part(&self, upload: &Upload, vars: &Vars) -> Result<FilePart, String> {
        let text = upload.text.as_deref().map(|t| vars.render_str(t));
        let bytes = match upload.kind {
            PayloadKind::File => {
                let source = upload.path.as_deref().ok_or("upload kind \"file\" needs a path")?;
                let path = fs::expand_path(&vars.render_str(source), self.suite_dir.as_deref())
                    .map_err(|e| format!("{:#}", e))?;
                fs::read_upload(&path).await.map_err(|e| format!("{:#}", e))?
            }
            kind => payload::synthesize(kind, upload.size, text.as_deref()).unwrap_or_default(),
        };
        let file_name = match (&upload.file_name, &upload.path, upload.kind) {
            (Some(name), _, _) => vars.render_str(name),
            (None, Some(path), PayloadKind::File) => PathBuf::from(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| upload.kind.default_file_name().to_string()),
            _ => upload.kind.default_file_name().to_string(),
        };
        Ok(FilePart {
            field: upload.field.clone(),
            file_name,
            mime: upload
                .mime
                .clone()
                .unwrap_or_else(|| upload.kind.default_mime().to_string()),
            bytes,
        })
    }

    /// Polls `poll.path` until the status at `poll.pointer` is ready or failed.
    /// Individual polls are not recorded; the verdict is one result.
    async fn run_poll(&mut self, step: &Step, poll: &Poll, auth: Auth, vars: &mut Vars) -> bool {
        let locale = self.harness.locale().to_string();
        let name = format!("{} › poll", step.name);
        let path = vars.render_str(&poll.path);
        let mut call = Call::get(path.clone(), poll.expect).with_auth(auth);
        if let Some(secs) = step.timeout_secs {
            call = call.timeout(Duration::from_secs(secs));
        }
        let ready: Vec<String> = poll.ready.iter().map(|s| s.to_lowercase()).collect();
        let failed: Vec<String> = poll.failed.iter().map(|s| s.to_lowercase()).collect();

        println!(
            "  {}",
            t!(
                "run.polling",
                locale = &locale,
                path = &path,
                pointer = &poll.pointer,
                max = poll.max_wait_secs
            )
            .dimmed()
        );

        let outcome = {
            let harness = &self.harness;
            let (call, pointer, ready, failed) = (&call, poll.pointer.as_str(), &ready, &failed);
            wait_until(
                move || async move {
                    let Ok(raw) = harness.fetch(call).await else {
                        return PollStatus::Pending;
                    };
                    if raw.status != call.expected_status() {
                        return PollStatus::Pending;
                    }
                    let Ok(body) = raw.json() else {
                        return PollStatus::Pending;
                    };
                    let status = lookup(&body, pointer).map(status_text);
                    match status {
                        Some(status) if ready.contains(&status) => PollStatus::Ready(body),
                        Some(status) if failed.contains(&status) => {
                            PollStatus::Failed(format!("{} = '{}'", pointer, status))
                        }
                        _ => PollStatus::Pending,
                    }
                },
                bounded_secs(poll.interval_secs),
                bounded_secs(poll.max_wait_secs),
            )
            .await
        };

        let method = call.method().as_str().to_string();
        let (result, body) = match outcome {
            PollOutcome::Ready {
                value,
                attempts,
                elapsed,
            } => (
                TestResult::passed(
                    &name,
                    t!("run.poll_ready", locale = &locale, attempts = attempts).to_string(),
                )
                .with_call(&method, &path, poll.expect, Some(poll.expect))
                .with_duration(elapsed),
                Some(value),
            ),
            PollOutcome::Failed {
                reason,
                attempts,
                elapsed,
            } => (
                TestResult::failed(
                    &name,
                    FailureReason::Poll,
                    t!("run.poll_failed", locale = &locale, reason = reason, attempts = attempts)
                        .to_string(),
                )
                .with_call(&method, &path, poll.expect, None)
                .with_duration(elapsed),
                None,
            ),
            PollOutcome::TimedOut { attempts, elapsed } => (
                TestResult::failed(
                    &name,
                    FailureReason::Poll,
                    t!(
                        "run.poll_timed_out",
                        locale = &locale,
                        secs = format!("{:.0}", elapsed.as_secs_f64()),
                        attempts = attempts
                    )
                    .to_string(),
                )
                .with_call(&method, &path, poll.expect, None)
                .with_duration(elapsed),
                None,
            ),
        };

        let mut passed = result.success;
        self.harness.record_result(result);

        if let Some(body) = body {
            for (var, pointer) in &poll.save {
                match lookup(&body, pointer) {
                    Some(value) => vars.set(var.clone(), value.clone()),
                    None => {
                        self.harness.record(
                            &format!("{} › save {}", name, var),
                            false,
                            t!("run.pointer_missing", locale = &locale, pointer = pointer),
                        );
                        passed = false;
                    }
                }
            }
        }
        passed
    }
}

/// Makes `${<persona>.email}`, `${<persona>.user_id}` and `${<persona>.token}` available.
fn expose(vars: &mut Vars, credentials: &Credentials) {
    vars.set(
        credentials.persona.clone(),
        json!({
            "email": credentials.email,
            "user_id": credentials.user_id,
            "token": credentials.token,
        }),
    );
}

/// Seconds from a suite file as a `Duration`, clamped to `0..=MAX_WAIT_SECS`.
/// NaN becomes zero.
fn bounded_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_WAIT_SECS)).unwrap_or(Duration::ZERO)
}

/// Resolves a JSON pointer (`/a/0/b`), a dotted path (`a.0.b`) or, when
/// empty, the whole body.
///
/// 解析 JSON 指针（`/a/0/b`）、点号路径（`a.0.b`），为空时返回整个响应体。
pub fn lookup<'a>(body: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() || pointer == "/" {
        return Some(body);
    }
    if pointer.starts_with('/') {
        body.pointer(pointer)
    } else {
        body.pointer(&format!("/{}", pointer.replace('.', "/")))
    }
}

fn status_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string(),
    }
}

fn render_check(check: &Check, vars: &Vars) -> Check {
    Check {
        pointer: vars.render_str(&check.pointer),
        label: check.label.clone(),
        exists: check.exists,
        equals: check.equals.as_ref().map(|v| vars.render_value(v)),
        contains: check.contains.as_deref().map(|c| vars.render_str(c)),
        min_len: check.min_len,
        not_empty: check.not_empty,
    }
}

fn check_label(check: &Check) -> String {
    if let Some(label) = &check.label {
        return label.clone();
    }
    let target = if check.pointer.is_empty() { "body" } else { check.pointer.as_str() };
    let mut parts = Vec::new();
    match check.exists {
        Some(true) => parts.push("exists".to_string()),
        Some(false) => parts.push("absent".to_string()),
        None => {}
    }
    if let Some(expected) = &check.equals {
        parts.push(format!("== {}", expected));
    }
    if let Some(needle) = &check.contains {
        parts.push(format!("contains '{}'", needle));
    }
    if let Some(min) = check.min_len {
        parts.push(format!("len ≥ {}", min));
    }
    if check.not_empty == Some(true) {
        parts.push("not empty".to_string());
    }
    if parts.is_empty() {
        format!("{} exists", target)
    } else {
        format!("{} {}", target, parts.join(", "))
    }
}

/// Evaluates one check against a decoded body.
///
/// # Returns
/// `Err` with a short human-readable reason when the check fails
pub fn evaluate_check(check: &Check, body: &Value) -> Result<(), String> {
    let target = lookup(body, &check.pointer);

    if let Some(should_exist) = check.exists {
        match (should_exist, target.is_some()) {
            (true, false) => return Err(format!("'{}' not found", check.pointer)),
            (false, true) => return Err(format!("'{}' is present", check.pointer)),
            (false, false) => return Ok(()),
            (true, true) => {}
        }
    }

    let value = target.ok_or_else(|| format!("'{}' not found", check.pointer))?;

    if let Some(expected) = &check.equals {
        if value != expected {
            return Err(format!("expected {}, got {}", expected, value));
        }
    }

    if let Some(needle) = &check.contains {
        let found = match value {
            Value::String(s) => s.contains(needle.as_str()),
            Value::Array(items) => items.iter().any(|item| match item {
                Value::String(s) => s == needle,
                other => other.to_string() == *needle,
            }),
            Value::Object(map) => map.contains_key(needle),
            other => other.to_string().contains(needle.as_str()),
        };
        if !found {
            let shown: String = value.to_string().chars().take(120).collect();
            return Err(format!("'{}' not in {}", needle, shown));
        }
    }

    if let Some(min) = check.min_len {
        let len = match value {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            other => return Err(format!("{} has no length", other)),
        };
        if len < min {
            return Err(format!("length {} < {}", len, min));
        }
    }

    if check.not_empty == Some(true) {
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return Err(format!("'{}' is empty", check.pointer));
        }
    }

    Ok(())
}
