//! # Identity Module / 身份模块
//!
//! Personas are named test users declared in the suite. A persona becomes
//! `Credentials` through one registration (or login) call; credentials are
//! plain values handed to each call that needs them, so several identities
//! can be used side by side without swapping shared state.
//!
//! 身份（persona）是在套件中声明的具名测试用户。通过一次注册（或登录）调用，
//! 身份转换为 `Credentials`；凭据是传递给每个调用的普通值，
//! 因此可以同时使用多个身份，而无需交换共享状态。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::core::harness::{Call, TestHarness};
use crate::core::models::FailureReason;

/// Pointers tried after the configured one when looking for a token.
const TOKEN_FALLBACK_POINTERS: &[&str] = &["/access_token", "/token", "/data/access_token", "/data/token"];
const USER_ID_FALLBACK_POINTERS: &[&str] = &["/user/id", "/user_id", "/id", "/data/user/id"];

/// An established identity: a bearer token and the user it belongs to.
/// 已建立的身份：bearer 令牌及其所属用户。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub persona: String,
    pub email: String,
    pub token: String,
    pub user_id: Option<String>,
}

/// A test user declared in the suite under `[personas.<name>]`.
/// 在套件 `[personas.<name>]` 下声明的测试用户。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Persona {
    /// Domain used for generated emails, e.g. a special-domain user gets a
    /// different domain than a regular one.
    /// 生成邮箱时使用的域名。
    #[serde(default = "default_email_domain")]
    pub email_domain: String,
    /// A fixed email. When set, no unique email is generated.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Log in with `email`/`password` instead of registering a new user.
    /// 使用 `email`/`password` 登录，而不是注册新用户。
    #[serde(default)]
    pub login_only: bool,
    #[serde(default = "default_register_path")]
    pub register_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_auth_status")]
    pub expect: u16,
    /// JSON pointer to the bearer token in the registration/login response.
    #[serde(default = "default_token_pointer")]
    pub token_pointer: String,
    #[serde(default = "default_user_id_pointer")]
    pub user_id_pointer: String,
    /// Extra fields merged into the registration body.
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

fn default_email_domain() -> String {
    "example.com".to_string()
}

fn default_password() -> String {
    "TestPassword123!".to_string()
}

fn default_register_path() -> String {
    "auth/register".to_string()
}

fn default_login_path() -> String {
    "auth/login".to_string()
}

fn default_auth_status() -> u16 {
    200
}

fn default_token_pointer() -> String {
    "/access_token".to_string()
}

fn default_user_id_pointer() -> String {
    "/user/id".to_string()
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            email_domain: default_email_domain(),
            email: None,
            password: default_password(),
            full_name: None,
            login_only: false,
            register_path: default_register_path(),
            login_path: default_login_path(),
            expect: default_auth_status(),
            token_pointer: default_token_pointer(),
            user_id_pointer: default_user_id_pointer(),
            extra: BTreeMap::new(),
        }
    }
}

/// Generates a unique address such as `regular_3f9a1c2e@example.com`.
pub fn unique_email(persona: &str, domain: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}@{}", persona.to_lowercase(), &id[..8], domain)
}

fn string_at(body: &Value, pointer: &str) -> Option<String> {
    match body.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Persona {
    /// The email this persona will use for the current run.
    pub fn email_for(&self, name: &str) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| unique_email(name, &self.email_domain))
    }

    /// The registration or login call for this persona.
    pub fn auth_call(&self, email: &str) -> Call {
        if self.login_only {
            Call::post(&self.login_path, self.expect).json(json!({
                "email": email,
                "password": self.password,
            }))
        } else {
            let mut body = json!({
                "email": email,
                "password": self.password,
                "full_name": self.full_name.clone().unwrap_or_else(|| "QA Tester".to_string()),
            });
            for (key, value) in &self.extra {
                body[key] = value.clone();
            }
            Call::post(&self.register_path, self.expect).json(body)
        }
    }

    /// Pulls the token and user id out of a registration/login response.
    /// Returns `None` when no token is present.
    ///
    /// 从注册/登录响应中提取令牌和用户 ID。没有令牌时返回 `None`。
    pub fn extract_credentials(&self, name: &str, email: &str, body: &Value) -> Option<Credentials> {
        let token = std::iter::once(self.token_pointer.as_str())
            .chain(TOKEN_FALLBACK_POINTERS.iter().copied())
            .find_map(|p| string_at(body, p))?;
        let user_id = std::iter::once(self.user_id_pointer.as_str())
            .chain(USER_ID_FALLBACK_POINTERS.iter().copied())
            .find_map(|p| string_at(body, p));
        Some(Credentials {
            persona: name.to_string(),
            email: email.to_string(),
            token,
            user_id,
        })
    }
}

/// Establishes a persona through the harness: one recorded registration or
/// login call, plus a recorded failure when the response carries no token.
///
/// 通过测试工具建立身份：一次被记录的注册或登录调用；
/// 如果响应中没有令牌，再记录一次失败。
pub async fn establish(harness: &mut TestHarness, name: &str, persona: &Persona) -> Option<Credentials> {
    let email = persona.email_for(name);
    let label = if persona.login_only {
        format!("Login persona '{}'", name)
    } else {
        format!("Register persona '{}'", name)
    };
    let outcome = harness.run_test(&label, persona.auth_call(&email)).await;
    if !outcome.success {
        return None;
    }
    let credentials = persona.extract_credentials(name, &email, &outcome.body);
    if credentials.is_none() {
        harness.record_failure(
            &format!("{} token", label),
            FailureReason::Check,
            format!("no bearer token at '{}'", persona.token_pointer),
        );
    }
    credentials
}

/// Credentials established so far in this run, keyed by persona name.
/// 本次运行中已建立的凭据，按身份名称索引。
#[derive(Debug, Default)]
pub struct Identities {
    held: BTreeMap<String, Credentials>,
}

impl Identities {
    pub fn get(&self, name: &str) -> Option<&Credentials> {
        self.held.get(name)
    }

    pub fn insert(&mut self, credentials: Credentials) {
        self.held.insert(credentials.persona.clone(), credentials);
    }
}
