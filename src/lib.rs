//! # API Harness Library / API Harness 库
//!
//! This library provides the core functionality for the API Harness tool,
//! a configuration-driven QA runner that drives a remote note-taking service's
//! HTTP API through declarative scenario suites.
//!
//! 此库为 API Harness 工具提供核心功能，
//! 这是一个配置驱动的 QA 运行器，通过声明式场景套件驱动远程笔记服务的 HTTP API。
//!
//! ## Modules / 模块
//!
//! - `core` - Harness, identities, polling, scenario models and the step executor
//! - `infra` - HTTP plumbing and file system helpers
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 测试工具、身份、轮询、场景模型和步骤执行器
//! - `infra` - HTTP 管道和文件系统辅助工具
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::harness;
pub use core::models;

/// Initializes the application's internationalization (i18n).
///
/// An explicitly requested language wins; otherwise the system locale is
/// detected. Either is matched against the bundled translations, first in
/// full (e.g., "zh-CN"), then by language code (e.g., "en"), and finally
/// falls back to the default language ("en").
///
/// 初始化应用程序的国际化。显式请求的语言优先，否则检测系统语言环境。
pub fn init(requested: Option<&str>) -> &'static str {
    let locale = match requested {
        Some(lang) => resolve_locale(lang),
        None => resolve_locale(&sys_locale::get_locale().unwrap_or_else(|| "en".to_string())),
    };
    rust_i18n::set_locale(locale);
    locale
}

/// Maps a requested locale onto one of the bundled translations.
pub fn resolve_locale(requested: &str) -> &'static str {
    let available_locales = rust_i18n::available_locales!();

    // Full match first ("zh-CN"), then the language part ("en" from "en-US").
    if let Some(found) = available_locales.iter().find(|l| **l == requested) {
        return *found;
    }
    requested
        .split(['-', '_'])
        .next()
        .and_then(|lang| {
            available_locales
                .iter()
                .find(|l| l.split('-').next() == Some(lang))
                .copied()
        })
        .unwrap_or("en")
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
