//! # Core Module / 核心模块
//!
//! This module contains the core functionality of API Harness,
//! including the HTTP test harness, identities, polling, scenario
//! configuration and the step executor.
//!
//! 此模块包含 API Harness 的核心功能，
//! 包括 HTTP 测试工具、身份、轮询、场景配置和步骤执行器。

pub mod config;
pub mod execution;
pub mod harness;
pub mod identity;
pub mod models;
pub mod payload;
pub mod planner;
pub mod polling;
pub mod template;

// Re-exports
pub use config::Suite;
pub use execution::Executor;
pub use harness::{Auth, Call, CallOutcome, TestHarness};
pub use identity::Credentials;
pub use models::TestResult;
pub use polling::{wait_until, PollOutcome, PollStatus};
