//! # Reporting Module / 报告模块
//!
//! This module handles the generation and display of run reports in multiple formats.
//! It provides colorful console summaries, a self-contained HTML report and a
//! machine-readable JSON report, with internationalization support.
//!
//! 此模块处理多种格式的运行报告生成和显示。
//! 它提供彩色控制台摘要、独立的 HTML 报告和机器可读的 JSON 报告，支持国际化。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::generate_json_report;
