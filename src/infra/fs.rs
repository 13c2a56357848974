//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations,
//! such as expanding user paths, reading upload files and saving
//! downloaded artifacts and reports.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如展开用户路径、读取上传文件以及保存下载的产物和报告。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Replaces every non-alphanumeric character so the name is safe as a file name.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    sanitized.trim_matches('_').to_string()
}

/// Expands `~` and `$VAR` / `${VAR}` in a user supplied string.
pub fn expand(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)
        .with_context(|| format!("Failed to expand: {}", value))?
        .into_owned())
}

/// Expands a user supplied path and resolves it against `base` when relative.
pub fn expand_path(value: &str, base: Option<&Path>) -> Result<PathBuf> {
    let path = PathBuf::from(expand(value)?);
    Ok(match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    })
}

/// Reads a file that will be attached to a multipart upload.
pub async fn read_upload(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read upload file: {}", path.display()))
}

/// Saves a downloaded artifact as `<dir>/<scenario>/<name>`, creating directories as needed.
///
/// # Returns
/// The path of the written file
pub fn write_artifact(dir: &Path, scenario: &str, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let target_dir = dir.join(sanitize_name(scenario));
    fs::create_dir_all(&target_dir).with_context(|| {
        format!(
            "Failed to create artifacts directory: {}",
            target_dir.display()
        )
    })?;
    let path = target_dir.join(sanitize_name(name));
    fs::write(&path, bytes)
        .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
    Ok(path)
}

/// Writes a report file, creating its parent directory if needed.
pub fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write: {}", path.display()))
}
