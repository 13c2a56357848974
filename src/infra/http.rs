//! # HTTP Plumbing Module / HTTP 管道模块
//!
//! Thin helpers around `reqwest`: client construction, URL joining,
//! attaching JSON or multipart bodies, and capturing a response as raw
//! bytes plus headers so the harness can decide how to decode it.
//!
//! 围绕 `reqwest` 的轻量辅助工具：构建客户端、拼接 URL、附加 JSON 或 multipart
//! 请求体，并将响应捕获为原始字节和响应头，由测试工具决定如何解码。

use reqwest::header::CONTENT_TYPE;
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// User agent sent with every request unless the suite overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("api-harness/", env!("CARGO_PKG_VERSION"));

/// Number of characters of a non-JSON body kept in logs and fallback bodies.
pub const TEXT_PREVIEW_CHARS: usize = 200;

/// One file attached to a multipart upload.
/// multipart 上传中附加的一个文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name, e.g. `file` / 表单字段名
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// The body attached to an outgoing request. JSON and multipart are mutually exclusive.
/// 请求体。JSON 与 multipart 互斥。
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Multipart {
        files: Vec<FilePart>,
        fields: Vec<(String, String)>,
    },
}

/// Builds the shared client. Timeouts are applied per request.
pub fn build_client(user_agent: Option<&str>) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .build()
}

/// Joins a relative resource path onto the base URL with exactly one `/`
/// between them. Absolute `http(s)://` paths are returned unchanged.
///
/// 将相对资源路径拼接到基础 URL 上，两者之间恰好一个 `/`。
/// 绝对 `http(s)://` 路径原样返回。
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

fn multipart_form(files: &[FilePart], fields: &[(String, String)]) -> reqwest::Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }
    for file in files {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)?;
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}

/// Prepares a request: method, URL, optional bearer token, body and timeout.
/// For multipart bodies the content type (with its boundary) is left to `reqwest`.
///
/// 准备请求：方法、URL、可选的 bearer 令牌、请求体和超时。
/// multipart 请求体的内容类型（含 boundary）由 `reqwest` 决定。
pub fn prepare(
    client: &Client,
    method: Method,
    url: &str,
    body: &Body,
    bearer: Option<&str>,
    timeout: Duration,
) -> reqwest::Result<RequestBuilder> {
    let mut request = client.request(method, url).timeout(timeout);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    request = match body {
        Body::Empty => request,
        Body::Json(value) => request.json(value),
        Body::Multipart { files, fields } => request.multipart(multipart_form(files, fields)?),
    };
    Ok(request)
}

/// A fully read response.
/// 已完整读取的响应。
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
}

impl RawResponse {
    /// Reads status, headers and the whole body.
    pub async fn read(response: Response) -> reqwest::Result<Self> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let bytes = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            content_type,
            headers,
            bytes,
        })
    }

    /// Whether the declared content type is JSON (`application/json`, `application/problem+json`...).
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let mime = ct.split(';').next().unwrap_or("").trim();
                mime.ends_with("/json") || mime.ends_with("+json")
            })
            .unwrap_or(false)
    }

    /// Decodes the body as JSON. An empty body decodes to an empty object.
    pub fn json(&self) -> serde_json::Result<Value> {
        if self.bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_slice(&self.bytes)
    }

    /// The first `limit` characters of the body, decoded lossily.
    pub fn text_preview(&self, limit: usize) -> String {
        String::from_utf8_lossy(&self.bytes).chars().take(limit).collect()
    }

    /// The mapping returned to callers when the body is not JSON: content type,
    /// size, headers and, for textual bodies, a text preview.
    ///
    /// 当响应体不是 JSON 时返回给调用方的映射：内容类型、大小、响应头，
    /// 以及文本响应体的预览。
    pub fn fallback_body(&self) -> Value {
        let mut body = json!({
            "content_type": self.content_type,
            "size": self.bytes.len(),
            "headers": self.headers,
        });
        if let Ok(text) = std::str::from_utf8(&self.bytes) {
            if !text.contains('\0') {
                body["text"] = Value::String(text.chars().take(TEXT_PREVIEW_CHARS).collect());
            }
        }
        body
    }
}
