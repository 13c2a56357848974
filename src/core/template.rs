//! # Template Module / 模板模块
//!
//! Steps capture values from responses (`save = { note_id = "/id" }`) and
//! later steps refer to them as `${note_id}` in paths, form fields and JSON
//! bodies. Dotted keys reach into saved objects (`${note.owner.id}`).
//! Unknown variables are left as written.
//!
//! 步骤从响应中捕获值（`save = { note_id = "/id" }`），后续步骤在路径、表单字段和
//! JSON 请求体中以 `${note_id}` 引用它们。点号键可访问已保存对象的内部
//! （`${note.owner.id}`）。未知变量保持原样。

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;

static VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.]+)\}").expect("variable pattern is valid"));

/// Variables visible to the steps of one scenario.
/// 单个场景的步骤可见的变量。
#[derive(Debug, Clone, Default)]
pub struct Vars {
    values: BTreeMap<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Looks up `key`, following dots into saved objects and arrays.
    /// Falls back to the built-ins `uuid`, `timestamp`, `date` and `time`.
    pub fn resolve(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value.clone());
        }
        if let Some((head, rest)) = key.split_once('.') {
            if let Some(root) = self.values.get(head) {
                let pointer = format!("/{}", rest.replace('.', "/"));
                return root.pointer(&pointer).cloned();
            }
        }
        match key {
            "uuid" => Some(Value::String(uuid::Uuid::new_v4().to_string())),
            "timestamp" => Some(Value::String(Utc::now().timestamp().to_string())),
            "date" => Some(Value::String(Local::now().format("%Y-%m-%d").to_string())),
            "time" => Some(Value::String(Local::now().format("%H:%M:%S").to_string())),
            _ => None,
        }
    }

    /// Substitutes every `${var}` in `text`. Strings are inserted bare,
    /// other values as compact JSON.
    pub fn render_str(&self, text: &str) -> String {
        VAR_PATTERN
            .replace_all(text, |caps: &Captures| match self.resolve(&caps[1]) {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Renders every string inside a JSON value. A string that is exactly one
    /// `${var}` is replaced by the variable's value with its JSON type intact,
    /// so `"${note_ids}"` can become an array.
    ///
    /// 渲染 JSON 值中的每个字符串。恰好为单个 `${var}` 的字符串会被替换为
    /// 变量值并保留其 JSON 类型，因此 `"${note_ids}"` 可以变成数组。
    pub fn render_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                if let Some(caps) = VAR_PATTERN.captures(s) {
                    if caps[0].len() == s.len() {
                        if let Some(resolved) = self.resolve(&caps[1]) {
                            return resolved;
                        }
                    }
                }
                Value::String(self.render_str(s))
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.render_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.render_str(k), self.render_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Names of `${var}` references in `text` that cannot be resolved.
    pub fn unresolved(&self, text: &str) -> Vec<String> {
        VAR_PATTERN
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .filter(|key| self.resolve(key).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Vars {
        let mut vars = Vars::new();
        vars.set("note_id", json!("n-42"));
        vars.set("count", json!(3));
        vars.set("ids", json!(["a", "b"]));
        vars.set("note", json!({"owner": {"id": 7}, "tags": ["x", "y"]}));
        vars
    }

    #[test]
    fn renders_paths_and_leaves_unknowns() {
        let vars = vars();
        assert_eq!(vars.render_str("notes/${note_id}/chat"), "notes/n-42/chat");
        assert_eq!(vars.render_str("limit=${count}"), "limit=3");
        assert_eq!(vars.render_str("notes/${missing}"), "notes/${missing}");
        assert_eq!(vars.unresolved("a/${missing}/${note_id}"), vec!["missing"]);
    }

    #[test]
    fn dotted_keys_walk_objects_and_arrays() {
        let vars = vars();
        assert_eq!(vars.render_str("${note.owner.id}"), "7");
        assert_eq!(vars.render_str("${note.tags.1}"), "y");
    }

    #[test]
    fn whole_string_variables_keep_json_type() {
        let vars = vars();
        let body = json!({
            "note_ids": "${ids}",
            "title": "Report for ${note_id}",
            "limit": "${count}",
            "nested": [{"id": "${note_id}"}],
        });
        assert_eq!(
            vars.render_value(&body),
            json!({
                "note_ids": ["a", "b"],
                "title": "Report for n-42",
                "limit": 3,
                "nested": [{"id": "n-42"}],
            })
        );
    }

    #[test]
    fn builtins_resolve() {
        let vars = Vars::new();
        assert!(vars.resolve("uuid").is_some());
        assert!(vars.render_str("${date}").len() == 10);
    }
}
