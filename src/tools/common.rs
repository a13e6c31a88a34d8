use crate::utils::text::truncate_with_ellipsis;
use serde_json::{Map, Value, json};

/// Longest string argument value written to the log.
const LOG_ARG_MAX_CHARS: usize = 100;

pub(crate) fn path_property(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description
    })
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing '{key}' parameter"))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or(default)
}

pub(crate) fn optional_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn optional_u64(args: &Value, key: &str, default: u64) -> u64 {
    args.get(key).and_then(Value::as_u64).unwrap_or(default)
}

/// Copy of tool arguments with long strings cut for logging.
pub fn truncate_args_for_log(args: &Map<String, Value>) -> Value {
    Value::Object(
        args.iter()
            .map(|(key, value)| (key.clone(), truncate_value(value)))
            .collect(),
    )
}

fn truncate_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_with_ellipsis(s, LOG_ARG_MAX_CHARS)),
        Value::Array(items) => Value::Array(items.iter().map(truncate_value).collect()),
        Value::Object(map) => truncate_args_for_log(map),
        other => other.clone(),
    }
}

/// Cap captured process output at `max_bytes`, on a char boundary.
pub(crate) fn cap_output(mut text: String, max_bytes: usize, label: &str) -> String {
    if text.len() > max_bytes {
        text.truncate(text.floor_char_boundary(max_bytes));
        text.push_str(&format!("\n... [{label} truncated at {max_bytes} bytes]"));
    }
    text
}
