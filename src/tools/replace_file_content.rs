use super::common::{optional_bool, path_property, required_str};
use super::traits::{Tool, ToolContext};
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;

/// Exact-match replacement inside a 1-indexed, inclusive line window.
pub struct ReplaceFileContentTool;

impl ReplaceFileContentTool {
    pub const fn new() -> Self {
        Self
    }
}

fn required_line(args: &Value, key: &str) -> anyhow::Result<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow::anyhow!("Missing '{key}' parameter"))
}

/// Apply the replacement to `content`. `Err` carries the message for the model.
fn replace_in_window(
    content: &str,
    start_line: i64,
    end_line: i64,
    target: &str,
    replacement: &str,
    allow_multiple: bool,
) -> Result<(String, usize), String> {
    if start_line < 1 {
        return Err(format!("Error: start_line must be >= 1, got {start_line}"));
    }
    if end_line < start_line {
        return Err(format!(
            "Error: end_line ({end_line}) must be >= start_line ({start_line})"
        ));
    }
    if target.is_empty() {
        return Err("Error: target_content must not be empty".to_string());
    }

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total = lines.len();
    let (Ok(start), Ok(end)) = (usize::try_from(start_line), usize::try_from(end_line)) else {
        return Err(format!("Error: line range {start_line}-{end_line} is invalid"));
    };
    if start > total {
        return Err(format!(
            "Error: start_line ({start}) exceeds file length ({total} lines)"
        ));
    }
    if end > total {
        return Err(format!(
            "Error: end_line ({end}) exceeds file length ({total} lines)"
        ));
    }

    let region: String = lines[start - 1..end].concat();
    let occurrences = region.matches(target).count();
    if occurrences == 0 {
        return Err(format!(
            "Error: Target content not found in lines {start}-{end}"
        ));
    }
    if occurrences > 1 && !allow_multiple {
        return Err(format!(
            "Error: Found {occurrences} occurrences of target content. \
             Set allow_multiple=True to replace all, or narrow the search range."
        ));
    }

    let mut updated = lines[..start - 1].concat();
    updated.push_str(&region.replace(target, replacement));
    updated.push_str(&lines[end..].concat());
    Ok((updated, occurrences))
}

impl Tool for ReplaceFileContentTool {
    fn name(&self) -> &str {
        "replace_file_content"
    }

    fn description(&self) -> &str {
        "Replace one contiguous block of text in a file. The target must match exactly, \
         including whitespace, within the given line range"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "target_file": path_property("Relative path to the file to edit"),
                "start_line": {
                    "type": "integer",
                    "description": "First line (1-indexed) of the search window"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line (1-indexed, inclusive) of the search window"
                },
                "target_content": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "replacement_content": {
                    "type": "string",
                    "description": "New content to replace the target with"
                },
                "allow_multiple": {
                    "type": "boolean",
                    "description": "Replace every occurrence instead of failing on several",
                    "default": false
                }
            },
            "required": ["target_file", "start_line", "end_line", "target_content", "replacement_content"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let target_file = required_str(&args, "target_file")?;
            let start_line = required_line(&args, "start_line")?;
            let end_line = required_line(&args, "end_line")?;
            let target = required_str(&args, "target_content")?;
            let replacement = required_str(&args, "replacement_content")?;
            let allow_multiple = optional_bool(&args, "allow_multiple", false);

            let path = ctx.resolve(target_file);
            match tokio::fs::metadata(&path).await {
                Ok(meta) if !meta.is_file() => {
                    return Ok(format!("Error: '{target_file}' is not a file"));
                }
                Ok(_) => {}
                Err(_) => return Ok(format!("Error: File '{target_file}' does not exist")),
            }

            let content = tokio::fs::read_to_string(&path).await?;
            match replace_in_window(
                &content,
                start_line,
                end_line,
                target,
                replacement,
                allow_multiple,
            ) {
                Ok((updated, occurrences)) => {
                    tokio::fs::write(&path, updated).await?;
                    let replaced = if allow_multiple { occurrences } else { 1 };
                    Ok(format!(
                        "Successfully replaced {replaced} occurrence(s) in '{target_file}'"
                    ))
                }
                Err(message) => Ok(message),
            }
        })
    }
}
