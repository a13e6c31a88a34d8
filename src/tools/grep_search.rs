use super::common::{optional_bool, optional_str, path_property, required_str};
use super::traits::{Tool, ToolContext};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Recursive regex search via `grep -rn`.
pub struct GrepSearchTool {
    timeout: Duration,
}

impl GrepSearchTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "Search files for a regex pattern. Returns matching lines with file names and line numbers"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The regex pattern to search for"
                },
                "path": path_property("File or directory to search, relative to the project root"),
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Ignore case when matching",
                    "default": false
                }
            },
            "required": ["pattern"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let pattern = required_str(&args, "pattern")?;
            let path = optional_str(&args, "path", ".");
            let case_insensitive = optional_bool(&args, "case_insensitive", false);

            let search_path = ctx.resolve(path);
            if !search_path.exists() {
                return Ok(format!("Error: Path '{path}' does not exist"));
            }

            let mut cmd = tokio::process::Command::new("grep");
            cmd.arg("-rn");
            if case_insensitive {
                cmd.arg("-i");
            }
            cmd.arg("--").arg(pattern).arg(&search_path).kill_on_drop(true);

            let Ok(result) = tokio::time::timeout(self.timeout, cmd.output()).await else {
                return Ok("Error: Search timed out".to_string());
            };
            let output = result?;

            match output.status.code() {
                Some(0) if !output.stdout.is_empty() => {
                    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
                }
                Some(0 | 1) => Ok("No matches found".to_string()),
                _ => Ok(format!(
                    "Error: {}",
                    String::from_utf8_lossy(&output.stderr)
                )),
            }
        })
    }
}
