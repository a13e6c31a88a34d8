use super::common::{optional_bool, path_property, required_str};
use super::traits::{Tool, ToolContext};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use tokio::io::AsyncWriteExt;

/// Write or append text to a file, creating parent directories.
pub struct FileWriteTool;

impl FileWriteTool {
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, replacing it unless append is set"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": path_property("Path of the file to write"),
                "text": {
                    "type": "string",
                    "description": "Text to write to the file"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwriting",
                    "default": false
                }
            },
            "required": ["file_path", "text"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let path = required_str(&args, "file_path")?;
            let text = required_str(&args, "text")?;
            let append = optional_bool(&args, "append", false);

            let full_path = ctx.resolve(path);
            if let Some(parent) = full_path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(&full_path)
                .await?;
            file.write_all(text.as_bytes()).await?;
            file.flush().await?;

            Ok(format!("File written successfully to {path}."))
        })
    }
}
