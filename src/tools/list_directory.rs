use super::common::{optional_str, path_property};
use super::traits::{Tool, ToolContext};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;

/// List entries of a directory, directories marked with a trailing `/`.
pub struct ListDirectoryTool;

impl ListDirectoryTool {
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories in a folder"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "dir_path": path_property("Directory to list, relative to the project root")
            }
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let dir_path = optional_str(&args, "dir_path", ".");
            let full_path = ctx.resolve(dir_path);

            let mut reader = match tokio::fs::read_dir(&full_path).await {
                Ok(reader) => reader,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Ok(format!("Error: no such file or directory: {dir_path}"));
                }
                Err(e) => return Err(e.into()),
            };

            let mut entries = Vec::new();
            while let Some(entry) = reader.next_entry().await? {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                    name.push('/');
                }
                entries.push(name);
            }
            entries.sort();

            if entries.is_empty() {
                Ok(format!("No files found in directory {dir_path}"))
            } else {
                Ok(entries.join("\n"))
            }
        })
    }
}
