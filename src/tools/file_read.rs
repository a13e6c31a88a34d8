use super::common::{path_property, required_str};
use super::traits::{Tool, ToolContext};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;

/// Read a text file.
pub struct FileReadTool;

impl FileReadTool {
    pub const fn new() -> Self {
        Self
    }
}

impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file's contents"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": path_property("Path of the file to read")
            },
            "required": ["file_path"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let path = required_str(&args, "file_path")?;
            let full_path = ctx.resolve(path);
            match tokio::fs::read(&full_path).await {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Ok(format!("Error: no such file or directory: {path}"))
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}
