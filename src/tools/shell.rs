use super::common::{cap_output, optional_bool, optional_str, optional_u64, required_str};
use super::process::{ProcessError, ProcessTable};
use super::traits::{Tool, ToolContext};
use crate::config::ToolsConfig;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Shell command execution, foreground or background.
pub struct RunCommandTool {
    processes: Arc<ProcessTable>,
    config: ToolsConfig,
}

impl RunCommandTool {
    pub fn new(processes: Arc<ProcessTable>, config: ToolsConfig) -> Self {
        Self { processes, config }
    }

    async fn run_foreground(&self, command: &str, cwd: &std::path::Path, timeout: u64) -> String {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(cwd).kill_on_drop(true);

        let result = tokio::time::timeout(Duration::from_secs(timeout), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let max = self.config.max_output_bytes;
                let mut text = cap_output(
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    max,
                    "output",
                );
                let stderr = cap_output(
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                    max,
                    "stderr",
                );
                if !stderr.is_empty() {
                    text.push_str("\n[stderr]: ");
                    text.push_str(&stderr);
                }
                if !output.status.success() {
                    match output.status.code() {
                        Some(code) => text.push_str(&format!("\n[exit code]: {code}")),
                        None => text.push_str("\n[exit code]: killed by signal"),
                    }
                }
                if text.is_empty() {
                    "(no output)".to_string()
                } else {
                    text
                }
            }
            Ok(Err(e)) => format!("Error: {e}"),
            Err(_) => format!("Error: Command timed out after {timeout} seconds"),
        }
    }
}

impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command. Returns its output, or a process id when run in the background"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Working directory relative to the project root",
                    "default": "."
                },
                "background": {
                    "type": "boolean",
                    "description": "Run in the background and return a process id",
                    "default": false
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds for foreground commands"
                }
            },
            "required": ["command"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let command = required_str(&args, "command")?;
            let working_dir = optional_str(&args, "working_dir", ".");
            let background = optional_bool(&args, "background", false);
            let timeout = optional_u64(&args, "timeout", self.config.command_timeout_secs);

            let cwd = ctx.resolve(working_dir);
            if !cwd.is_dir() {
                return Ok(format!("Error: Directory '{working_dir}' does not exist"));
            }

            if background {
                let id = self.processes.spawn(command, &cwd)?;
                return Ok(format!("Started background process: {id}"));
            }

            Ok(self.run_foreground(command, &cwd, timeout).await)
        })
    }
}

/// Poll a background process for status and new output.
pub struct ReadCommandOutputTool {
    processes: Arc<ProcessTable>,
}

impl ReadCommandOutputTool {
    pub fn new(processes: Arc<ProcessTable>) -> Self {
        Self { processes }
    }
}

impl Tool for ReadCommandOutputTool {
    fn name(&self) -> &str {
        "read_command_output"
    }

    fn description(&self) -> &str {
        "Read accumulated output from a background command started by run_command"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "process_id": {
                    "type": "string",
                    "description": "The process id returned by run_command"
                },
                "clear": {
                    "type": "boolean",
                    "description": "Clear the output buffer after reading",
                    "default": true
                }
            },
            "required": ["process_id"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        _ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let process_id = required_str(&args, "process_id")?;
            let clear = optional_bool(&args, "clear", true);

            match self.processes.read_output(process_id, clear).await {
                Ok((status, output)) if output.is_empty() => {
                    Ok(format!("[status: {status}]\n(no new output)"))
                }
                Ok((status, output)) => Ok(format!("[status: {status}]\n{output}")),
                Err(ProcessError::NotFound(id)) => Ok(format!("Error: Process '{id}' not found")),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Write to or terminate a background process.
pub struct SendCommandInputTool {
    processes: Arc<ProcessTable>,
}

impl SendCommandInputTool {
    pub fn new(processes: Arc<ProcessTable>) -> Self {
        Self { processes }
    }
}

impl Tool for SendCommandInputTool {
    fn name(&self) -> &str {
        "send_command_input"
    }

    fn description(&self) -> &str {
        "Send text to the stdin of a background command, or terminate it"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "process_id": {
                    "type": "string",
                    "description": "The process id returned by run_command"
                },
                "input_text": {
                    "type": "string",
                    "description": "Text to send to the process stdin"
                },
                "terminate": {
                    "type": "boolean",
                    "description": "Terminate the process instead of sending input",
                    "default": false
                }
            },
            "required": ["process_id"]
        })
    }

    fn execute<'a>(
        &'a self,
        args: serde_json::Value,
        _ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let process_id = required_str(&args, "process_id")?;

            if optional_bool(&args, "terminate", false) {
                return match self.processes.terminate(process_id).await {
                    Ok(()) => Ok(format!("Process '{process_id}' terminated")),
                    Err(e) => Ok(format!("Error: {e}")),
                };
            }

            let input = optional_str(&args, "input_text", "");
            match self.processes.send_input(process_id, input).await {
                Ok(()) => Ok(format!("Sent input to '{process_id}'")),
                Err(e) => Ok(format!("Error sending input: {e}")),
            }
        })
    }
}
