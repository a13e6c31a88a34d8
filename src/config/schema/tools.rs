use serde::{Deserialize, Serialize};

fn default_command_timeout_secs() -> u64 {
    60
}

fn default_max_output_bytes() -> usize {
    1_048_576
}

fn default_grep_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default timeout for foreground `run_command` calls.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Cap on captured stdout/stderr per command.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default = "default_grep_timeout_secs")]
    pub grep_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            grep_timeout_secs: default_grep_timeout_secs(),
        }
    }
}
