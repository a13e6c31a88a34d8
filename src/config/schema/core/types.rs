use super::super::ToolsConfig;
use crate::error::ConfigError;
use crate::session::CompactionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../../../prompt/system_prompt.md");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-5",
            Self::Gemini => "gemini-2.5-pro",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => f.write_str("anthropic"),
            Self::Gemini => f.write_str("gemini"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(ConfigError::Validation(format!(
                "unsupported AI provider: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub provider: ProviderKind,
    /// Model id; falls back to the provider's default when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Extended-thinking budget; 0 disables reasoning output.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub system_prompt_path: Option<PathBuf>,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_max_output_tokens() -> u32 {
    16_000
}

fn default_thinking_budget() -> u32 {
    5_000
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            provider: ProviderKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            max_output_tokens: default_max_output_tokens(),
            thinking_budget: default_thinking_budget(),
            log_level: default_log_level(),
            system_prompt_path: None,
            compaction: CompactionConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    pub fn resolved_model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Reject settings that would break a running turn.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.compaction.validate()?;
        if self.thinking_budget > 0 && self.thinking_budget >= self.max_output_tokens {
            return Err(ConfigError::Validation(format!(
                "thinking_budget ({}) must be below max_output_tokens ({})",
                self.thinking_budget, self.max_output_tokens
            )));
        }
        Ok(())
    }

    /// Prompt installed as the first message of every new session.
    pub fn system_prompt(&self) -> Result<String> {
        match &self.system_prompt_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read system prompt {}", path.display())),
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}
