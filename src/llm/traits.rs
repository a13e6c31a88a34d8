use super::types::{AssistantMessage, Message};
use crate::tools::ToolSpec;
use std::future::Future;
use std::pin::Pin;

/// Context-window class of the active model.
///
/// Only the two tiers the supported providers actually have are modeled.
/// A provider with a different window needs a new variant here, not a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextTier {
    /// ~200K-token window (Anthropic).
    Standard,
    /// ~1M-token window (Gemini).
    Extended,
}

impl ContextTier {
    pub const fn max_tokens(self) -> u64 {
        match self {
            Self::Standard => 200_000,
            Self::Extended => 1_000_000,
        }
    }
}

pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "anthropic", "gemini").
    fn name(&self) -> &str;

    /// Context window the active model is known to accept.
    fn context_tier(&self) -> ContextTier;

    /// One model round-trip over the full ordered history.
    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<AssistantMessage>> + Send + 'a>>;

    fn max_context_tokens(&self) -> u64 {
        self.context_tier().max_tokens()
    }
}

/// Split leading and interleaved `System` messages from the rest.
///
/// Both provider wire formats carry system instructions out of band, so every
/// system message (the prompt and any compaction digest) is joined in order.
pub fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let mut system_parts = Vec::new();
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::System { content } => system_parts.push(content.as_str()),
            other => rest.push(other),
        }
    }
    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, rest)
}

/// User-text rendering of a tool result whose originating call is no longer
/// in the history, typically because compaction summarized it away.
pub fn orphaned_tool_result(tool_call_id: &str, content: &str) -> String {
    format!("[Result of earlier tool call {tool_call_id}]\n{content}")
}
