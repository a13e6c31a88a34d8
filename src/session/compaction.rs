use crate::error::ConfigError;
use crate::llm::{Message, Provider};
use serde::{Deserialize, Serialize};

/// Smallest `keep_trailing` accepted at configuration load.
///
/// This is a floor on how much recent context survives, not a pairing
/// guarantee: the split is by message count, so the kept tail can still open
/// with tool results whose call was summarized. Providers render such results
/// as plain text.
pub const MIN_KEEP_TRAILING: usize = 4;

const COMPACTION_PROMPT: &str = include_str!("../prompt/compaction_prompt.md");

/// When and how much history to compact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Fraction of the provider's context window that triggers compaction.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Trailing messages always kept verbatim.
    #[serde(default = "default_keep_trailing")]
    pub keep_trailing: usize,
}

fn default_threshold() -> f64 {
    0.8
}

fn default_keep_trailing() -> usize {
    10
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            keep_trailing: default_keep_trailing(),
        }
    }
}

impl CompactionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep_trailing < MIN_KEEP_TRAILING {
            return Err(ConfigError::CompactionInvariant {
                keep_trailing: self.keep_trailing,
                minimum: MIN_KEEP_TRAILING,
            });
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "compaction threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Absolute token limit for a provider window.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn token_limit(&self, max_context_tokens: u64) -> u64 {
        (max_context_tokens as f64 * self.threshold) as u64
    }
}

/// Summarize older history once the reported input tokens cross the limit.
///
/// Returns `history` unchanged when compaction does not apply. Never fails:
/// a failed summarization is replaced by a placeholder.
pub async fn compact(
    provider: &dyn Provider,
    history: Vec<Message>,
    current_input_tokens: u64,
    config: &CompactionConfig,
) -> Vec<Message> {
    let keep = config.keep_trailing;
    if history.len() <= keep + 1 {
        return history;
    }

    let limit = config.token_limit(provider.max_context_tokens());
    if current_input_tokens < limit {
        return history;
    }

    let mut rest = history;
    let system = if rest.first().is_some_and(Message::is_system) {
        Some(rest.remove(0))
    } else {
        None
    };
    if rest.len() <= keep {
        let mut unchanged = Vec::with_capacity(rest.len() + 1);
        unchanged.extend(system);
        unchanged.append(&mut rest);
        return unchanged;
    }

    let keep_verbatim = rest.split_off(rest.len() - keep);
    let to_summarize = rest;

    tracing::info!(
        input_tokens = current_input_tokens,
        limit,
        summarized = to_summarize.len(),
        kept = keep_verbatim.len(),
        "compacting conversation history"
    );

    let summary = summarize(provider, &to_summarize).await;

    let mut compacted = Vec::with_capacity(keep_verbatim.len() + 2);
    compacted.extend(system);
    compacted.push(Message::system(format!(
        "[CONVERSATION SUMMARY - Previous {} messages]\n\n{summary}",
        to_summarize.len()
    )));
    compacted.extend(keep_verbatim);
    compacted
}

/// One out-of-band model call producing a digest of `messages`.
pub async fn summarize(provider: &dyn Provider, messages: &[Message]) -> String {
    let prompt = COMPACTION_PROMPT.replace("{conversation_text}", &render_transcript(messages));

    match provider.invoke(&[Message::user(prompt)], &[]).await {
        Ok(response) => {
            let text = response.text();
            if text.trim().is_empty() {
                tracing::warn!("summarization returned no text; using placeholder");
                placeholder(messages.len(), "empty summary")
            } else {
                text
            }
        }
        Err(e) => {
            tracing::warn!("summarization failed: {e}");
            placeholder(messages.len(), &e.to_string())
        }
    }
}

fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| format!("[{}]: {}", message.role().label(), message.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn placeholder(count: usize, reason: &str) -> String {
    format!("[Previous conversation with {count} messages - summarization failed: {reason}]")
}
