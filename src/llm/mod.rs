// ── Message model + contracts ───────────────────────────────────────────────
pub mod traits;
pub mod types;

// ── Provider implementations ────────────────────────────────────────────────
pub mod anthropic;
pub mod factory;
pub mod gemini;

pub use traits::{ContextTier, Provider, orphaned_tool_result, split_system};
pub use types::{AssistantMessage, ContentBlock, Message, MessageRole, ToolCallRequest, Usage};

pub use anthropic::AnthropicProvider;
pub use factory::create_provider;
pub use gemini::GeminiProvider;
