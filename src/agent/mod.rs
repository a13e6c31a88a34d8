pub mod context;
pub mod input;
pub mod service;
pub mod turn;
pub mod updates;

pub use context::AgentContext;
pub use input::{FileResourceReader, PromptBlock, ResourceReader, normalize_prompt};
pub use service::Agent;
pub use turn::{StopReason, TurnOrchestrator, TurnOutcome, TurnState};
pub use updates::{
    ChannelUpdateSink, CliUpdateSink, ContentChunk, SessionNotification, SessionUpdate,
    TOOL_PREVIEW_CHARS, ToolCallContent, ToolCallStatus, ToolKind, UpdateEmitter, UpdateSink,
};
