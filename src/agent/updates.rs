use crate::error::TurnError;
use crate::llm::{AssistantMessage, ContentBlock};
use crate::utils::text::truncate_chars;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Characters of a tool result shown to the client. History keeps it all.
pub const TOOL_PREVIEW_CHARS: usize = 1000;

// ── Wire shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentChunk {
    Text { text: String },
}

impl ContentChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallContent {
    Content { content: ContentChunk },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Other,
}

/// One client-facing progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum SessionUpdate {
    AgentThoughtChunk {
        content: ContentChunk,
    },
    AgentMessageChunk {
        content: ContentChunk,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        title: String,
        kind: ToolKind,
        status: ToolCallStatus,
        raw_input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolCallUpdate {
        tool_call_id: String,
        status: ToolCallStatus,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<ToolCallContent>,
    },
}

/// `session/update` payload: an update addressed to one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    pub session_id: String,
    pub update: SessionUpdate,
}

// ── Sinks ────────────────────────────────────────────────────────────────────

/// Destination of session updates. A failed send ends the current turn.
pub trait UpdateSink: Send + Sync {
    fn send<'a>(
        &'a self,
        session_id: &'a str,
        update: SessionUpdate,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Forwards updates into an mpsc channel, e.g. the ACP writer queue.
pub struct ChannelUpdateSink<T = SessionNotification> {
    sender: mpsc::Sender<T>,
}

impl<T> ChannelUpdateSink<T> {
    pub fn new(sender: mpsc::Sender<T>) -> Self {
        Self { sender }
    }
}

impl<T> UpdateSink for ChannelUpdateSink<T>
where
    T: From<SessionNotification> + Send + 'static,
{
    fn send<'a>(
        &'a self,
        session_id: &'a str,
        update: SessionUpdate,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let notification = SessionNotification {
                session_id: session_id.to_string(),
                update,
            };
            self.sender
                .send(T::from(notification))
                .await
                .map_err(|_| anyhow::anyhow!("update channel closed"))
        })
    }
}

/// Prints updates as transcript lines for the interactive terminal.
#[derive(Debug, Default)]
pub struct CliUpdateSink;

impl CliUpdateSink {
    fn render(update: &SessionUpdate) -> Option<String> {
        match update {
            SessionUpdate::AgentThoughtChunk { content } => {
                Some(format!("[Thinking]: {}", content.as_text()))
            }
            SessionUpdate::AgentMessageChunk { content } => {
                Some(format!("[Agent]: {}\n", content.as_text()))
            }
            SessionUpdate::ToolCall {
                title, raw_input, ..
            } => Some(format!("[Tool]: {title} {raw_input}")),
            SessionUpdate::ToolCallUpdate {
                status: ToolCallStatus::Completed,
                content,
                ..
            } => {
                let preview = content
                    .first()
                    .map(|ToolCallContent::Content { content }| content.as_text())
                    .unwrap_or_default();
                Some(format!(
                    "[Tool result]: {}",
                    crate::utils::text::truncate_with_ellipsis(preview, 200)
                ))
            }
            SessionUpdate::ToolCallUpdate { .. } => None,
        }
    }
}

impl UpdateSink for CliUpdateSink {
    fn send<'a>(
        &'a self,
        _session_id: &'a str,
        update: SessionUpdate,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(line) = Self::render(&update) {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
            Ok(())
        })
    }
}

// ── Emitter ──────────────────────────────────────────────────────────────────

/// Turns orchestrator events into updates for one session, in call order.
pub struct UpdateEmitter {
    sink: Arc<dyn UpdateSink>,
    session_id: String,
}

impl UpdateEmitter {
    pub fn new(sink: Arc<dyn UpdateSink>, session_id: impl Into<String>) -> Self {
        Self {
            sink,
            session_id: session_id.into(),
        }
    }

    async fn emit(&self, update: SessionUpdate) -> Result<(), TurnError> {
        self.sink
            .send(&self.session_id, update)
            .await
            .map_err(|e| TurnError::Emission(e.to_string()))
    }

    /// Reasoning as thought chunks, text as message chunks, in block order.
    pub async fn content_blocks(&self, message: &AssistantMessage) -> Result<(), TurnError> {
        for block in &message.content {
            let update = match block {
                ContentBlock::Reasoning { text, .. } => SessionUpdate::AgentThoughtChunk {
                    content: ContentChunk::text(text.clone()),
                },
                ContentBlock::Text { text } => SessionUpdate::AgentMessageChunk {
                    content: ContentChunk::text(text.clone()),
                },
            };
            self.emit(update).await?;
        }
        Ok(())
    }

    /// Announce a tool call. Returns the client-facing id for later updates.
    pub async fn tool_call_started(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<String, TurnError> {
        let tool_call_id = new_client_tool_call_id();
        self.emit(SessionUpdate::ToolCall {
            tool_call_id: tool_call_id.clone(),
            title: format!("Calling {tool_name}"),
            kind: ToolKind::Other,
            status: ToolCallStatus::Pending,
            raw_input: Value::Object(arguments.clone()),
        })
        .await?;
        Ok(tool_call_id)
    }

    pub async fn tool_call_in_progress(&self, tool_call_id: &str) -> Result<(), TurnError> {
        self.emit(SessionUpdate::ToolCallUpdate {
            tool_call_id: tool_call_id.to_string(),
            status: ToolCallStatus::InProgress,
            content: Vec::new(),
        })
        .await
    }

    pub async fn tool_call_completed(
        &self,
        tool_call_id: &str,
        result: &str,
    ) -> Result<(), TurnError> {
        self.emit(SessionUpdate::ToolCallUpdate {
            tool_call_id: tool_call_id.to_string(),
            status: ToolCallStatus::Completed,
            content: vec![ToolCallContent::Content {
                content: ContentChunk::text(truncate_chars(result, TOOL_PREVIEW_CHARS)),
            }],
        })
        .await
    }
}

fn new_client_tool_call_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("tool_{}", &hex[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel_emitter() -> (UpdateEmitter, mpsc::Receiver<SessionNotification>) {
        let (tx, rx) = mpsc::channel(16);
        let sink: Arc<dyn UpdateSink> = Arc::new(ChannelUpdateSink::new(tx));
        (UpdateEmitter::new(sink, "sess_1"), rx)
    }

    #[test]
    fn tool_call_serializes_with_acp_field_names() {
        let update = SessionUpdate::ToolCall {
            tool_call_id: "tool_1".into(),
            title: "Calling grep_search".into(),
            kind: ToolKind::Other,
            status: ToolCallStatus::Pending,
            raw_input: json!({"pattern": "x"}),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "sessionUpdate": "tool_call",
                "toolCallId": "tool_1",
                "title": "Calling grep_search",
                "kind": "other",
                "status": "pending",
                "rawInput": {"pattern": "x"}
            })
        );
    }

    #[test]
    fn in_progress_update_omits_content() {
        let update = SessionUpdate::ToolCallUpdate {
            tool_call_id: "tool_1".into(),
            status: ToolCallStatus::InProgress,
            content: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"sessionUpdate": "tool_call_update", "toolCallId": "tool_1", "status": "in_progress"})
        );
    }

    #[test]
    fn notification_uses_camel_case_session_id() {
        let notification = SessionNotification {
            session_id: "sess_1".into(),
            update: SessionUpdate::AgentMessageChunk {
                content: ContentChunk::text("hi"),
            },
        };
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            json!({
                "sessionId": "sess_1",
                "update": {
                    "sessionUpdate": "agent_message_chunk",
                    "content": {"type": "text", "text": "hi"}
                }
            })
        );
    }

    #[tokio::test]
    async fn content_blocks_keep_order_and_kind() {
        let (emitter, mut rx) = channel_emitter();
        let message = AssistantMessage {
            content: vec![ContentBlock::reasoning("hmm"), ContentBlock::text("done")],
            ..AssistantMessage::default()
        };
        emitter.content_blocks(&message).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.session_id, "sess_1");
        assert!(matches!(first.update, SessionUpdate::AgentThoughtChunk { .. }));
        assert!(matches!(second.update, SessionUpdate::AgentMessageChunk { .. }));
    }

    #[tokio::test]
    async fn tool_ids_are_client_facing() {
        let (emitter, mut rx) = channel_emitter();
        let id = emitter
            .tool_call_started("run_command", &Map::new())
            .await
            .unwrap();
        assert!(id.starts_with("tool_"));
        assert_eq!(id.len(), "tool_".len() + 16);
        let SessionUpdate::ToolCall { tool_call_id, title, .. } = rx.recv().await.unwrap().update
        else {
            panic!("expected tool_call");
        };
        assert_eq!(tool_call_id, id);
        assert_eq!(title, "Calling run_command");
    }

    #[tokio::test]
    async fn completed_preview_is_truncated() {
        let (emitter, mut rx) = channel_emitter();
        emitter
            .tool_call_completed("tool_1", &"y".repeat(TOOL_PREVIEW_CHARS + 500))
            .await
            .unwrap();
        let SessionUpdate::ToolCallUpdate { content, status, .. } = rx.recv().await.unwrap().update
        else {
            panic!("expected tool_call_update");
        };
        assert_eq!(status, ToolCallStatus::Completed);
        let ToolCallContent::Content { content } = &content[0];
        assert_eq!(content.as_text().len(), TOOL_PREVIEW_CHARS);
    }

    #[tokio::test]
    async fn closed_channel_is_an_emission_error() {
        let (emitter, rx) = channel_emitter();
        drop(rx);
        let err = emitter.tool_call_in_progress("tool_1").await.unwrap_err();
        assert!(matches!(err, TurnError::Emission(_)));
    }

    #[test]
    fn cli_rendering() {
        let thought = SessionUpdate::AgentThoughtChunk {
            content: ContentChunk::text("hmm"),
        };
        assert_eq!(CliUpdateSink::render(&thought).as_deref(), Some("[Thinking]: hmm"));
        let progress = SessionUpdate::ToolCallUpdate {
            tool_call_id: "tool_1".into(),
            status: ToolCallStatus::InProgress,
            content: Vec::new(),
        };
        assert!(CliUpdateSink::render(&progress).is_none());
    }
}
