#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use codebuddy::agent::{AgentContext, SessionUpdate, UpdateSink};
use codebuddy::llm::{AssistantMessage, ContextTier, Message, Provider, ToolCallRequest};
use codebuddy::session::CancelFlag;
use codebuddy::tools::{Tool, ToolContext, ToolRegistry, ToolSpec};
use serde_json::{Value, json};

/// One scripted model round.
pub enum Step {
    Reply(AssistantMessage),
    Fail(String),
    /// Reply, but raise `flag` first, as if the user cancelled while the
    /// model call was in flight.
    ReplyAndCancel(AssistantMessage, CancelFlag),
}

/// Provider that plays back canned steps and records every history it saw.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<Message>>>,
    tier: ContextTier,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
            tier: ContextTier::Standard,
        }
    }

    /// Queue another step, e.g. one that needs a session's cancel flag.
    pub fn push(&self, step: Step) {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }

    pub fn with_tier(mut self, tier: ContextTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn context_tier(&self) -> ContextTier {
        self.tier
    }

    fn invoke<'a>(
        &'a self,
        messages: &'a [Message],
        _tools: &'a [ToolSpec],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<AssistantMessage>> + Send + 'a>> {
        Box::pin(async move {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(messages.to_vec());
            let step = self
                .steps
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match step {
                Some(Step::Reply(message)) => Ok(message),
                Some(Step::Fail(reason)) => Err(anyhow::anyhow!(reason)),
                Some(Step::ReplyAndCancel(message, flag)) => {
                    flag.cancel();
                    Ok(message)
                }
                None => anyhow::bail!("script exhausted"),
            }
        })
    }
}

/// Sink that keeps every update in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<SessionUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<SessionUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UpdateSink for RecordingSink {
    fn send<'a>(
        &'a self,
        _session_id: &'a str,
        update: SessionUpdate,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.updates
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(update);
            Ok(())
        })
    }
}

/// Sink whose client went away.
pub struct ClosedSink;

impl UpdateSink for ClosedSink {
    fn send<'a>(
        &'a self,
        _session_id: &'a str,
        _update: SessionUpdate,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async { anyhow::bail!("client disconnected") })
    }
}

/// Tool with a fixed outcome.
pub struct StubTool {
    name: &'static str,
    outcome: Result<&'static str, &'static str>,
    on_call: Option<Arc<OnceLock<CancelFlag>>>,
}

impl StubTool {
    pub fn ok(name: &'static str, output: &'static str) -> Self {
        Self {
            name,
            outcome: Ok(output),
            on_call: None,
        }
    }

    pub fn failing(name: &'static str, error: &'static str) -> Self {
        Self {
            name,
            outcome: Err(error),
            on_call: None,
        }
    }

    /// Raise `flag` while executing, once it has been bound to a session.
    pub fn cancelling(mut self, flag: Arc<OnceLock<CancelFlag>>) -> Self {
        self.on_call = Some(flag);
        self
    }
}

impl Tool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute<'a>(
        &'a self,
        _args: Value,
        _ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(flag) = self.on_call.as_ref().and_then(|f| f.get()) {
                flag.cancel();
            }
            match self.outcome {
                Ok(output) => Ok(output.to_string()),
                Err(error) => Err(anyhow::anyhow!(error)),
            }
        })
    }
}

pub fn registry(tools: Vec<Box<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

pub fn context(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> Arc<AgentContext> {
    Arc::new(AgentContext::new(provider, tools))
}

pub fn text_reply(text: &str) -> AssistantMessage {
    AssistantMessage::text_only(text)
}

pub fn tool_reply(calls: &[(&str, &str)]) -> AssistantMessage {
    AssistantMessage::default().with_tool_calls(
        calls
            .iter()
            .map(|(id, name)| ToolCallRequest::new(*id, *name, json!({})))
            .collect(),
    )
}
