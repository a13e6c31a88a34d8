use super::context::AgentContext;
use super::input::{PromptBlock, normalize_prompt};
use super::updates::UpdateEmitter;
use crate::error::TurnError;
use crate::llm::{Message, ToolCallRequest};
use crate::session::{Session, compact};
use crate::tools::ToolContext;
use std::fmt;
use std::sync::Arc;

/// Tool result recorded for calls that were never run.
const CANCELLED_TOOL_RESULT: &str = "Error: Tool call cancelled before execution";
const ABORTED_TOOL_RESULT: &str = "Error: Tool call not executed because the turn was aborted";

// ── Public types ─────────────────────────────────────────────────────────────

/// Where a turn currently is. `Cancelled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingModel,
    Dispatching,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Cancelled,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one finished turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub stop_reason: StopReason,
    /// Model invocations made during the turn.
    pub model_calls: u32,
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Drives one user turn: model calls, tool dispatch, compaction, updates.
pub struct TurnOrchestrator {
    context: Arc<AgentContext>,
}

struct TurnRun<'a> {
    context: &'a AgentContext,
    session: &'a Session,
    emitter: &'a UpdateEmitter,
    state: TurnState,
    model_calls: u32,
}

impl TurnOrchestrator {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.context
    }

    /// Run one turn to completion or cancellation.
    ///
    /// Holds the session's history lock throughout, so turns on the same
    /// session are serialized. Model failures propagate; the history keeps
    /// everything appended before the failure.
    pub async fn run_turn(
        &self,
        session: &Session,
        input: &[PromptBlock],
        emitter: &UpdateEmitter,
    ) -> Result<TurnOutcome, TurnError> {
        let mut history = session.lock_history().await;
        session.cancel_flag().clear();

        let user_text = normalize_prompt(input, self.context.resources()).await;
        history.push(Message::user(user_text));

        let mut run = TurnRun {
            context: &self.context,
            session,
            emitter,
            state: TurnState::Idle,
            model_calls: 0,
        };
        let stop_reason = run.drive(&mut history).await?;
        Ok(TurnOutcome {
            stop_reason,
            model_calls: run.model_calls,
        })
    }
}

impl TurnRun<'_> {
    fn transition(&mut self, next: TurnState) {
        tracing::debug!(
            session_id = self.session.id(),
            round = self.model_calls,
            from = ?self.state,
            to = ?next,
            "turn state"
        );
        self.state = next;
    }

    fn cancelled(&mut self) -> bool {
        if self.session.cancel_flag().is_cancelled() {
            self.transition(TurnState::Cancelled);
            tracing::info!(session_id = self.session.id(), "turn cancelled");
            true
        } else {
            false
        }
    }

    async fn drive(&mut self, history: &mut Vec<Message>) -> Result<StopReason, TurnError> {
        let context = self.context;
        loop {
            if self.cancelled() {
                return Ok(StopReason::Cancelled);
            }

            self.transition(TurnState::AwaitingModel);
            self.model_calls += 1;
            let provider = context.provider();
            let response = provider
                .invoke(history.as_slice(), context.tool_specs())
                .await
                .map_err(|e| {
                    tracing::warn!(session_id = self.session.id(), "model call failed: {e}");
                    TurnError::ModelInvocationFailed(format!("{e:#}"))
                })?;
            let input_tokens = response.usage.input_tokens;
            tracing::debug!(
                session_id = self.session.id(),
                input_tokens,
                tool_calls = response.tool_calls.len(),
                "model responded"
            );

            history.push(Message::from(response.clone()));
            let full = std::mem::take(history);
            *history = compact(provider, full, input_tokens, context.compaction()).await;

            if self.cancelled() {
                close_unanswered(history, &response.tool_calls, CANCELLED_TOOL_RESULT);
                return Ok(StopReason::Cancelled);
            }

            if let Err(e) = self.emitter.content_blocks(&response).await {
                close_unanswered(history, &response.tool_calls, ABORTED_TOOL_RESULT);
                return Err(e);
            }

            if !response.has_tool_calls() {
                self.transition(TurnState::Completed);
                return Ok(StopReason::Completed);
            }

            self.transition(TurnState::Dispatching);
            for (index, call) in response.tool_calls.iter().enumerate() {
                if let Err((e, appended)) = self.dispatch(history, call).await {
                    let next = index + usize::from(appended);
                    close_unanswered(history, &response.tool_calls[next..], ABORTED_TOOL_RESULT);
                    return Err(e);
                }
            }
        }
    }

    /// Run one tool call. On emission failure, reports whether its result
    /// was already appended.
    async fn dispatch(
        &self,
        history: &mut Vec<Message>,
        call: &ToolCallRequest,
    ) -> Result<(), (TurnError, bool)> {
        let client_id = self
            .emitter
            .tool_call_started(&call.name, &call.arguments)
            .await
            .map_err(|e| (e, false))?;
        self.emitter
            .tool_call_in_progress(&client_id)
            .await
            .map_err(|e| (e, false))?;

        let ctx = ToolContext::new(self.session.working_dir());
        let result = self
            .context
            .tools()
            .dispatch(&call.name, &call.arguments, &ctx)
            .await;
        history.push(Message::tool_result(&call.id, result.as_str()));

        self.emitter
            .tool_call_completed(&client_id, &result)
            .await
            .map_err(|e| (e, true))
    }
}

/// Answer every call in `calls` with `note` so each request keeps a result.
fn close_unanswered(history: &mut Vec<Message>, calls: &[ToolCallRequest], note: &str) {
    for call in calls {
        history.push(Message::tool_result(&call.id, note));
    }
}
