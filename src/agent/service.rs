use super::context::AgentContext;
use super::input::PromptBlock;
use super::turn::{TurnOrchestrator, TurnOutcome};
use super::updates::{UpdateEmitter, UpdateSink};
use crate::error::{Result, SessionError};
use crate::session::{Session, SessionRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Session-addressed entry points shared by the ACP server and the terminal.
pub struct Agent {
    orchestrator: TurnOrchestrator,
    sessions: SessionRegistry,
    system_prompt: String,
}

impl Agent {
    pub fn new(context: Arc<AgentContext>, system_prompt: impl Into<String>) -> Self {
        Self {
            orchestrator: TurnOrchestrator::new(context),
            sessions: SessionRegistry::new(),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        self.orchestrator.context()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Create a session whose history starts with the system prompt.
    pub async fn create_session(
        &self,
        working_dir: impl Into<PathBuf>,
        id: Option<String>,
    ) -> std::result::Result<Arc<Session>, SessionError> {
        let session = self.sessions.create(working_dir, id)?;
        if !self.system_prompt.is_empty() {
            session.install_system_prompt(self.system_prompt.clone()).await;
        }
        Ok(session)
    }

    /// Run one turn on `session_id`, streaming progress into `sink`.
    pub async fn submit_turn(
        &self,
        session_id: &str,
        input: &[PromptBlock],
        sink: Arc<dyn UpdateSink>,
    ) -> Result<TurnOutcome> {
        let session = self.sessions.get(session_id)?;
        let emitter = UpdateEmitter::new(sink, session_id);
        let outcome = self
            .orchestrator
            .run_turn(&session, input, &emitter)
            .await?;
        tracing::info!(
            session_id,
            stop_reason = %outcome.stop_reason,
            model_calls = outcome.model_calls,
            "turn finished"
        );
        Ok(outcome)
    }

    /// Idempotent; a no-op when no turn is running.
    pub fn cancel_turn(&self, session_id: &str) -> std::result::Result<(), SessionError> {
        self.sessions.cancel(session_id)
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.delete(session_id)
    }

    pub async fn shutdown(&self) {
        self.context().shutdown().await;
    }
}
