use crate::llm::Message;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Cooperative cancellation signal shared between the cancel path and a turn.
///
/// Polled only at turn checkpoints; raising it never interrupts a model call or
/// a tool execution that is already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One conversation: identity, working directory, ordered history.
///
/// The history lock doubles as the single-flight guard: a turn holds it from
/// start to finish, so two turns on the same session never interleave. The
/// cancel flag lives outside the lock so it can be raised mid-turn.
#[derive(Debug)]
pub struct Session {
    id: String,
    working_dir: PathBuf,
    history: Mutex<Vec<Message>>,
    cancel: CancelFlag,
}

impl Session {
    pub fn new(id: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            working_dir: working_dir.into(),
            history: Mutex::new(Vec::new()),
            cancel: CancelFlag::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Request cancellation of the running turn. No-op when idle.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Exclusive access to the history for the duration of one turn.
    pub async fn lock_history(&self) -> MutexGuard<'_, Vec<Message>> {
        self.history.lock().await
    }

    /// Snapshot of the current history. Waits for any running turn to finish.
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    /// Install the system prompt as the first message of an empty history.
    pub async fn install_system_prompt(&self, prompt: impl Into<String>) {
        let mut history = self.history.lock().await;
        if history.first().is_some_and(Message::is_system) {
            history[0] = Message::system(prompt);
        } else {
            history.insert(0, Message::system(prompt));
        }
    }

    /// Append messages directly, bypassing the turn loop.
    pub async fn extend_history(&self, messages: impl IntoIterator<Item = Message>) {
        self.history.lock().await.extend(messages);
    }
}
