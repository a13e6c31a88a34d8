use super::types::Session;
use crate::error::SessionError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::PathBuf;
use std::sync::Arc;

pub const SESSION_ID_PREFIX: &str = "sess_";

/// Process-wide map of live sessions.
///
/// `DashMap` shards its locks, so operations on different sessions never
/// block each other. No map lock is held while a turn runs: callers get an
/// `Arc<Session>` and drop the map reference immediately.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session. An explicit id that is already taken is rejected.
    pub fn create(
        &self,
        working_dir: impl Into<PathBuf>,
        id: Option<String>,
    ) -> Result<Arc<Session>, SessionError> {
        let working_dir = working_dir.into();
        match id {
            Some(id) => match self.sessions.entry(id) {
                Entry::Occupied(entry) => Err(SessionError::Duplicate(entry.key().clone())),
                Entry::Vacant(entry) => {
                    let session = Arc::new(Session::new(entry.key().clone(), working_dir));
                    entry.insert(Arc::clone(&session));
                    tracing::info!(session_id = session.id(), "session created");
                    Ok(session)
                }
            },
            None => loop {
                if let Entry::Vacant(entry) = self.sessions.entry(generate_session_id()) {
                    let session = Arc::new(Session::new(entry.key().clone(), working_dir));
                    entry.insert(Arc::clone(&session));
                    tracing::info!(session_id = session.id(), "session created");
                    break Ok(session);
                }
            },
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::info!(session_id = id, "session deleted");
        }
        removed
    }

    /// Raise the cancel flag of a session's running turn. Idempotent.
    pub fn cancel(&self, id: &str) -> Result<(), SessionError> {
        self.get(id)?.cancel();
        tracing::debug!(session_id = id, "cancellation requested");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn generate_session_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{SESSION_ID_PREFIX}{}", &hex[..12])
}
