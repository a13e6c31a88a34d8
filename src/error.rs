use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `codebuddy`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; collaborator seams (providers, tools,
/// resource readers) continue to use `anyhow::Result` for ad-hoc context.
///
/// Tool failures and summarization failures never appear here: they are
/// recovered inside the turn and surfaced to the model as data.
#[derive(Debug, Error)]
pub enum BuddyError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Session ─────────────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Turn ────────────────────────────────────────────────────────────
    #[error("turn: {0}")]
    Turn(#[from] TurnError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// `keep_trailing` is too small to keep tool-call/result runs together.
    #[error("compaction keep_trailing={keep_trailing} is below the minimum of {minimum}")]
    CompactionInvariant { keep_trailing: usize, minimum: usize },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Session errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session already exists: {0}")]
    Duplicate(String),
}

// ─── Turn errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TurnError {
    /// The model call itself failed. History is left as of the last append.
    #[error("model invocation failed: {0}")]
    ModelInvocationFailed(String),

    /// The client could not be reached while pushing an update.
    #[error("update emission failed: {0}")]
    Emission(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, BuddyError>;
