//! Agent error types.
//!
//! All core subsystems surface errors through [`AgentError`], the single
//! `Result` error type for every public entry point in this crate. It maps
//! one-to-one onto the error-kind table: most conditions listed there are
//! *not* represented here because the policy is "never crash a session for
//! recoverable conditions" — a tool-not-found, a HITL denial, a compression
//! failure, and so on become Tool or finalizer *messages*, not `Err` returns.
//! What remains here is what genuinely aborts a node's execution: transport,
//! configuration, and persistence failures.
//!
//! Per-subsystem errors are converted in via `#[from]` rather than
//! constructed ad hoc, so each subsystem's error enum stays the authority on
//! its own variants.

/// Unified error type for the agent core runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Chat model errors -----------------------------------------------
    /// The chat model call failed (timeout, 5xx, malformed response). The
    /// planner retries once with exponential backoff before surfacing this.
    #[error("chat model invocation failed: {reason}")]
    ChatModelFailed { reason: String },

    /// The provider reported a context-length / overflow error. The planner
    /// forces a compression pass and retries once before surfacing this.
    #[error("chat model reported context overflow")]
    ContextOverflow,

    // -- Compression errors ------------------------------------------------
    /// Both the summarization call and the emergency-truncation fallback
    /// failed to bring the session under the critical threshold.
    #[error("compression failed and fallback truncation did not converge: {reason}")]
    CompressionFailed { reason: String },

    // -- Tool errors ---------------------------------------------------------
    /// Propagated from the tool registry / mention classifier.
    #[error("kernel error: {0}")]
    Kernel(#[from] agent_kernel::KernelError),

    // -- Persistence errors --------------------------------------------------
    /// Propagated from the checkpointer.
    #[error("store error: {0}")]
    Store(#[from] agent_store::StoreError),

    // -- Skill errors ---------------------------------------------------------
    /// Propagated from the skill registry.
    #[error("skill error: {0}")]
    Skill(#[from] agent_skills::SkillError),

    // -- Configuration errors ------------------------------------------------
    /// Configuration failed to load or validate.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// File-watcher error while hot-reloading configuration.
    #[error("config watcher error: {0}")]
    Notify(#[from] notify::Error),

    // -- Cancellation --------------------------------------------------------
    /// The session's cancellation token fired; the runtime rewinds to the
    /// most recent checkpoint.
    #[error("session cancelled")]
    Cancelled,

    // -- Serialization ---------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic ---------------------------------------------------------------
    /// Catch-all for unexpected internal errors. Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<crate::llm::ChatModelError> for AgentError {
    fn from(err: crate::llm::ChatModelError) -> Self {
        match err {
            crate::llm::ChatModelError::ContextOverflow => Self::ContextOverflow,
            other => Self::ChatModelFailed {
                reason: other.to_string(),
            },
        }
    }
}

