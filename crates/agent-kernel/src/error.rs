//! Kernel error types.
//!
//! All kernel subsystems surface errors through [`KernelError`], which is the
//! single error type returned by every public API in this crate.  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.

/// Unified error type for the tool registry and mention classifier.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The requested tool is not known to the registry at all (not even
    /// discovered).
    #[error("tool not found: {name}")]
    ToolNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A tool with this name is already registered as discovered.
    #[error("tool already registered: {name}")]
    AlreadyRegistered {
        /// The name that collided.
        name: String,
    },

    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.  Prefer a typed variant whenever possible.
    #[error("internal kernel error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, KernelError>;
