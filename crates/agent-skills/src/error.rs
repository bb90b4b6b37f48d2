//! Error types for the skills subsystem.

use std::path::PathBuf;

/// Skill-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("skill not found: `{0}`")]
    NotFound(String),

    #[error("invalid SKILL.md format in `{path}`: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("missing required field `{field}` in SKILL.md at `{path}`")]
    MissingField { path: PathBuf, field: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SkillError>;
