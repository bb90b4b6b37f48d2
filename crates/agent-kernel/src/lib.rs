//! Tool registry and mention classification for the agent core runtime.
//!
//! - **[`registry`]** -- Three-layer tool registry (discovered / enabled /
//!   execution set) using [`DashMap`] for lock-free concurrent reads and
//!   guarded on-demand promotion.
//! - **[`mention`]** -- Classifies `@name` tokens from a user turn into
//!   tool / skill / agent-handle / unknown, driving on-demand tool loading.
//! - **[`error`]** -- Unified kernel error types via [`thiserror`].
//!
//! All public types are `Send + Sync` and designed for use within a
//! multi-threaded tokio runtime.

pub mod error;
pub mod mention;
pub mod registry;

pub use error::{KernelError, Result};
pub use mention::{MentionClassifier, MentionResult};
pub use registry::{RiskLevel, ToolMetadata, ToolRecord, ToolRegistry};
