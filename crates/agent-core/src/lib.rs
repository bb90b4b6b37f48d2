//! Core agent execution runtime.
//!
//! This crate implements the graph-based state machine that drives one
//! turn of a tool-using LLM agent: a Planner node that talks to the model,
//! a Tools node that executes whatever it asked for (subject to an HITL
//! approval gate), and a Finalizer node that guarantees a content-only
//! reply at the end of a run. A pure [`graph::router`] function decides
//! which node runs next from the session state alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   tool calls    ┌───────┐   completed batch   ┌─────────┐
//! │ Planner │ ──────────────> │ Tools │ ───────────────────>│ Planner │ ──> ...
//! └────┬────┘                 └───┬───┘                     └────┬────┘
//!      │ content-only                 │ HITL / ask_human               │
//!      v                              v interrupt                     v
//! ┌──────────┐                  (suspend, resume               ┌──────────┐
//! │Finalizer │                   via the host)                 │Finalizer │
//! └──────────┘                                                  └──────────┘
//! ```
//!
//! A checkpoint is persisted after every node transition via
//! [`agent_store::Checkpointer`], so a cancelled or crashed run always
//! resumes at a node boundary.
//!
//! ## Modules
//!
//! - [`graph`] -- the Planner/Tools/Finalizer nodes, the router, and the
//!   driver loop that ties them together.
//! - [`message`] -- `Message`/`Role`/`ToolCall`/`Usage`, the conversation
//!   wire shape.
//! - [`state`] -- `SessionState`, the single record every node reads and
//!   patches.
//! - [`llm`] -- the abstract `ChatModel` trait and its supporting types.
//! - [`compaction`] -- context-window compression.
//! - [`tool`] -- the tool-handler abstraction and HITL interrupt payloads.
//! - [`hitl`] -- the HITL approval gate.
//! - [`builtins`] -- the persistent-global tools (`now`, `todo_read`,
//!   `todo_write`, `ask_human`).
//! - [`delegation`] -- the `delegate_task` sub-agent tool.
//! - [`config`] -- runtime configuration and hot-reload.
//! - [`error`] -- agent error types.

pub mod builtins;
pub mod compaction;
pub mod config;
pub mod delegation;
pub mod error;
pub mod graph;
pub mod hitl;
pub mod llm;
pub mod message;
pub mod state;
pub mod tool;

// Re-export the most commonly used types at the crate root.
pub use compaction::{compress, CompressionConfig};
pub use config::{ConfigChange, ConfigManager, RuntimeConfig};
pub use delegation::{DelegationDeps, DelegationTool};
pub use error::{AgentError, Result};
pub use graph::{router::NextNode, DriverOutcome, GraphDeps};
pub use hitl::{ApprovalGate, ApprovalResponse, Decision, HitlRule, Verdict};
pub use llm::{ChatInvocation, ChatInvocationResult, ChatModel, ChatModelError, ModelSlots};
pub use message::{Message, Role, ToolCall, Usage};
pub use state::{SessionState, Todo, TodoStatus};
pub use tool::{InterruptPayload, ToolContext, ToolHandler, ToolHandlers, ToolOutcome};
