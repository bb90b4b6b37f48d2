//! Tool handler abstraction and the runtime's name → handler map.
//!
//! The registry crate ([`agent_kernel::registry::ToolRegistry`]) holds tool
//! *descriptors* (name, schema, metadata) but deliberately no handler — it
//! is a leaf crate shared by the planner (which only needs visibility) and
//! the tools node (which needs to invoke). This module owns the other half:
//! the name → handler map the tools node consults to actually run a call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use agent_kernel::registry::RiskLevel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Todo;

/// Everything a tool handler needs about the session it is running inside,
/// without exposing the full [`crate::state::SessionState`] (handlers must
/// not see or mutate conversation history directly — only through a state
/// patch, or indirectly through workspace I/O). `todos` is a read-only
/// snapshot, present so `todo_read` has something to read; it is never
/// mutated here, only through `todo_write`'s `ContentWithPatch`.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub thread_id: String,
    pub context_id: String,
    pub workspace_path: PathBuf,
    pub todos: Vec<Todo>,
}

/// A cooperative suspension request from a tool handler (e.g. `ask_human`),
/// or from the HITL gate wrapping the tools node. Modeled as a distinguished
/// return value per the design notes, not an exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterruptPayload {
    /// A tool call matched a `require_approval` HITL rule.
    Approval {
        tool: String,
        args: Value,
        risk: RiskLevel,
    },
    /// A tool handler (`ask_human`) needs a value from the user.
    AskHuman {
        question: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
}

/// What a tool handler invocation produced.
pub enum ToolOutcome {
    /// Plain text result, fed back to the model as the matching Tool
    /// message content.
    Content(String),
    /// A result plus a state patch to merge atomically with the Tool
    /// message — the only way a tool may mutate state beyond appending a
    /// message (used by the TODO tool).
    ContentWithPatch { content: String, state_patch: Value },
    /// The handler itself needs to suspend (only `ask_human` does this
    /// today); the tools node propagates this exactly like a HITL
    /// interrupt.
    Interrupt(InterruptPayload),
}

/// A tool's executable half: `handle(args, ctx) -> outcome`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value, ctx: &ToolContext) -> ToolOutcome;
}

/// Name → handler map the tools node consults to invoke approved calls.
///
/// Distinct from [`agent_kernel::registry::ToolRegistry`]: that crate knows
/// *that* `write_file` exists and its schema; this map knows *how* to run
/// it. Every discovered tool should eventually have an entry here, but the
/// registry and this map are populated independently (discovery vs.
/// binding), which is why a missing entry is handled as a recoverable
/// "tool not found" condition rather than a panic.
#[derive(Clone, Default)]
pub struct ToolHandlers {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
