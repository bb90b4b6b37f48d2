//! Session state: the single record every graph node reads and patches.
//!
//! A [`SessionState`] is mutated only through node-returned update patches
//! (see [`crate::graph`]) that the runtime merges; nodes never mutate state
//! in place. This mirrors the append-only-semantics model in the data model:
//! cyclic references are avoided by keeping `messages` an append-only log and
//! everything else small side tables keyed by id.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Status of a single TODO item, mutated only by the TODO tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One entry in the session's TODO list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
    pub priority: u8,
}

/// A user-uploaded file descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Path relative to `workspace_path`.
    pub path: PathBuf,
    /// Declared MIME type, if known.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Model capability slot, selected by the planner per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSlot {
    Base,
    Reasoning,
    Vision,
    Code,
    Chat,
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::Base
    }
}

/// Token-usage status band, computed against the configured context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Normal,
    Info,
    Warning,
    Critical,
}

/// One tool call awaiting HITL evaluation or execution, within a batch the
/// tools node is partway through processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A tools-node batch suspended mid-processing, persisted on `SessionState`
/// so a HITL or `ask_human` interrupt survives a checkpoint round-trip: the
/// driver loop may be restarted on a different process entirely before the
/// host resumes it with an [`crate::hitl::ApprovalResponse`] or a human
/// reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingToolBatch {
    /// Calls not yet resolved, front-first.
    pub remaining: Vec<PendingCall>,
    /// Tool messages already produced for this batch, in emission order.
    pub completed: Vec<Message>,
}

/// The full mutable record threaded through the graph for one session.
///
/// `context_id` distinguishes the main agent (`"main"`) from a delegated
/// subagent (`"subagent-<uuid8>"`); subagents never see `delegate_task` in
/// `allowed_tools` (enforced at construction in [`crate::delegation`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub todos: Vec<Todo>,

    pub active_skill: Option<String>,
    pub allowed_tools: HashSet<String>,
    /// `@name` tokens from the latest human turn, consumed at most once by
    /// the planner's mention-classification step.
    pub mentioned_agents: Vec<String>,

    pub context_id: String,
    pub parent_context: Option<String>,
    pub thread_id: String,

    pub loops: u32,
    pub max_loops: u32,

    pub cumulative_prompt_tokens: u64,
    pub cumulative_completion_tokens: u64,
    pub compact_count: u32,
    pub last_compression_ratio: Option<f32>,
    pub auto_compressed_this_request: bool,
    /// Number of `compact`-strategy compressions since the last `summarize`,
    /// feeding the `auto` strategy's adaptive rule (switch to `summarize`
    /// after 3). Reset to 0 whenever a `summarize` compression runs.
    pub compacts_since_summarize: u32,

    pub workspace_path: PathBuf,
    pub uploaded_files: Vec<UploadedFile>,
    pub new_uploaded_files: Vec<UploadedFile>,

    pub model_pref: Option<ModelSlot>,

    /// Set while the tools node is suspended partway through a batch; `None`
    /// the rest of the time. Not part of the conversation history proper —
    /// an implementation detail needed to make interrupts durable across
    /// checkpoints (see [`crate::graph::tools`]).
    #[serde(default)]
    pub pending_tool_batch: Option<PendingToolBatch>,
}

impl SessionState {
    /// Default hard bound on planner iterations for a top-level session.
    pub const DEFAULT_MAX_LOOPS: u32 = 100;
    /// Default hard bound on planner iterations for a delegated subagent.
    pub const DEFAULT_SUBAGENT_MAX_LOOPS: u32 = 15;

    /// Construct a fresh top-level session state for `thread_id`.
    pub fn new_main(thread_id: impl Into<String>, workspace_path: PathBuf) -> Self {
        Self {
            messages: Vec::new(),
            todos: Vec::new(),
            active_skill: None,
            allowed_tools: HashSet::new(),
            mentioned_agents: Vec::new(),
            context_id: "main".to_string(),
            parent_context: None,
            thread_id: thread_id.into(),
            loops: 0,
            max_loops: Self::DEFAULT_MAX_LOOPS,
            cumulative_prompt_tokens: 0,
            cumulative_completion_tokens: 0,
            compact_count: 0,
            last_compression_ratio: None,
            auto_compressed_this_request: false,
            compacts_since_summarize: 0,
            workspace_path,
            uploaded_files: Vec::new(),
            new_uploaded_files: Vec::new(),
            model_pref: None,
            pending_tool_batch: None,
        }
    }

    /// Construct the isolated state for a new subagent invocation, per
    /// the delegation tool's contract: a single `Human(task)` message, a
    /// fresh `context_id`/`thread_id`, cleared skill/tool lists, and no
    /// `delegate_task` visibility (nested delegation is blocked by
    /// `context_id` convention, checked in [`Self::is_subagent`]).
    pub fn new_subagent(task: &str, max_loops: u32, parent: &SessionState) -> Self {
        let context_id = format!("subagent-{}", short_uuid8());
        Self {
            messages: vec![Message::human(task)],
            todos: Vec::new(),
            active_skill: None,
            allowed_tools: HashSet::new(),
            mentioned_agents: Vec::new(),
            parent_context: Some(parent.context_id.clone()),
            thread_id: context_id.clone(),
            context_id,
            loops: 0,
            max_loops,
            cumulative_prompt_tokens: 0,
            cumulative_completion_tokens: 0,
            compact_count: 0,
            last_compression_ratio: None,
            auto_compressed_this_request: false,
            compacts_since_summarize: 0,
            workspace_path: parent.workspace_path.clone(),
            uploaded_files: Vec::new(),
            new_uploaded_files: Vec::new(),
            model_pref: None,
            pending_tool_batch: None,
        }
    }

    /// Whether this state belongs to a delegated subagent (blocks nested
    /// delegation per the invariant in the data model).
    pub fn is_subagent(&self) -> bool {
        self.context_id.starts_with("subagent-")
    }

    /// The last message in the history, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// An 8-hex-character id used for subagent `context_id`s and the
/// `[subagent-<8hex>]` prefix applied to their surfaced ask-human questions.
pub fn short_uuid8() -> String {
    let uuid = Uuid::new_v4();
    uuid.simple().to_string()[..8].to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> SessionState {
        SessionState::new_main("t1", PathBuf::from("/tmp/ws"))
    }

    #[test]
    fn new_main_has_main_context() {
        let state = root();
        assert_eq!(state.context_id, "main");
        assert!(!state.is_subagent());
        assert_eq!(state.max_loops, SessionState::DEFAULT_MAX_LOOPS);
    }

    #[test]
    fn new_subagent_has_isolated_context() {
        let parent = root();
        let sub = SessionState::new_subagent("do the thing", 15, &parent);

        assert!(sub.is_subagent());
        assert_eq!(sub.thread_id, sub.context_id);
        assert_eq!(sub.parent_context.as_deref(), Some("main"));
        assert_eq!(sub.messages.len(), 1);
        assert_eq!(sub.messages[0].content, "do the thing");
        assert!(sub.allowed_tools.is_empty());
        assert_eq!(sub.workspace_path, parent.workspace_path);
    }

    #[test]
    fn short_uuid8_is_eight_hex_chars() {
        let id = short_uuid8();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn last_message_empty_history() {
        assert!(root().last_message().is_none());
    }
}
