//! Conversation message types shared by every graph node.
//!
//! These model the data flowing through [`crate::state::SessionState`]. They
//! are provider-agnostic: the concrete wire format used to talk to an LLM
//! provider is owned by whatever implements [`crate::llm::ChatModel`], not by
//! this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user.
    Human,
    /// Output from the LLM.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// A single message in a session's history.
///
/// Assistant messages may carry zero or more tool-call requests; every
/// tool-call request must eventually be answered by a `Tool` message with
/// the matching `tool_call_id` before the history is sent to the model
/// again (enforced by the planner's sanitizer, see [`crate::graph::planner`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    ///
    /// For assistant messages that contain tool calls only, this may be
    /// empty.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (only present when
    /// `role == Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this message is a response to (only
    /// present when `role == Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a human (user-turn) message.
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant text message (no pending tool calls).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool-result message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Whether this assistant message has tool calls still awaiting an
    /// answer, i.e. is not a terminal (content-only) turn.
    pub fn has_pending_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// The text content of the message, regardless of role.
    pub fn content_text(&self) -> &str {
        &self.content
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the model, used to correlate the
    /// matching `Tool` message.
    pub id: String,

    /// The name of the tool to invoke.
    pub name: String,

    /// Arguments as a JSON value; shape depends on the tool's input schema.
    pub arguments: Value,
}

/// Token usage reported for a single chat-model invocation.
///
/// Field names are normalized here; `crate::llm` is responsible for mapping
/// whatever a concrete provider calls its usage fields onto this shape.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt (system + history + tool definitions).
    pub prompt_tokens: u32,
    /// Tokens generated by the model in its response.
    pub completion_tokens: u32,
}

impl Usage {
    /// Total tokens for this invocation.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_roles() {
        assert_eq!(Message::system("x").role, Role::System);
        assert_eq!(Message::human("x").role, Role::Human);
        assert_eq!(Message::assistant("x").role, Role::Assistant);
        assert_eq!(Message::tool_result("id", "x").role, Role::Tool);
    }

    #[test]
    fn assistant_tool_calls_has_pending() {
        let msg = Message::assistant_tool_calls(vec![ToolCall {
            id: "tc_1".into(),
            name: "now".into(),
            arguments: Value::Null,
        }]);
        assert!(msg.has_pending_tool_calls());
        assert!(msg.content.is_empty());
    }

    #[test]
    fn content_only_assistant_has_no_pending_calls() {
        let msg = Message::assistant("done");
        assert!(!msg.has_pending_tool_calls());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("tc_1", "ok");
        assert_eq!(msg.tool_call_id.as_deref(), Some("tc_1"));
        assert_eq!(msg.role, Role::Tool);
    }

    #[test]
    fn usage_total_sums_fields() {
        let usage = Usage {
            prompt_tokens: 100,
            completion_tokens: 20,
        };
        assert_eq!(usage.total(), 120);
    }
}
