//! The abstract chat-model boundary.
//!
//! The core never speaks a provider's wire format directly — that is
//! explicitly out of scope (see the crate root docs). Instead it consumes
//! [`ChatModel`], a single narrow trait: `invoke(system_prompt, messages,
//! tools_bound, model_id, temperature, max_tokens) -> {assistant_message,
//! usage}`. A concrete implementation (HTTP client, mock, or test double)
//! lives outside this crate and is injected at the call site.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::{Message, Usage};

/// A tool definition exposed to the model so it knows what it may invoke.
///
/// Built from an [`agent_kernel::registry::ToolRecord`] when the planner
/// assembles the visibility set for a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBinding {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl From<&agent_kernel::registry::ToolRecord> for ToolBinding {
    fn from(record: &agent_kernel::registry::ToolRecord) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            input_schema: record.input_schema.clone(),
        }
    }
}

/// A request to the chat model for one planner turn.
#[derive(Debug, Clone)]
pub struct ChatInvocation {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools_bound: Vec<ToolBinding>,
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The model's answer to one [`ChatInvocation`].
///
/// `assistant_message` carries any requested tool calls itself
/// ([`Message::has_pending_tool_calls`]); there is no separate tool-call
/// list, since duplicating it would let the two fall out of sync.
#[derive(Debug, Clone)]
pub struct ChatInvocationResult {
    pub assistant_message: Message,
    pub usage: Usage,
}

/// Errors a [`ChatModel`] implementation may report.
///
/// These map onto the LLM rows of the error-kind table: transient errors get
/// one retry with backoff (owned by the planner, not this trait), context
/// overflow forces a compression pass and one retry.
#[derive(Debug, thiserror::Error)]
pub enum ChatModelError {
    /// Provider timeout or 5xx; retried once by the caller.
    #[error("timeout or transient failure contacting chat model: {0}")]
    Transient(String),

    /// Provider reported a context-length / overflow error.
    #[error("chat model reported context overflow")]
    ContextOverflow,

    /// Any other provider-reported failure, not retried.
    #[error("chat model error: {0}")]
    Provider(String),
}

/// The abstract chat-model collaborator the planner and compressor invoke.
///
/// The binding of `tools_bound` must cause the model to emit structured
/// tool-call requests (via `assistant_message.tool_calls`) when it wishes to
/// use a tool rather than encoding calls as free text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(
        &self,
        request: ChatInvocation,
    ) -> Result<ChatInvocationResult, ChatModelError>;
}

/// Model capability slots the planner selects among, keyed by
/// [`crate::state::ModelSlot`] and rough capability hints (vision inputs,
/// detected code, explicit `model_pref`).
///
/// This is process-wide, read-only configuration: which concrete `model_id`
/// backs each slot. It is not itself a [`ChatModel`] — callers hold one
/// `Arc<dyn ChatModel>` per slot (or a single model answering for all slots)
/// and look up the `model_id` here to pass into [`ChatInvocation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSlots {
    pub base: String,
    pub reasoning: String,
    pub vision: String,
    pub code: String,
    pub chat: String,
}

impl ModelSlots {
    /// The configured model id for a given slot.
    pub fn model_id(&self, slot: crate::state::ModelSlot) -> &str {
        use crate::state::ModelSlot;
        match slot {
            ModelSlot::Base => &self.base,
            ModelSlot::Reasoning => &self.reasoning,
            ModelSlot::Vision => &self.vision,
            ModelSlot::Code => &self.code,
            ModelSlot::Chat => &self.chat,
        }
    }
}

/// Static table of approximate context-window sizes by model id, consulted
/// by the token tracker when computing usage ratio. Unknown model ids fall
/// back to a conservative default.
pub fn context_window_for(model_id: &str) -> u32 {
    match model_id {
        id if id.contains("claude") => 200_000,
        id if id.contains("gpt-4o") || id.contains("gpt-4.1") => 128_000,
        id if id.contains("deepseek") => 64_000,
        id if id.contains("glm") => 128_000,
        _ => 32_000,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
