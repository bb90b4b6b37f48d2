//! The Finalizer Node: produces (or passes through) the reply surfaced to
//! the user at the end of a turn.
//!
//! If the terminal assistant message is already content-only (the common
//! case: the model answered directly, or the loop ended because it stopped
//! requesting tools), this is a no-op. Otherwise — the loop budget was
//! exhausted with tool calls still pending, or the last message is a Tool
//! result the model never got to react to — one last model call asks for a
//! plain-language summary over the cleaned history.

use tracing::{instrument, warn};

use crate::error::Result;
use crate::llm::{ChatInvocation, ChatModel};
use crate::message::{Message, Role};
use crate::state::SessionState;

const FINALIZER_SYSTEM_PROMPT: &str = "\
You ran out of turns before producing a final answer. Write a short, plain \
language summary of what you found or accomplished so far, and say clearly \
if the task was left incomplete.";

pub struct FinalizerDeps<'a> {
    pub chat_model: &'a dyn ChatModel,
    pub model_id: &'a str,
    pub max_tokens: u32,
}

/// Run the finalizer over `state`, returning the (possibly unchanged) state
/// with a guaranteed content-only terminal Assistant message.
#[instrument(skip_all, fields(session = %state.thread_id, loops = state.loops))]
pub async fn run(mut state: SessionState, deps: FinalizerDeps<'_>) -> Result<SessionState> {
    if matches!(state.last_message(), Some(msg) if msg.role == Role::Assistant && !msg.has_pending_tool_calls())
    {
        return Ok(state);
    }

    let mut messages: Vec<Message> = state
        .messages
        .iter()
        .filter(|m| !(m.role == Role::Assistant && m.has_pending_tool_calls()))
        .cloned()
        .collect();
    messages.push(Message::human(
        "Summarize the outcome of this task for me in a few sentences.",
    ));

    let request = ChatInvocation {
        system_prompt: FINALIZER_SYSTEM_PROMPT.to_string(),
        messages,
        tools_bound: Vec::new(),
        model_id: deps.model_id.to_string(),
        temperature: 0.2,
        max_tokens: deps.max_tokens,
    };

    match deps.chat_model.invoke(request).await {
        Ok(result) => {
            state.messages.push(result.assistant_message);
        }
        Err(err) => {
            warn!(%err, "finalizer model call failed, falling back to a static notice");
            state.messages.push(Message::assistant(
                "I ran out of turns before finishing this task and was unable to summarize \
                 the result. Please check the conversation above for partial progress.",
            ));
        }
    }

    Ok(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
