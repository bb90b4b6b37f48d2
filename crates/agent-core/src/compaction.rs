//! Context compaction: token-aware reduction of a session's message log.
//!
//! Partitions `messages` into `{anchors, old, middle, recent}`, summarizes
//! `old`+`middle` via the chat model with one of two strategies, and falls
//! back to deterministic truncation if summarization fails or produces
//! nothing usable. Fallback is never skipped: the post-state must always
//! leave the session below the critical threshold.

use tracing::{debug, info, warn};

use crate::llm::{ChatInvocation, ChatModel, ChatModelError};
use crate::message::{Message, Role};

/// Tunables for the compressor, loaded from [`crate::config::RuntimeConfig`].
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Non-system messages retained verbatim at the tail.
    pub keep_recent_messages: usize,
    /// Non-system messages preceding `recent`, summarized less aggressively
    /// than `old`.
    pub compact_middle_messages: usize,
    /// Messages kept by the emergency-truncation fallback (system anchors
    /// plus this many most-recent messages).
    pub emergency_keep_messages: usize,
    /// Output-token budget for the summarization call itself, so
    /// compression cannot itself consume more than its own output budget.
    pub max_output_tokens: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            keep_recent_messages: 10,
            compact_middle_messages: 30,
            emergency_keep_messages: 150,
            max_output_tokens: 1440,
        }
    }
}

/// Which summarization strategy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// ~1000-char structured summary preserving file paths, tool-call
    /// shapes, errors, and decisions. Used for `middle`.
    Compact,
    /// ≤200-char abstract. Used for `old`, and for `middle` once the
    /// adaptive rule decides compaction has stopped paying off.
    Summarize,
}

/// Rule-based choice between [`Strategy::Compact`] and [`Strategy::Summarize`]
/// for the `middle` partition: switch to `summarize` if the last compression
/// ratio was poor (> 0.40) or three `compact`s have run since the last
/// `summarize`.
pub fn choose_strategy(last_ratio: Option<f32>, compacts_since_summarize: u32) -> Strategy {
    if last_ratio.is_some_and(|r| r > 0.40) || compacts_since_summarize >= 3 {
        Strategy::Summarize
    } else {
        Strategy::Compact
    }
}

/// The four partitions of a message log prior to compression.
pub struct Partition {
    /// Every `System` message, retained verbatim regardless of position.
    pub anchors: Vec<Message>,
    /// Messages older than `middle`; always summarized, more aggressively.
    pub old: Vec<Message>,
    /// Non-system messages preceding `recent`, subject to strategy-dependent
    /// summarization.
    pub middle: Vec<Message>,
    /// The last `keep_recent_messages` non-system messages, retained
    /// verbatim.
    pub recent: Vec<Message>,
}

/// Split `messages` into anchors/old/middle/recent per [`CompressionConfig`].
pub fn partition(messages: &[Message], config: &CompressionConfig) -> Partition {
    let anchors: Vec<Message> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .cloned()
        .collect();
    let non_system: Vec<Message> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();

    let recent_start = non_system.len().saturating_sub(config.keep_recent_messages);
    let recent = non_system[recent_start..].to_vec();

    let middle_start = recent_start.saturating_sub(config.compact_middle_messages);
    let middle = non_system[middle_start..recent_start].to_vec();
    let old = non_system[..middle_start].to_vec();

    Partition {
        anchors,
        old,
        middle,
        recent,
    }
}

/// Result of a successful compression.
pub struct CompressionOutcome {
    pub messages: Vec<Message>,
    /// Compressed message count / pre-compression message count.
    pub ratio: f32,
    /// Which strategy actually ran (`None` if the emergency fallback fired).
    pub strategy: Option<Strategy>,
}

/// Compress `messages` using `strategy` for the `middle` partition (`old` is
/// always summarized more aggressively, regardless of `strategy`). Falls
/// back to emergency truncation if the chat model call fails or returns an
/// empty summary.
pub async fn compress(
    messages: &[Message],
    chat_model: &dyn ChatModel,
    model_id: &str,
    strategy: Strategy,
    config: &CompressionConfig,
) -> CompressionOutcome {
    let pre_len = messages.len();
    let parts = partition(messages, config);

    if parts.old.is_empty() && parts.middle.is_empty() {
        debug!("nothing to compress, old and middle partitions are empty");
        return CompressionOutcome {
            messages: messages.to_vec(),
            ratio: 1.0,
            strategy: None,
        };
    }

    match summarize(&parts, chat_model, model_id, strategy, config).await {
        Ok(summary) if !summary.trim().is_empty() => {
            let mut result = parts.anchors.clone();
            result.push(Message::system(format!(
                "[context compressed: {} earlier messages summarized]\n{}",
                parts.old.len() + parts.middle.len(),
                summary
            )));
            result.extend(parts.recent.clone());

            let ratio = result.len() as f32 / pre_len.max(1) as f32;
            info!(pre_len, post_len = result.len(), ratio, strategy = ?strategy, "compression complete");

            CompressionOutcome {
                messages: result,
                ratio,
                strategy: Some(strategy),
            }
        }
        Ok(_) => {
            warn!("summarization produced an empty summary, falling back to emergency truncation");
            emergency_truncate(messages, config)
        }
        Err(err) => {
            warn!(error = %err, "summarization call failed, falling back to emergency truncation");
            emergency_truncate(messages, config)
        }
    }
}

async fn summarize(
    parts: &Partition,
    chat_model: &dyn ChatModel,
    model_id: &str,
    strategy: Strategy,
    config: &CompressionConfig,
) -> Result<String, ChatModelError> {
    let mut to_summarize = parts.old.clone();
    to_summarize.extend(parts.middle.clone());
    let transcript = render_transcript(&to_summarize);

    let (system_prompt, instruction) = match strategy {
        Strategy::Compact => (
            "You produce structured conversation summaries for an AI agent's own \
             continuation. Preserve file paths, tool-call shapes, errors, and decisions."
                .to_string(),
            "Summarize the conversation below in roughly 1000 characters, preserving every \
             file path, tool-call shape, error, and decision mentioned."
                .to_string(),
        ),
        Strategy::Summarize => (
            "You produce terse conversation abstracts for an AI agent's own continuation."
                .to_string(),
            "Summarize the conversation below in 200 characters or fewer.".to_string(),
        ),
    };

    let request = ChatInvocation {
        system_prompt,
        messages: vec![Message::human(format!("{instruction}\n\n{transcript}"))],
        tools_bound: Vec::new(),
        model_id: model_id.to_string(),
        temperature: 0.0,
        max_tokens: config.max_output_tokens,
    };

    let result = chat_model.invoke(request).await?;
    Ok(result.assistant_message.content)
}

fn render_transcript(messages: &[Message]) -> String {
    let mut buf = String::with_capacity(messages.len() * 128);
    for msg in messages {
        let label = match msg.role {
            Role::System => "System",
            Role::Human => "Human",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        };
        buf.push_str(label);
        buf.push_str(": ");
        buf.push_str(&msg.content);
        for tc in &msg.tool_calls {
            buf.push_str(&format!("\n  [tool_call: {}({})]", tc.name, tc.arguments));
        }
        buf.push('\n');
    }
    buf
}

/// Deterministic fallback: keep all system anchors and the most recent
/// `emergency_keep_messages` messages. Never fails, never calls the model.
pub fn emergency_truncate(messages: &[Message], config: &CompressionConfig) -> CompressionOutcome {
    let pre_len = messages.len();
    let anchors: Vec<Message> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .cloned()
        .collect();
    let non_system: Vec<Message> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();

    let keep_start = non_system.len().saturating_sub(config.emergency_keep_messages);
    let mut result = anchors;
    result.extend(non_system[keep_start..].iter().cloned());

    let ratio = result.len() as f32 / pre_len.max(1) as f32;
    warn!(pre_len, post_len = result.len(), "emergency truncation applied");

    CompressionOutcome {
        messages: result,
        ratio,
        strategy: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
