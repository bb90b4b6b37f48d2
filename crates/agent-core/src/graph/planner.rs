//! The Planner Node.
//!
//! Responsibilities, in order: sanitize history, truncate safely, classify
//! mentions, assemble the visibility set, check token status (possibly
//! triggering auto-compression and returning early without calling the
//! model), build the system prompt, select a model slot, invoke the chat
//! model, and record usage.

use std::collections::HashSet;

use agent_kernel::mention::{MentionClassifier, SkillLookup};
use agent_kernel::registry::ToolRegistry;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::compaction::{self, CompressionConfig};
use crate::error::{AgentError, Result};
use crate::llm::{ChatInvocation, ChatModel, ModelSlots, ToolBinding, context_window_for};
use crate::message::{Message, Role};
use crate::state::{ModelSlot, SessionState, TokenStatus};

/// Default number of history entries the truncator retains (§6 config
/// table: `max_message_history`, default 40, range 10-100).
pub const DEFAULT_MAX_MESSAGE_HISTORY: usize = 40;

/// Token-usage band thresholds (§4.4), each validated in `[0.5, 0.95]` by
/// [`crate::config::RuntimeConfig`].
#[derive(Debug, Clone, Copy)]
pub struct TokenThresholds {
    pub info: f32,
    pub warning: f32,
    pub critical: f32,
}

impl Default for TokenThresholds {
    fn default() -> Self {
        Self {
            info: 0.75,
            warning: 0.85,
            critical: 0.95,
        }
    }
}

impl TokenThresholds {
    /// Classify `ratio` into a status band.
    pub fn status(&self, ratio: f32) -> TokenStatus {
        if ratio < self.info {
            TokenStatus::Normal
        } else if ratio < self.warning {
            TokenStatus::Info
        } else if ratio < self.critical {
            TokenStatus::Warning
        } else {
            TokenStatus::Critical
        }
    }
}

/// Drop any assistant message whose tool-call ids are not fully answered by
/// a later Tool message — the API-correctness invariant every history sent
/// to the model must satisfy.
pub fn sanitize_history(messages: &[Message]) -> Vec<Message> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    messages
        .iter()
        .filter(|m| {
            if m.role != Role::Assistant || m.tool_calls.is_empty() {
                return true;
            }
            m.tool_calls.iter().all(|tc| answered.contains(tc.id.as_str()))
        })
        .cloned()
        .collect()
}

/// Keep the last `max_history` entries while preserving every system
/// message and every assistant/tool-call pair: if a retained Tool message's
/// originating Assistant message would fall outside the window, include it
/// anyway.
pub fn truncate_history(messages: &[Message], max_history: usize) -> Vec<Message> {
    if messages.len() <= max_history {
        return messages.to_vec();
    }

    let system: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::System)
        .map(|(i, _)| i)
        .collect();

    let window_start = messages.len() - max_history;
    let mut kept: HashSet<usize> = system.into_iter().collect();
    kept.extend(window_start..messages.len());

    // Pull in the originating Assistant message for any kept Tool message.
    let mut call_to_assistant_index = std::collections::HashMap::new();
    for (i, m) in messages.iter().enumerate() {
        if m.role == Role::Assistant {
            for tc in &m.tool_calls {
                call_to_assistant_index.insert(tc.id.clone(), i);
            }
        }
    }
    let extra: Vec<usize> = kept
        .iter()
        .filter_map(|&i| messages[i].tool_call_id.as_ref())
        .filter_map(|id| call_to_assistant_index.get(id).copied())
        .collect();
    kept.extend(extra);

    let mut indices: Vec<usize> = kept.into_iter().collect();
    indices.sort_unstable();
    indices.into_iter().map(|i| messages[i].clone()).collect()
}

/// Build the system prompt: identity + current UTC timestamp + skill
/// catalog + per-turn dynamic reminders + optional token-usage notice.
pub fn build_system_prompt(
    identity: &str,
    skill_catalog: &str,
    state: &SessionState,
    status: TokenStatus,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(identity);
    prompt.push_str("\n\nCurrent UTC time: ");
    prompt.push_str(&Utc::now().to_rfc3339());

    if !skill_catalog.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(skill_catalog);
    }

    if let Some(skill) = &state.active_skill {
        prompt.push_str(&format!("\n\nActive skill: {skill}"));
    }
    if !state.uploaded_files.is_empty() {
        prompt.push_str(&format!(
            "\n\nThe user has uploaded {} file(s) this session.",
            state.uploaded_files.len()
        ));
    }

    match status {
        TokenStatus::Info => prompt.push_str(
            "\n\n[notice: context usage is moderate; consider wrapping up soon if possible]",
        ),
        TokenStatus::Warning => prompt.push_str(
            "\n\n[notice: context usage is high; the session may be compressed soon]",
        ),
        _ => {}
    }

    prompt
}

/// Pick a model slot for this turn: explicit `model_pref` wins; otherwise a
/// rough capability hint (vision input present, code detected in the latest
/// human turn) selects a specialized slot; else `Base`.
pub fn select_model_slot(state: &SessionState) -> ModelSlot {
    if let Some(pref) = state.model_pref {
        return pref;
    }
    if !state.new_uploaded_files.is_empty()
        && state
            .new_uploaded_files
            .iter()
            .any(|f| f.mime_type.as_deref().is_some_and(|m| m.starts_with("image/")))
    {
        return ModelSlot::Vision;
    }
    if let Some(Message { content, .. }) = state.last_message() {
        if content.contains("```") {
            return ModelSlot::Code;
        }
    }
    ModelSlot::Base
}

/// Outcome of one planner entry: either the new assistant message was
/// produced, or a forced auto-compression ran and the model was not called
/// this turn (caller should persist and route back to `planner` directly).
pub enum PlannerOutcome {
    Advanced(SessionState),
    Compressed(SessionState),
}

/// Dependencies the planner node needs; grouped so call sites don't thread
/// five separate parameters through the driver loop.
pub struct PlannerDeps<'a> {
    pub tools: &'a ToolRegistry,
    pub skills: &'a dyn SkillLookup,
    pub chat_model: &'a dyn ChatModel,
    pub model_slots: &'a ModelSlots,
    pub mentions: &'a MentionClassifier,
    pub identity_prompt: &'a str,
    pub skill_catalog: &'a str,
    pub max_message_history: usize,
    pub thresholds: TokenThresholds,
    pub compression_config: &'a CompressionConfig,
    pub agent_handle_tools: &'a [agent_kernel::registry::ToolRecord],
}

/// Run the planner node once.
#[instrument(skip_all, fields(session = %state.thread_id, loops = state.loops))]
pub async fn run(state: SessionState, deps: PlannerDeps<'_>) -> Result<PlannerOutcome> {
    let mut state = state;

    // 1. Sanitize.
    state.messages = sanitize_history(&state.messages);
    // 2. Truncate.
    state.messages = truncate_history(&state.messages, deps.max_message_history);

    // 3. Classify mentions (consumed and cleared).
    let mentions = std::mem::take(&mut state.mentioned_agents);
    let classification = deps.mentions.classify(&mentions, deps.skills, deps.tools);
    if !classification.agents.is_empty() {
        for record in deps.agent_handle_tools {
            deps.tools.load_on_demand(&record.name);
        }
    }

    // 4. Assemble visibility set: persistent globals + allowed_tools +
    // on-demand-loaded mention tools, deduplicated by name.
    let mut visible: Vec<agent_kernel::registry::ToolRecord> = deps.tools.always_available_records();
    for name in &state.allowed_tools {
        if let Some(record) = deps.tools.get(name) {
            visible.push(record);
        }
    }
    for name in &classification.tools {
        if let Some(record) = deps.tools.get(name) {
            visible.push(record);
        }
    }
    if state.is_subagent() {
        visible.retain(|r| r.name != "delegate_task");
    }
    visible.sort_by(|a, b| a.name.cmp(&b.name));
    visible.dedup_by(|a, b| a.name == b.name);

    // 5. Check token status.
    let model_slot = select_model_slot(&state);
    let model_id = deps.model_slots.model_id(model_slot).to_string();
    let window = context_window_for(&model_id) as f32;
    let ratio = state.cumulative_prompt_tokens as f32 / window;
    let status = deps.thresholds.status(ratio);

    let already_compressed_this_request = state.auto_compressed_this_request;
    state.auto_compressed_this_request = false;

    if status == TokenStatus::Critical {
        if let Some(compress_record) = deps.tools.get("compress_context") {
            deps.tools.load_on_demand(&compress_record.name);
            if !visible.iter().any(|r| r.name == compress_record.name) {
                visible.push(compress_record);
                visible.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }

        if !already_compressed_this_request {
            let strategy = compaction::choose_strategy(
                state.last_compression_ratio,
                state.compacts_since_summarize,
            );
            let outcome = compaction::compress(
                &state.messages,
                deps.chat_model,
                &model_id,
                strategy,
                deps.compression_config,
            )
            .await;

            state.messages = outcome.messages;
            state.cumulative_prompt_tokens = 0;
            state.cumulative_completion_tokens = 0;
            state.compact_count += 1;
            state.last_compression_ratio = Some(outcome.ratio);
            state.auto_compressed_this_request = true;
            match outcome.strategy {
                Some(compaction::Strategy::Summarize) => state.compacts_since_summarize = 0,
                Some(compaction::Strategy::Compact) => state.compacts_since_summarize += 1,
                None => {}
            }
            state.messages.push(Message::system(format!(
                "[auto-compression: ratio {:.2}, compact_count {}]",
                outcome.ratio, state.compact_count
            )));

            warn!(ratio = outcome.ratio, "auto-compression triggered at critical token status");
            return Ok(PlannerOutcome::Compressed(state));
        }

        debug!("critical token status but already compressed this request; binding compression tool instead of compressing again");
    }

    // 6. Build system prompt.
    let system_prompt = build_system_prompt(deps.identity_prompt, deps.skill_catalog, &state, status);

    // 7/8. Invoke chat model with the visibility set bound.
    let tools_bound: Vec<ToolBinding> = visible.iter().map(ToolBinding::from).collect();
    let request = ChatInvocation {
        system_prompt,
        messages: state.messages.clone(),
        tools_bound,
        model_id,
        temperature: 0.7,
        max_tokens: 4096,
    };

    let result = deps
        .chat_model
        .invoke(request)
        .await
        .map_err(AgentError::from)?;

    // 9. Extract usage, update cumulative counters.
    state.cumulative_prompt_tokens += result.usage.prompt_tokens as u64;
    state.cumulative_completion_tokens += result.usage.completion_tokens as u64;

    // 10. Append the new assistant message.
    state.messages.push(result.assistant_message);
    state.loops += 1;

    info!(loops = state.loops, status = ?status, "planner turn complete");
    Ok(PlannerOutcome::Advanced(state))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
