//! The Delegation Tool: `delegate_task(task, max_loops = 15) -> string`.
//!
//! Invokes the same graph driver on a fresh, isolated [`SessionState`] until
//! it finalizes or interrupts, then folds the result back into a single
//! Tool message for the parent. Per the subagent-isolation invariant, the
//! parent never sees the subagent's intermediate Assistant/Tool messages —
//! only this tool's JSON-encoded return value.
//!
//! Unlike the other graph nodes, this tool is registered once at startup
//! into [`crate::tool::ToolHandlers`] and lives for the process's lifetime,
//! so it cannot borrow the short-lived [`GraphDeps`] the driver loop builds
//! per call. Instead it owns cloned, `Arc`-backed collaborators
//! ([`DelegationDeps`]) and reconstructs a borrowed `GraphDeps` for the
//! duration of each `handle` call.

use std::sync::Arc;

use agent_kernel::mention::{MentionClassifier, SkillLookup};
use agent_kernel::registry::{ToolRecord, ToolRegistry};
use agent_store::Checkpointer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::compaction::CompressionConfig;
use crate::graph::planner::TokenThresholds;
use crate::graph::{self, DriverOutcome, GraphDeps};
use crate::hitl::ApprovalGate;
use crate::llm::{ChatModel, ModelSlots};
use crate::message::Role;
use crate::state::SessionState;
use crate::tool::{InterruptPayload, ToolContext, ToolHandler, ToolHandlers, ToolOutcome};

/// Minimum length of the sub-agent's terminal message before the
/// continuation retry fires (§6 config table: `subagent_min_summary_chars`).
pub const DEFAULT_MIN_SUMMARY_CHARS: usize = 200;

/// The JSON payload `delegate_task` returns to the parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub context_id: String,
    pub loops: u32,
}

#[derive(Debug, Deserialize)]
struct DelegateArgs {
    task: String,
    #[serde(default = "default_max_loops")]
    max_loops: u32,
}

fn default_max_loops() -> u32 {
    SessionState::DEFAULT_SUBAGENT_MAX_LOOPS
}

fn prefix_question(context_id: &str, question: &str) -> String {
    format!("[{context_id}] {question}")
}

/// Everything the delegation tool needs to run its own graph loop, owned
/// rather than borrowed so the tool itself can live in a `'static`
/// [`ToolHandlers`] map. Every field is cheap to clone (`Arc`-backed or a
/// small value type), mirroring how `ToolRegistry`/`ToolHandlers`/
/// `ApprovalGate` are already shared process-wide.
#[derive(Clone)]
pub struct DelegationDeps {
    pub tools: ToolRegistry,
    pub skills: Arc<dyn SkillLookup + Send + Sync>,
    pub chat_model: Arc<dyn ChatModel>,
    pub model_slots: ModelSlots,
    pub mentions: Arc<MentionClassifier>,
    pub identity_prompt: String,
    pub skill_catalog: String,
    pub max_message_history: usize,
    pub thresholds: TokenThresholds,
    pub compression_config: CompressionConfig,
    pub agent_handle_tools: Vec<ToolRecord>,
    pub handlers: ToolHandlers,
    pub gate: ApprovalGate,
    pub finalizer_model_id: String,
    pub finalizer_max_tokens: u32,
    pub checkpointer: Arc<dyn Checkpointer>,
}

impl DelegationDeps {
    fn as_graph_deps(&self) -> GraphDeps<'_> {
        GraphDeps {
            tools: &self.tools,
            skills: self.skills.as_ref(),
            chat_model: self.chat_model.as_ref(),
            model_slots: &self.model_slots,
            mentions: &self.mentions,
            identity_prompt: &self.identity_prompt,
            skill_catalog: &self.skill_catalog,
            max_message_history: self.max_message_history,
            thresholds: self.thresholds,
            compression_config: &self.compression_config,
            agent_handle_tools: &self.agent_handle_tools,
            handlers: &self.handlers,
            gate: &self.gate,
            finalizer_model_id: &self.finalizer_model_id,
            finalizer_max_tokens: self.finalizer_max_tokens,
            checkpointer: self.checkpointer.as_ref(),
        }
    }
}

/// The delegation tool's executable half.
pub struct DelegationTool {
    pub deps: DelegationDeps,
    pub min_summary_chars: usize,
}

impl DelegationTool {
    pub fn new(deps: DelegationDeps) -> Self {
        Self {
            deps,
            min_summary_chars: DEFAULT_MIN_SUMMARY_CHARS,
        }
    }
}

#[async_trait]
impl ToolHandler for DelegationTool {
    #[instrument(skip_all)]
    async fn handle(&self, args: Value, ctx: &ToolContext) -> ToolOutcome {
        let args: DelegateArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(err) => {
                return ToolOutcome::Content(format!(
                    "Error: delegate_task arguments were invalid: {err}"
                ));
            }
        };

        let mut parent = SessionState::new_main(ctx.thread_id.clone(), ctx.workspace_path.clone());
        parent.context_id = ctx.context_id.clone();
        let sub_state = SessionState::new_subagent(&args.task, args.max_loops, &parent);
        let context_id = sub_state.context_id.clone();

        let graph_deps = self.deps.as_graph_deps();
        match run_to_completion(sub_state, &graph_deps, self.min_summary_chars).await {
            Ok(Completion::Finished(result, loops)) => {
                let payload = DelegationResult {
                    ok: true,
                    result: Some(result),
                    error: None,
                    context_id,
                    loops,
                };
                ToolOutcome::Content(serde_json::to_string(&payload).unwrap_or_default())
            }
            Ok(Completion::AskHuman(question, default)) => {
                ToolOutcome::Interrupt(InterruptPayload::AskHuman {
                    question: prefix_question(&context_id, &question),
                    default,
                })
            }
            Err(err) => {
                warn!(%err, context_id = %context_id, "subagent raised before finalizing");
                let payload = DelegationResult {
                    ok: false,
                    result: None,
                    error: Some(err.to_string()),
                    context_id,
                    loops: 0,
                };
                ToolOutcome::Content(serde_json::to_string(&payload).unwrap_or_default())
            }
        }
    }
}

enum Completion {
    Finished(String, u32),
    AskHuman(String, Option<String>),
}

/// Turn a subagent's suspended outcome into a [`Completion::AskHuman`],
/// since the delegation tool cannot resolve an interrupt on its own behalf
/// — a HITL approval request has no subagent-local decider either, so it is
/// surfaced the same way an explicit `ask_human` would be.
fn interrupt_to_completion(payload: InterruptPayload) -> Completion {
    match payload {
        InterruptPayload::Approval { .. } => Completion::AskHuman(
            "a sub-task requires approval to continue; no further detail is available"
                .to_string(),
            None,
        ),
        InterruptPayload::AskHuman { question, default } => Completion::AskHuman(question, default),
    }
}

/// Drive a freshly constructed subagent state to completion, applying the
/// continuation-retry rule (§4.7 step 5) when the terminal message is too
/// short to be a useful summary.
async fn run_to_completion(
    state: SessionState,
    deps: &GraphDeps<'_>,
    min_summary_chars: usize,
) -> crate::error::Result<Completion> {
    let state = match graph::run(state, deps).await? {
        DriverOutcome::Finished(state) => state,
        DriverOutcome::Interrupt(_, payload) => return Ok(interrupt_to_completion(payload)),
    };

    let terminal = state
        .last_message()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();

    if terminal.chars().count() >= min_summary_chars {
        return Ok(Completion::Finished(terminal, state.loops));
    }

    info!(
        context_id = %state.context_id,
        len = terminal.chars().count(),
        "subagent terminal message too short, requesting a structured summary"
    );
    let mut state = state;
    state.messages.push(crate::message::Message::human(
        "Your answer was very brief. Please provide a structured summary: what was done, \
         what was discovered, the results, and any relevant file paths.",
    ));

    let state = match graph::run(state, deps).await? {
        DriverOutcome::Finished(state) => state,
        DriverOutcome::Interrupt(_, payload) => return Ok(interrupt_to_completion(payload)),
    };

    let terminal = state
        .last_message()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();
    Ok(Completion::Finished(terminal, state.loops))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
