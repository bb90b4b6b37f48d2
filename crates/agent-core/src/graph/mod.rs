//! The graph driver: ties the router, Planner, Tools, and Finalizer nodes
//! into one cooperative loop, persisting a checkpoint after every node
//! transition.
//!
//! Control flow: `Planner -> (compress?) -> Tools -> Planner -> ... ->
//! Finalizer -> end`. The loop suspends (returns [`DriverOutcome::Interrupt`]
//! instead of looping) whenever the Tools node reports a HITL or
//! `ask_human` interrupt; the host resumes later via [`resume_with_approval`]
//! or [`resume_with_human_reply`], which pick the suspended tool batch back
//! up and continue the same loop.
//!
//! Per the concurrency model, there is no partial progress within a node:
//! a checkpoint is only written once a node returns, so a cancelled or
//! crashed run always resumes from the boundary between two nodes, never
//! mid-node.

pub mod finalizer;
pub mod planner;
pub mod router;
pub mod tools;

use agent_kernel::mention::{MentionClassifier, SkillLookup};
use agent_kernel::registry::{ToolRecord, ToolRegistry};
use agent_store::Checkpointer;
use tracing::instrument;

use crate::compaction::CompressionConfig;
use crate::error::{AgentError, Result};
use crate::hitl::{ApprovalGate, ApprovalResponse};
use crate::llm::{ChatModel, ModelSlots};
use crate::state::SessionState;
use crate::tool::{InterruptPayload, ToolHandlers};
use finalizer::FinalizerDeps;
use planner::{PlannerDeps, TokenThresholds};
use router::NextNode;
use tools::ToolsDeps;

/// Every dependency the graph driver needs for the lifetime of one call.
/// Node-local `*Deps` structs are built from this on each iteration — all
/// fields are shared references, so rebuilding them per node is free.
pub struct GraphDeps<'a> {
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
    pub agent_handle_tools: &'a [ToolRecord],
    pub handlers: &'a ToolHandlers,
    pub gate: &'a ApprovalGate,
    pub finalizer_model_id: &'a str,
    pub finalizer_max_tokens: u32,
    pub checkpointer: &'a dyn Checkpointer,
}

impl<'a> GraphDeps<'a> {
    fn planner_deps(&self) -> PlannerDeps<'a> {
        PlannerDeps {
            tools: self.tools,
            skills: self.skills,
            chat_model: self.chat_model,
            model_slots: self.model_slots,
            mentions: self.mentions,
            identity_prompt: self.identity_prompt,
            skill_catalog: self.skill_catalog,
            max_message_history: self.max_message_history,
            thresholds: self.thresholds,
            compression_config: self.compression_config,
            agent_handle_tools: self.agent_handle_tools,
        }
    }

    fn tools_deps(&self) -> ToolsDeps<'a> {
        ToolsDeps {
            handlers: self.handlers,
            gate: self.gate,
            registry: self.tools,
        }
    }

    fn finalizer_deps(&self) -> FinalizerDeps<'a> {
        FinalizerDeps {
            chat_model: self.chat_model,
            model_id: self.finalizer_model_id,
            max_tokens: self.finalizer_max_tokens,
        }
    }
}

/// What one call into the driver loop produced.
pub enum DriverOutcome {
    /// The finalizer ran (or was a no-op); the session is at rest.
    Finished(SessionState),
    /// The loop suspended at a HITL or `ask_human` interrupt.
    Interrupt(SessionState, InterruptPayload),
}

async fn persist(deps: &GraphDeps<'_>, node: &str, state: &SessionState) -> Result<()> {
    let value = serde_json::to_value(state)?;
    deps.checkpointer
        .put(&state.thread_id, node, &value)
        .await
        .map_err(AgentError::from)?;
    Ok(())
}

/// Drive `state` forward until it finishes or suspends on an interrupt.
#[instrument(skip_all, fields(session = %state.thread_id))]
pub async fn run(mut state: SessionState, deps: &GraphDeps<'_>) -> Result<DriverOutcome> {
    loop {
        match router::route(&state) {
            NextNode::Tools => match tools::run(state, deps.tools_deps()).await {
                tools::ToolsOutcome::Advanced(new_state) => {
                    persist(deps, "tools", &new_state).await?;
                    state = new_state;
                }
                tools::ToolsOutcome::Interrupt(new_state, payload) => {
                    persist(deps, "tools", &new_state).await?;
                    return Ok(DriverOutcome::Interrupt(new_state, payload));
                }
            },
            NextNode::Planner => {
                let outcome = planner::run(state, deps.planner_deps()).await?;
                state = match outcome {
                    planner::PlannerOutcome::Advanced(s) | planner::PlannerOutcome::Compressed(s) => s,
                };
                persist(deps, "planner", &state).await?;
            }
            NextNode::Finalizer => {
                state = finalizer::run(state, deps.finalizer_deps()).await?;
                persist(deps, "finalizer", &state).await?;
                return Ok(DriverOutcome::Finished(state));
            }
        }
    }
}

/// Resume a run suspended on a HITL [`InterruptPayload::Approval`].
pub async fn resume_with_approval(
    state: SessionState,
    response: ApprovalResponse,
    deps: &GraphDeps<'_>,
) -> Result<DriverOutcome> {
    match tools::resume_approval(state, response, deps.tools_deps()).await {
        tools::ToolsOutcome::Advanced(new_state) => {
            persist(deps, "tools", &new_state).await?;
            Box::pin(run(new_state, deps)).await
        }
        tools::ToolsOutcome::Interrupt(new_state, payload) => {
            persist(deps, "tools", &new_state).await?;
            Ok(DriverOutcome::Interrupt(new_state, payload))
        }
    }
}

/// Resume a run suspended on an [`InterruptPayload::AskHuman`] (whether
/// raised by the HITL gate's own `ask_human` builtin, or by any other tool
/// handler that requested one).
pub async fn resume_with_human_reply(
    state: SessionState,
    reply: String,
    deps: &GraphDeps<'_>,
) -> Result<DriverOutcome> {
    match tools::resume_ask_human(state, reply, deps.tools_deps()).await {
        tools::ToolsOutcome::Advanced(new_state) => {
            persist(deps, "tools", &new_state).await?;
            Box::pin(run(new_state, deps)).await
        }
        tools::ToolsOutcome::Interrupt(new_state, payload) => {
            persist(deps, "tools", &new_state).await?;
            Ok(DriverOutcome::Interrupt(new_state, payload))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
