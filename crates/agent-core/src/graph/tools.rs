//! The Tools Node: executes the last assistant message's pending tool calls.
//!
//! Each call passes through the HITL gate before it runs; a call that the
//! gate suspends, or whose handler itself suspends (`ask_human`), stops the
//! batch and returns an [`InterruptPayload`] with the remaining calls parked
//! on [`PendingToolBatch`]. The driver resumes by calling [`resume_approval`]
//! or [`resume_ask_human`], which pick the batch back up exactly where it
//! stopped.
//!
//! Calls run sequentially in emission order, except that a run of
//! consecutive calls which are all `Verdict::Allow` and all marked
//! `concurrency_safe` in their tool metadata executes concurrently via
//! `join_all` — ask_human-capable tools are not expected to be marked
//! concurrency-safe, so an interrupt surfacing mid-run is treated as an
//! error case rather than something this node tries to partially unwind.

use agent_kernel::registry::ToolRegistry;
use futures::future::join_all;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::hitl::{ApprovalGate, ApprovalResponse, Verdict};
use crate::message::Message;
use crate::state::{PendingCall, PendingToolBatch, SessionState, Todo};
use crate::tool::{InterruptPayload, ToolContext, ToolHandlers, ToolOutcome};

/// Dependencies the tools node needs, borrowed for the duration of one call.
pub struct ToolsDeps<'a> {
    pub handlers: &'a ToolHandlers,
    pub gate: &'a ApprovalGate,
    pub registry: &'a ToolRegistry,
}

/// What running (or resuming) a tool batch produced.
pub enum ToolsOutcome {
    /// The whole batch resolved; `state` carries every resulting Tool
    /// message and is ready for the router to send back to the planner.
    Advanced(SessionState),
    /// The batch suspended; `state` carries the parked remainder in
    /// `pending_tool_batch` for the matching `resume_*` call.
    Interrupt(SessionState, InterruptPayload),
}

fn tool_context(state: &SessionState) -> ToolContext {
    ToolContext {
        thread_id: state.thread_id.clone(),
        context_id: state.context_id.clone(),
        workspace_path: state.workspace_path.clone(),
        todos: state.todos.clone(),
    }
}

/// Run a single call's handler, translating its outcome into a Tool message
/// plus an optional state patch and/or interrupt.
async fn execute_one(
    call: &PendingCall,
    deps: &ToolsDeps<'_>,
    ctx: &ToolContext,
) -> (Message, Option<Value>, Option<InterruptPayload>) {
    let Some(handler) = deps.handlers.get(&call.name) else {
        warn!(tool = %call.name, "tool call has no registered handler");
        return (
            Message::tool_result(
                &call.id,
                format!(
                    "Error: `{}` is not a valid tool; use one of the tools listed in your system prompt.",
                    call.name
                ),
            ),
            None,
            None,
        );
    };

    match handler.handle(call.arguments.clone(), ctx).await {
        ToolOutcome::Content(content) => (Message::tool_result(&call.id, content), None, None),
        ToolOutcome::ContentWithPatch {
            content,
            state_patch,
        } => (
            Message::tool_result(&call.id, content),
            Some(state_patch),
            None,
        ),
        ToolOutcome::Interrupt(payload) => (
            Message::tool_result(&call.id, "(awaiting interrupt resolution)"),
            None,
            Some(payload),
        ),
    }
}

/// Merge a tool's state patch into `state`. Only the fields a builtin tool
/// is actually allowed to touch are recognized; anything else in the patch
/// is ignored rather than rejected, since a handler may reasonably send a
/// patch shaped for a future field this runtime doesn't know about yet.
fn apply_state_patch(state: &mut SessionState, patch: Value) {
    if let Some(todos) = patch.get("todos") {
        match serde_json::from_value::<Vec<Todo>>(todos.clone()) {
            Ok(todos) => state.todos = todos,
            Err(err) => warn!(%err, "tool state patch had an unparseable `todos` field"),
        }
    }
    if let Some(active_skill) = patch.get("active_skill") {
        state.active_skill = active_skill.as_str().map(str::to_string);
    }
}

fn is_concurrency_safe(registry: &ToolRegistry, name: &str) -> bool {
    registry
        .metadata(name)
        .map(|m| m.concurrency_safe)
        .unwrap_or(false)
}

fn fresh_batch(state: &SessionState) -> PendingToolBatch {
    let calls = state
        .last_message()
        .map(|msg| {
            msg.tool_calls
                .iter()
                .map(|tc| PendingCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    PendingToolBatch {
        remaining: calls,
        completed: Vec::new(),
    }
}

/// Process a tool-call batch (fresh, or resumed from a prior interrupt)
/// until it either finishes or suspends again.
#[instrument(skip_all, fields(session = %state.thread_id))]
pub async fn run(mut state: SessionState, deps: ToolsDeps<'_>) -> ToolsOutcome {
    let mut batch = state.pending_tool_batch.take().unwrap_or_else(|| fresh_batch(&state));

    loop {
        let Some(front) = batch.remaining.first().cloned() else {
            break;
        };

        match deps.gate.evaluate(&front.name, &front.arguments) {
            Verdict::Deny => {
                batch.completed.push(Message::tool_result(
                    &front.id,
                    format!("Denied by policy: `{}` is not permitted.", front.name),
                ));
                batch.remaining.remove(0);
            }
            Verdict::RequireApproval(risk) => {
                state.pending_tool_batch = Some(batch);
                return ToolsOutcome::Interrupt(
                    state,
                    InterruptPayload::Approval {
                        tool: front.name,
                        args: front.arguments,
                        risk,
                    },
                );
            }
            Verdict::Allow => {
                if is_concurrency_safe(deps.registry, &front.name) {
                    let mut run_calls = vec![front.clone()];
                    for next in batch.remaining.iter().skip(1) {
                        let allowed =
                            matches!(deps.gate.evaluate(&next.name, &next.arguments), Verdict::Allow);
                        if allowed && is_concurrency_safe(deps.registry, &next.name) {
                            run_calls.push(next.clone());
                        } else {
                            break;
                        }
                    }

                    let ctx = tool_context(&state);
                    let results = join_all(run_calls.iter().map(|c| execute_one(c, &deps, &ctx))).await;

                    for (msg, patch, interrupt) in results {
                        if let Some(payload) = interrupt {
                            state.pending_tool_batch = Some(batch);
                            return ToolsOutcome::Interrupt(state, payload);
                        }
                        if let Some(patch) = patch {
                            apply_state_patch(&mut state, patch);
                        }
                        batch.completed.push(msg);
                    }
                    batch.remaining.drain(0..run_calls.len());
                } else {
                    let ctx = tool_context(&state);
                    let (msg, patch, interrupt) = execute_one(&front, &deps, &ctx).await;
                    if let Some(payload) = interrupt {
                        state.pending_tool_batch = Some(batch);
                        return ToolsOutcome::Interrupt(state, payload);
                    }
                    if let Some(patch) = patch {
                        apply_state_patch(&mut state, patch);
                    }
                    batch.completed.push(msg);
                    batch.remaining.remove(0);
                }
            }
        }
    }

    state.messages.extend(batch.completed);
    ToolsOutcome::Advanced(state)
}

/// Resume a batch suspended on a HITL `Approval` interrupt.
pub async fn resume_approval(
    mut state: SessionState,
    response: ApprovalResponse,
    deps: ToolsDeps<'_>,
) -> ToolsOutcome {
    let Some(mut batch) = state.pending_tool_batch.take() else {
        return ToolsOutcome::Advanced(state);
    };
    let Some(front) = batch.remaining.first().cloned() else {
        return ToolsOutcome::Advanced(state);
    };

    if response.approved {
        let ctx = tool_context(&state);
        let (msg, patch, interrupt) = execute_one(&front, &deps, &ctx).await;
        if let Some(payload) = interrupt {
            state.pending_tool_batch = Some(batch);
            return ToolsOutcome::Interrupt(state, payload);
        }
        if let Some(patch) = patch {
            apply_state_patch(&mut state, patch);
        }
        batch.completed.push(msg);
    } else {
        let reason = response.reason.unwrap_or_else(|| "no reason given".to_string());
        batch
            .completed
            .push(Message::tool_result(&front.id, format!("Denied by user: {reason}")));
    }

    batch.remaining.remove(0);
    state.pending_tool_batch = Some(batch);
    Box::pin(run(state, deps)).await
}

/// Resume a batch suspended on a tool-handler `AskHuman` interrupt, feeding
/// the human's reply back as the matching Tool message's content.
pub async fn resume_ask_human(
    mut state: SessionState,
    reply: String,
    deps: ToolsDeps<'_>,
) -> ToolsOutcome {
    let Some(mut batch) = state.pending_tool_batch.take() else {
        return ToolsOutcome::Advanced(state);
    };
    let Some(front) = batch.remaining.first().cloned() else {
        return ToolsOutcome::Advanced(state);
    };

    batch.completed.push(Message::tool_result(&front.id, reply));
    batch.remaining.remove(0);
    state.pending_tool_batch = Some(batch);
    Box::pin(run(state, deps)).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hitl::{Decision, HitlRule};
    use crate::message::ToolCall;
    use agent_kernel::registry::{RiskLevel, ToolMetadata, ToolRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl crate::tool::ToolHandler for EchoTool {
        async fn handle(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
            ToolOutcome::Content(format!("echo:{args}"))
        }
    }

    struct AskHumanTool;

    #[async_trait]
    impl crate::tool::ToolHandler for AskHumanTool {
        async fn handle(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
            ToolOutcome::Interrupt(InterruptPayload::AskHuman {
                question: "continue?".into(),
                default: None,
            })
        }
    }

    struct TodoWriteTool;

    #[async_trait]
    impl crate::tool::ToolHandler for TodoWriteTool {
        async fn handle(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
            ToolOutcome::ContentWithPatch {
                content: "ok".into(),
                state_patch: json!({"todos": [{"id": "1", "content": "x", "status": "pending", "priority": 1}]}),
            }
        }
    }

    fn registry_with(names: &[(&str, bool)]) -> ToolRegistry {
        let registry = ToolRegistry::new();
        for (name, concurrency_safe) in names {
            let mut metadata = ToolMetadata::always_available("test");
            if *concurrency_safe {
                metadata = metadata.concurrency_safe();
            }
            registry.register_discovered(ToolRecord::new(*name, "", json!({}), metadata));
        }
        registry
    }

    fn state_with_calls(calls: Vec<(&str, &str)>) -> SessionState {
        let mut state = SessionState::new_main("t1", PathBuf::from("/tmp/ws"));
        state.messages.push(Message::assistant_tool_calls(
            calls
                .into_iter()
                .map(|(id, name)| ToolCall {
                    id: id.into(),
                    name: name.into(),
                    arguments: json!({}),
                })
                .collect(),
        ));
        state
    }

    #[tokio::test]
    async fn allowed_call_produces_tool_message() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("echo", Arc::new(EchoTool));
        let registry = registry_with(&[("echo", false)]);
        let gate = ApprovalGate::empty();
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };

        let state = state_with_calls(vec![("c1", "echo")]);
        match run(state, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert_eq!(state.messages.len(), 2);
                assert_eq!(state.messages[1].tool_call_id.as_deref(), Some("c1"));
                assert!(state.messages[1].content.starts_with("echo:"));
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_produces_error_message_not_panic() {
        let handlers = ToolHandlers::new();
        let registry = ToolRegistry::new();
        let gate = ApprovalGate::empty();
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };

        let state = state_with_calls(vec![("c1", "nonexistent")]);
        match run(state, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert!(state.messages[1].content.contains("not a valid tool"));
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn denied_call_produces_denial_message_without_invoking_handler() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("danger", Arc::new(EchoTool));
        let registry = registry_with(&[("danger", false)]);
        let gate = ApprovalGate::new(vec![HitlRule {
            tool_pattern: "danger".into(),
            argument_pattern: None,
            risk_level: RiskLevel::Critical,
            decision: Decision::AlwaysDeny,
        }]);
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };

        let state = state_with_calls(vec![("c1", "danger")]);
        match run(state, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert!(state.messages[1].content.starts_with("Denied by policy"));
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn require_approval_suspends_with_batch_parked() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("risky", Arc::new(EchoTool));
        let registry = registry_with(&[("risky", false)]);
        let gate = ApprovalGate::new(vec![HitlRule {
            tool_pattern: "risky".into(),
            argument_pattern: None,
            risk_level: RiskLevel::High,
            decision: Decision::RequireApproval,
        }]);
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };

        let state = state_with_calls(vec![("c1", "risky")]);
        match run(state, deps).await {
            ToolsOutcome::Interrupt(state, InterruptPayload::Approval { tool, risk, .. }) => {
                assert_eq!(tool, "risky");
                assert_eq!(risk, RiskLevel::High);
                let batch = state.pending_tool_batch.expect("batch parked");
                assert_eq!(batch.remaining.len(), 1);
            }
            ToolsOutcome::Advanced(_) => panic!("expected interrupt"),
        }
    }

    #[tokio::test]
    async fn resume_approval_approved_executes_and_continues() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("risky", Arc::new(EchoTool));
        let registry = registry_with(&[("risky", false)]);
        let gate = ApprovalGate::new(vec![HitlRule {
            tool_pattern: "risky".into(),
            argument_pattern: None,
            risk_level: RiskLevel::High,
            decision: Decision::RequireApproval,
        }]);

        let state = state_with_calls(vec![("c1", "risky")]);
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };
        let state = match run(state, deps).await {
            ToolsOutcome::Interrupt(state, _) => state,
            ToolsOutcome::Advanced(_) => panic!("expected interrupt"),
        };

        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };
        match resume_approval(state, ApprovalResponse { approved: true, reason: None }, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert!(state.pending_tool_batch.is_none());
                assert!(state.messages[1].content.starts_with("echo:"));
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn resume_approval_denied_produces_denial_message() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("risky", Arc::new(EchoTool));
        let registry = registry_with(&[("risky", false)]);
        let gate = ApprovalGate::new(vec![HitlRule {
            tool_pattern: "risky".into(),
            argument_pattern: None,
            risk_level: RiskLevel::High,
            decision: Decision::RequireApproval,
        }]);

        let state = state_with_calls(vec![("c1", "risky")]);
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };
        let state = match run(state, deps).await {
            ToolsOutcome::Interrupt(state, _) => state,
            ToolsOutcome::Advanced(_) => panic!("expected interrupt"),
        };

        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };
        let reason = Some("too risky".to_string());
        match resume_approval(state, ApprovalResponse { approved: false, reason }, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert!(state.messages[1].content.contains("Denied by user: too risky"));
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn ask_human_interrupt_and_resume_round_trips_reply() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("ask_human", Arc::new(AskHumanTool));
        let registry = registry_with(&[("ask_human", false)]);
        let gate = ApprovalGate::empty();

        let state = state_with_calls(vec![("c1", "ask_human")]);
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };
        let state = match run(state, deps).await {
            ToolsOutcome::Interrupt(state, InterruptPayload::AskHuman { question, .. }) => {
                assert_eq!(question, "continue?");
                state
            }
            _ => panic!("expected ask_human interrupt"),
        };

        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };
        match resume_ask_human(state, "yes".to_string(), deps).await {
            ToolsOutcome::Advanced(state) => {
                assert_eq!(state.messages[1].content, "yes");
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn concurrency_safe_run_executes_together_and_both_produce_messages() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("echo", Arc::new(EchoTool));
        let registry = registry_with(&[("echo", true)]);
        let gate = ApprovalGate::empty();
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };

        let state = state_with_calls(vec![("c1", "echo"), ("c2", "echo")]);
        match run(state, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert_eq!(state.messages.len(), 3);
                assert_eq!(state.messages[1].tool_call_id.as_deref(), Some("c1"));
                assert_eq!(state.messages[2].tool_call_id.as_deref(), Some("c2"));
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }

    #[tokio::test]
    async fn state_patch_from_handler_is_merged() {
        let mut handlers = ToolHandlers::new();
        handlers.insert("todo_write", Arc::new(TodoWriteTool));
        let registry = registry_with(&[("todo_write", false)]);
        let gate = ApprovalGate::empty();
        let deps = ToolsDeps {
            handlers: &handlers,
            gate: &gate,
            registry: &registry,
        };

        let state = state_with_calls(vec![("c1", "todo_write")]);
        match run(state, deps).await {
            ToolsOutcome::Advanced(state) => {
                assert_eq!(state.todos.len(), 1);
                assert_eq!(state.todos[0].content, "x");
            }
            ToolsOutcome::Interrupt(..) => panic!("expected advanced outcome"),
        }
    }
}
