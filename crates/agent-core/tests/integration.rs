//! Integration tests for the agent-core crate.
//!
//! These tests drive the Planner/Tools/Finalizer graph through its public
//! API the way a host process would: build `GraphDeps` from real
//! `agent-kernel`/`agent-store` collaborators, run a session to completion
//! or an interrupt, and for the persistence case, actually close and reopen
//! a SQLite file on disk rather than relying on the in-memory checkpointer.

use std::path::PathBuf;
use std::sync::Mutex;

use agent_core::graph::planner::TokenThresholds;
use agent_core::{
    ApprovalGate, ApprovalResponse, ChatInvocation, ChatInvocationResult, ChatModel,
    ChatModelError, CompressionConfig, Decision, DriverOutcome, GraphDeps, HitlRule,
    InterruptPayload, Message, ModelSlots, Role, SessionState, ToolContext, ToolHandler,
    ToolHandlers, ToolOutcome, Usage,
};
use agent_kernel::mention::{MentionClassifier, SkillLookup};
use agent_kernel::registry::{RiskLevel, ToolMetadata, ToolRecord, ToolRegistry};
use agent_store::{Checkpointer, Database, SqliteCheckpointer};
use async_trait::async_trait;
use serde_json::{json, Value};

struct NoSkills;
impl SkillLookup for NoSkills {
    fn contains(&self, _id: &str) -> bool {
        false
    }
}

/// A chat model that replies with a scripted sequence of messages, falling
/// back to a plain "done" once the script is exhausted.
struct ScriptedChatModel {
    replies: Mutex<Vec<Message>>,
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn invoke(
        &self,
        _request: ChatInvocation,
    ) -> Result<ChatInvocationResult, ChatModelError> {
        let mut replies = self.replies.lock().unwrap();
        let assistant_message = if replies.is_empty() {
            Message::assistant("done")
        } else {
            replies.remove(0)
        };
        Ok(ChatInvocationResult {
            assistant_message,
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        })
    }
}

struct NowTool;
#[async_trait]
impl ToolHandler for NowTool {
    async fn handle(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
        ToolOutcome::Content("12:00 UTC".into())
    }
}

fn default_model_slots() -> ModelSlots {
    ModelSlots {
        base: "base-model".into(),
        reasoning: "base-model".into(),
        vision: "base-model".into(),
        code: "base-model".into(),
        chat: "base-model".into(),
    }
}

fn base_state(thread_id: &str) -> SessionState {
    let mut state = SessionState::new_main(thread_id, PathBuf::from("/tmp/ws"));
    state.messages.push(Message::human("what time is it?"));
    state
}

fn now_registry_and_handlers() -> (ToolRegistry, ToolHandlers) {
    let registry = ToolRegistry::new();
    registry.register_discovered(ToolRecord::new(
        "now",
        "current time",
        json!({"type": "object"}),
        ToolMetadata::always_available("system"),
    ));
    let mut handlers = ToolHandlers::new();
    handlers.insert("now", std::sync::Arc::new(NowTool));
    (registry, handlers)
}

// ═══════════════════════════════════════════════════════════════════════
//  Persistence across a process restart
// ═══════════════════════════════════════════════════════════════════════

/// A run that suspends on a HITL interrupt, persisted to a real SQLite file,
/// must resume correctly after the checkpointer is dropped and a fresh one
/// reopens the same file — simulating a host process restart.
#[tokio::test]
async fn interrupted_run_survives_a_checkpointer_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("agent.db");

    let tool_call = agent_core::ToolCall {
        id: "c1".into(),
        name: "now".into(),
        arguments: json!({}),
    };
    let model = ScriptedChatModel {
        replies: Mutex::new(vec![Message::assistant_tool_calls(vec![tool_call])]),
    };

    let (registry, handlers) = now_registry_and_handlers();
    let gate = ApprovalGate::new(vec![HitlRule {
        tool_pattern: "now".into(),
        argument_pattern: None,
        risk_level: RiskLevel::Low,
        decision: Decision::RequireApproval,
    }]);
    let skills = NoSkills;
    let mentions = MentionClassifier::new("agent");
    let model_slots = default_model_slots();
    let compression_config = CompressionConfig::default();

    let thread_id = "restart-thread";

    {
        let db = Database::open_and_migrate(db_path.clone()).await.unwrap();
        let checkpointer = SqliteCheckpointer::new(db);

        let deps = GraphDeps {
            tools: &registry,
            skills: &skills,
            chat_model: &model,
            model_slots: &model_slots,
            mentions: &mentions,
            identity_prompt: "You are an agent.",
            skill_catalog: "",
            max_message_history: 40,
            thresholds: TokenThresholds::default(),
            compression_config: &compression_config,
            agent_handle_tools: &[],
            handlers: &handlers,
            gate: &gate,
            finalizer_model_id: "base-model",
            finalizer_max_tokens: 500,
            checkpointer: &checkpointer,
        };

        match agent_core::graph::run(base_state(thread_id), &deps).await.unwrap() {
            DriverOutcome::Interrupt(_, InterruptPayload::Approval { tool, .. }) => {
                assert_eq!(tool, "now");
            }
            _ => panic!("expected an approval interrupt"),
        }

        // Checkpointer (and its Database handle) is dropped here, as if the
        // host process had exited.
    }

    // Reopen the same file from a fresh checkpointer and fetch the
    // persisted state directly, the way a host would before resuming.
    let db = Database::open_and_migrate(db_path).await.unwrap();
    let checkpointer = SqliteCheckpointer::new(db);
    let persisted = checkpointer.get(thread_id).await.unwrap();
    assert!(persisted.is_some(), "interrupt must have been persisted before restart");

    let state: SessionState = serde_json::from_value(persisted.unwrap()).unwrap();
    assert!(state.pending_tool_batch.is_some());

    let deps = GraphDeps {
        tools: &registry,
        skills: &skills,
        chat_model: &model,
        model_slots: &model_slots,
        mentions: &mentions,
        identity_prompt: "You are an agent.",
        skill_catalog: "",
        max_message_history: 40,
        thresholds: TokenThresholds::default(),
        compression_config: &compression_config,
        agent_handle_tools: &[],
        handlers: &handlers,
        gate: &gate,
        finalizer_model_id: "base-model",
        finalizer_max_tokens: 500,
        checkpointer: &checkpointer,
    };

    let response = ApprovalResponse {
        approved: true,
        reason: None,
    };
    match agent_core::graph::resume_with_approval(state, response, &deps)
        .await
        .unwrap()
    {
        DriverOutcome::Finished(state) => {
            assert!(state
                .messages
                .iter()
                .any(|m| m.role == Role::Tool && m.content == "12:00 UTC"));
        }
        DriverOutcome::Interrupt(..) => panic!("expected the run to finish after approval"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Persistent-global tools wired through the real registry
// ═══════════════════════════════════════════════════════════════════════

/// `register_builtins` output must be directly usable as a `GraphDeps`
/// handler/registry pair — no adapter glue required between the two crates.
#[tokio::test]
async fn builtins_are_invokable_through_the_full_graph() {
    let registry = ToolRegistry::new();
    let mut handlers = ToolHandlers::new();
    agent_core::builtins::register_builtins(&registry, &mut handlers);

    let tool_call = agent_core::ToolCall {
        id: "c1".into(),
        name: "now".into(),
        arguments: json!({}),
    };
    let model = ScriptedChatModel {
        replies: Mutex::new(vec![Message::assistant_tool_calls(vec![tool_call])]),
    };

    let gate = ApprovalGate::empty();
    let skills = NoSkills;
    let mentions = MentionClassifier::new("agent");
    let model_slots = default_model_slots();
    let compression_config = CompressionConfig::default();
    let checkpointer = agent_store::InMemoryCheckpointer::new();

    let deps = GraphDeps {
        tools: &registry,
        skills: &skills,
        chat_model: &model,
        model_slots: &model_slots,
        mentions: &mentions,
        identity_prompt: "You are an agent.",
        skill_catalog: "",
        max_message_history: 40,
        thresholds: TokenThresholds::default(),
        compression_config: &compression_config,
        agent_handle_tools: &[],
        handlers: &handlers,
        gate: &gate,
        finalizer_model_id: "base-model",
        finalizer_max_tokens: 500,
        checkpointer: &checkpointer,
    };

    match agent_core::graph::run(base_state("builtins-thread"), &deps)
        .await
        .unwrap()
    {
        DriverOutcome::Finished(state) => {
            let tool_msg = state
                .messages
                .iter()
                .find(|m| m.role == Role::Tool)
                .expect("now tool must have run");
            assert!(chrono::DateTime::parse_from_rfc3339(&tool_msg.content).is_ok());
        }
        DriverOutcome::Interrupt(..) => panic!("expected the run to finish"),
    }
}
