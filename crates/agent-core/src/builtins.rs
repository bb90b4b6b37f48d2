//! Persistent-global tools: always visible, never on-demand-loaded.
//!
//! `now`, `todo_read`, `todo_write`, and `ask_human` are the four tools every
//! assembled visibility set starts from, before `allowed_tools` and mention
//! classification add anything else. `register_builtins` binds all four into
//! both a [`ToolRegistry`] (descriptors, for the planner's visibility set)
//! and a [`ToolHandlers`] map (executables, for the tools node) in one call,
//! since the two always need to agree on the same four names.

use std::sync::Arc;

use agent_kernel::registry::{ToolMetadata, ToolRecord, ToolRegistry};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::{Todo, TodoStatus};
use crate::tool::{InterruptPayload, ToolContext, ToolHandler, ToolHandlers, ToolOutcome};

/// Register the four persistent-global tools into `registry` and `handlers`.
pub fn register_builtins(registry: &ToolRegistry, handlers: &mut ToolHandlers) {
    registry.register_discovered(ToolRecord::new(
        "now",
        "Get the current UTC date and time.",
        json!({"type": "object", "properties": {}}),
        ToolMetadata::always_available("system").concurrency_safe(),
    ));
    handlers.insert("now", Arc::new(NowTool));

    registry.register_discovered(ToolRecord::new(
        "todo_read",
        "Read the session's current TODO list.",
        json!({"type": "object", "properties": {}}),
        ToolMetadata::always_available("system").concurrency_safe(),
    ));
    handlers.insert("todo_read", Arc::new(TodoReadTool));

    registry.register_discovered(ToolRecord::new(
        "todo_write",
        "Replace the session's TODO list with a new ordered set of items.",
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "content": {"type": "string"},
                            "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
                            "priority": {"type": "integer"}
                        },
                        "required": ["id", "content", "status", "priority"]
                    }
                }
            },
            "required": ["todos"]
        }),
        ToolMetadata::always_available("system"),
    ));
    handlers.insert("todo_write", Arc::new(TodoWriteTool));

    registry.register_discovered(ToolRecord::new(
        "ask_human",
        "Ask the user a clarifying question and wait for their reply.",
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"},
                "default": {"type": "string"}
            },
            "required": ["question"]
        }),
        ToolMetadata::always_available("system"),
    ));
    handlers.insert("ask_human", Arc::new(AskHumanTool));
}

struct NowTool;

#[async_trait]
impl ToolHandler for NowTool {
    async fn handle(&self, _args: Value, _ctx: &ToolContext) -> ToolOutcome {
        ToolOutcome::Content(Utc::now().to_rfc3339())
    }
}

struct TodoReadTool;

#[async_trait]
impl ToolHandler for TodoReadTool {
    async fn handle(&self, _args: Value, ctx: &ToolContext) -> ToolOutcome {
        ToolOutcome::Content(serde_json::to_string(&ctx.todos).unwrap_or_else(|_| "[]".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TodoWriteArgs {
    todos: Vec<Todo>,
}

struct TodoWriteTool;

#[async_trait]
impl ToolHandler for TodoWriteTool {
    async fn handle(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        let args: TodoWriteArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(err) => {
                return ToolOutcome::Content(format!("Error: todo_write arguments were invalid: {err}"));
            }
        };

        let pending = args
            .todos
            .iter()
            .filter(|t| t.status == TodoStatus::Pending)
            .count();
        let in_progress = args
            .todos
            .iter()
            .filter(|t| t.status == TodoStatus::InProgress)
            .count();
        let completed = args.todos.len() - pending - in_progress;

        ToolOutcome::ContentWithPatch {
            content: format!(
                "Updated TODO list: {} pending, {} in progress, {} completed.",
                pending, in_progress, completed
            ),
            state_patch: json!({ "todos": args.todos }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AskHumanArgs {
    question: String,
    #[serde(default)]
    default: Option<String>,
}

struct AskHumanTool;

#[async_trait]
impl ToolHandler for AskHumanTool {
    async fn handle(&self, args: Value, _ctx: &ToolContext) -> ToolOutcome {
        match serde_json::from_value::<AskHumanArgs>(args) {
            Ok(args) => ToolOutcome::Interrupt(InterruptPayload::AskHuman {
                question: args.question,
                default: args.default,
            }),
            Err(err) => ToolOutcome::Content(format!("Error: ask_human arguments were invalid: {err}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx(todos: Vec<Todo>) -> ToolContext {
        ToolContext {
            thread_id: "t1".into(),
            context_id: "main".into(),
            workspace_path: PathBuf::from("/tmp/ws"),
            todos,
        }
    }

    #[tokio::test]
    async fn now_returns_an_rfc3339_timestamp() {
        match NowTool.handle(json!({}), &ctx(Vec::new())).await {
            ToolOutcome::Content(content) => {
                assert!(chrono::DateTime::parse_from_rfc3339(&content).is_ok());
            }
            _ => panic!("expected content outcome"),
        }
    }

    #[tokio::test]
    async fn todo_read_returns_current_snapshot() {
        let todos = vec![Todo {
            id: "1".into(),
            content: "write tests".into(),
            status: TodoStatus::InProgress,
            priority: 2,
        }];
        match TodoReadTool.handle(json!({}), &ctx(todos)).await {
            ToolOutcome::Content(content) => assert!(content.contains("write tests")),
            _ => panic!("expected content outcome"),
        }
    }

    #[tokio::test]
    async fn todo_write_produces_a_patch_not_a_direct_mutation() {
        let args = json!({
            "todos": [
                {"id": "1", "content": "a", "status": "completed", "priority": 1},
                {"id": "2", "content": "b", "status": "pending", "priority": 2}
            ]
        });
        match TodoWriteTool.handle(args, &ctx(Vec::new())).await {
            ToolOutcome::ContentWithPatch { content, state_patch } => {
                assert!(content.contains("1 pending"));
                assert!(content.contains("1 completed"));
                assert_eq!(state_patch["todos"].as_array().unwrap().len(), 2);
            }
            _ => panic!("expected content-with-patch outcome"),
        }
    }

    #[tokio::test]
    async fn todo_write_invalid_arguments_produce_an_error_string() {
        match TodoWriteTool.handle(json!({"nope": true}), &ctx(Vec::new())).await {
            ToolOutcome::Content(content) => assert!(content.starts_with("Error:")),
            _ => panic!("expected content outcome"),
        }
    }

    #[tokio::test]
    async fn ask_human_produces_an_interrupt() {
        let args = json!({"question": "which file?", "default": "main.rs"});
        match AskHumanTool.handle(args, &ctx(Vec::new())).await {
            ToolOutcome::Interrupt(InterruptPayload::AskHuman { question, default }) => {
                assert_eq!(question, "which file?");
                assert_eq!(default.as_deref(), Some("main.rs"));
            }
            _ => panic!("expected an ask_human interrupt"),
        }
    }

    #[tokio::test]
    async fn register_builtins_binds_all_four_names() {
        let registry = ToolRegistry::new();
        let mut handlers = ToolHandlers::new();
        register_builtins(&registry, &mut handlers);

        for name in ["now", "todo_read", "todo_write", "ask_human"] {
            assert!(registry.is_discovered(name), "{name} not discovered");
            assert!(registry.always_available_records().iter().any(|r| r.name == name));
            assert!(handlers.get(name).is_some(), "{name} has no handler");
        }
    }
}
