//! The router: a pure function from state to the next node.
//!
//! No I/O, no mutation — this is the one piece of the graph that is plain
//! synchronous logic, kept deliberately small and exhaustively tested since
//! every other node's control flow depends on it being right.

use crate::message::Role;
use crate::state::SessionState;

/// The next node the driver loop should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextNode {
    Planner,
    Tools,
    Finalizer,
}

/// Decide the next node from `state` alone.
///
/// - If the latest message is an Assistant message with unanswered tool
///   calls, route to `tools`.
/// - Else if the latest message is a fresh Human turn, a completed tool
///   batch, or a System message (the auto-compression notice the planner
///   appends when it returns early), and the loop budget allows another
///   iteration, route to `planner`.
/// - Else (a content-only terminal Assistant message, or no messages at
///   all), route to `finalizer`.
///
/// `loops == max_loops` forces the finalizer regardless of pending calls —
/// the loop-budget invariant is enforced here, not in the planner.
pub fn route(state: &SessionState) -> NextNode {
    if state.loops >= state.max_loops {
        return NextNode::Finalizer;
    }

    match state.last_message() {
        Some(msg) if msg.has_pending_tool_calls() => NextNode::Tools,
        Some(msg) if msg.role == Role::Tool || msg.role == Role::Human || msg.role == Role::System => {
            NextNode::Planner
        }
        _ => NextNode::Finalizer,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, ToolCall};
    use std::path::PathBuf;

    fn state_with(messages: Vec<Message>, loops: u32, max_loops: u32) -> SessionState {
        let mut state = SessionState::new_main("t1", PathBuf::from("/tmp/ws"));
        state.messages = messages;
        state.loops = loops;
        state.max_loops = max_loops;
        state
    }

    #[test]
    fn no_messages_routes_to_finalizer() {
        let state = state_with(vec![], 0, 100);
        assert_eq!(route(&state), NextNode::Finalizer);
    }

    #[test]
    fn pending_tool_calls_route_to_tools() {
        let state = state_with(
            vec![Message::assistant_tool_calls(vec![ToolCall {
                id: "tc1".into(),
                name: "now".into(),
                arguments: serde_json::Value::Null,
            }])],
            1,
            100,
        );
        assert_eq!(route(&state), NextNode::Tools);
    }

    #[test]
    fn fresh_human_turn_routes_to_planner() {
        let state = state_with(vec![Message::human("what time is it?")], 0, 100);
        assert_eq!(route(&state), NextNode::Planner);
    }

    #[test]
    fn completed_tool_batch_routes_to_planner() {
        let state = state_with(vec![Message::tool_result("tc1", "12:00 UTC")], 1, 100);
        assert_eq!(route(&state), NextNode::Planner);
    }

    #[test]
    fn content_only_assistant_routes_to_finalizer() {
        let state = state_with(vec![Message::assistant("all done")], 1, 100);
        assert_eq!(route(&state), NextNode::Finalizer);
    }

    #[test]
    fn loop_budget_exhausted_forces_finalizer_even_with_pending_calls() {
        let state = state_with(
            vec![Message::assistant_tool_calls(vec![ToolCall {
                id: "tc1".into(),
                name: "now".into(),
                arguments: serde_json::Value::Null,
            }])],
            100,
            100,
        );
        assert_eq!(route(&state), NextNode::Finalizer);
    }

    #[test]
    fn post_compression_system_notice_routes_back_to_planner() {
        // The planner appends a System auto-compression notice as the last
        // message before returning early without calling the model; the
        // next router entry must send the (now-compressed) history back to
        // the planner, not straight to the finalizer.
        let state = state_with(vec![Message::system("[auto-compression: ratio 0.40, compact_count 1]")], 1, 100);
        assert_eq!(route(&state), NextNode::Planner);
    }

    #[test]
    fn one_loop_short_of_budget_still_routes_normally() {
        let state = state_with(
            vec![Message::assistant_tool_calls(vec![ToolCall {
                id: "tc1".into(),
                name: "now".into(),
                arguments: serde_json::Value::Null,
            }])],
            99,
            100,
        );
        assert_eq!(route(&state), NextNode::Tools);
    }
}
