//! Classifies `@name` mentions from a user turn into tool / skill /
//! agent-handle / unknown, driving on-demand tool loading.
//!
//! Conceptually this is a tiered classification cascade, the same shape as
//! `openintent-kernel`'s old 3-level intent router (exact match → pattern
//! match → fallback): try the most specific interpretation first, fall
//! through to the next, and treat anything unmatched as a silently-ignored
//! case rather than an error. The matching technique here is simple name
//! lookup rather than text search, since mentions are already tokenized
//! `@name` references, not free text.

use crate::registry::ToolRegistry;

/// Anything the mention classifier needs to know about the skill registry,
/// without depending on its crate directly. `agent-skills`'s `SkillRegistry`
/// implements this.
pub trait SkillLookup {
    /// Whether a skill with this id is known.
    fn contains(&self, id: &str) -> bool;
}

/// Mentions grouped by classification, in the order they were resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionResult {
    /// Names resolved as tools (enabled or discoverable); already
    /// on-demand-loaded into the registry by the time this is returned.
    pub tools: Vec<String>,
    /// Names resolved as skill ids.
    pub skills: Vec<String>,
    /// Names resolved as agent handles (requesting the delegation tool).
    pub agents: Vec<String>,
    /// Names that matched nothing; ignored, never surfaced as an error.
    pub unknown: Vec<String>,
}

/// Classifies `@name` tokens against the tool and skill registries.
pub struct MentionClassifier {
    /// The token that identifies an agent handle, e.g. `"agent"` for `@agent`.
    agent_handle_root: String,
}

impl MentionClassifier {
    /// Create a classifier recognizing `@{agent_handle_root}` as the agent
    /// handle mention.
    pub fn new(agent_handle_root: impl Into<String>) -> Self {
        Self {
            agent_handle_root: agent_handle_root.into(),
        }
    }

    /// Classify a list of `@name` tokens (without the leading `@`).
    ///
    /// Tool mentions are on-demand-loaded into `tools` as a side effect of
    /// classification, per the spec's "classify as tool → on-demand load and
    /// add to visibility" step.
    pub fn classify(
        &self,
        mentions: &[String],
        skills: &dyn SkillLookup,
        tools: &ToolRegistry,
    ) -> MentionResult {
        let mut result = MentionResult::default();

        for name in mentions {
            if name == &self.agent_handle_root {
                result.agents.push(name.clone());
            } else if skills.contains(name) {
                result.skills.push(name.clone());
            } else if tools.is_discovered(name) {
                tools.load_on_demand(name);
                result.tools.push(name.clone());
            } else {
                tracing::trace!(mention = %name, "unknown mention, ignored");
                result.unknown.push(name.clone());
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
