//! Process-wide skill registry.
//!
//! Loads skill metadata once at startup and indexes it for two consumers:
//! the planner, which renders a Markdown catalog into the system prompt,
//! and the mention classifier, which checks `@name` tokens against it.
//! Skills are never re-scanned mid-session; the registry is read-only after
//! [`SkillRegistry::load`] returns.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Result;
use crate::loader::load_skills_from_dir;
use crate::types::SkillDescriptor;

/// Indexes skill descriptors by id.
#[derive(Clone)]
pub struct SkillRegistry {
    skills: Arc<DashMap<String, SkillDescriptor>>,
}

impl SkillRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            skills: Arc::new(DashMap::new()),
        }
    }

    /// Scan `dir` and index every discovered skill, enabled by default.
    ///
    /// This is the only write path outside of tests — it runs once at
    /// startup. A skill whose requirements are unmet is still indexed (so
    /// `list_meta`/`get` can report it), just not marked ready.
    pub fn load(dir: &Path) -> Result<Self> {
        let registry = Self::new();
        for mut skill in load_skills_from_dir(dir)? {
            skill.enabled = true;
            registry.skills.insert(skill.id.clone(), skill);
        }
        Ok(registry)
    }

    /// Insert or replace a descriptor directly (used by tests and by
    /// callers that assemble descriptors from a source other than a
    /// filesystem scan).
    pub fn insert(&self, skill: SkillDescriptor) {
        self.skills.insert(skill.id.clone(), skill);
    }

    /// Metadata for every indexed skill, in no particular order.
    pub fn list_meta(&self) -> Vec<SkillDescriptor> {
        self.skills.iter().map(|e| e.value().clone()).collect()
    }

    /// Look up a single skill by id.
    pub fn get(&self, id: &str) -> Option<SkillDescriptor> {
        self.skills.get(id).map(|e| e.value().clone())
    }

    /// Number of indexed skills.
    pub fn count(&self) -> usize {
        self.skills.len()
    }

    /// Render a Markdown catalog of enabled skills for injection into the
    /// system prompt. Only names, descriptions, and read paths are
    /// surfaced — never the skill's contents.
    pub fn render_catalog(&self) -> String {
        let mut entries: Vec<_> = self
            .skills
            .iter()
            .filter(|e| e.value().enabled)
            .map(|e| e.value().clone())
            .collect();

        if entries.is_empty() {
            return String::new();
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let mut out = String::from("## Available Skills\n\n");
        out.push_str(
            "Mention a skill with `@id` to be reminded where to read it. \
             Read its entry document before using it; this catalog only \
             lists what exists.\n\n",
        );

        for skill in &entries {
            let status = if skill.dependencies_installed {
                ""
            } else {
                " (dependencies not installed)"
            };
            out.push_str(&format!(
                "- **{}** — {}{}\n  path: `{}`\n",
                skill.id,
                skill.description,
                status,
                skill.path.display()
            ));
        }

        out
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl agent_kernel::mention::SkillLookup for SkillRegistry {
    fn contains(&self, id: &str) -> bool {
        self.skills.contains_key(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
