//! Skill descriptor types.
//!
//! A skill is a documentation-plus-scripts package on disk: a `SKILL.md`
//! file and whatever supporting files live alongside it. The registry never
//! loads the package's contents into memory — it indexes metadata only, so
//! the planner can tell the model a skill exists and where to read it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a skill package came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SkillSource {
    /// Loaded from a local directory.
    Local(PathBuf),
    /// Built-in / bundled skill with no on-disk directory to scan.
    #[default]
    Builtin,
}

/// Runtime requirements declared by a skill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillRequirements {
    /// Environment variables the skill expects.
    #[serde(default)]
    pub env: Vec<String>,

    /// CLI binaries that must all be installed.
    #[serde(default)]
    pub bins: Vec<String>,

    /// CLI binaries where at least one must exist.
    #[serde(default, rename = "anyBins")]
    pub any_bins: Vec<String>,

    /// Config file paths the skill reads.
    #[serde(default)]
    pub config: Vec<String>,
}

/// Metadata extracted from the YAML frontmatter of a SKILL.md file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Runtime requirements.
    #[serde(default)]
    pub requires: SkillRequirements,

    /// The main credential environment variable for this skill.
    #[serde(rename = "primaryEnv")]
    pub primary_env: Option<String>,

    /// Optional emoji for display.
    pub emoji: Option<String>,

    /// Homepage or repository URL.
    pub homepage: Option<String>,

    /// Author name or handle.
    pub author: Option<String>,

    /// Tags for categorization and search.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Whether a skill's declared requirements are currently satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillStatus {
    /// All requirements satisfied, skill is ready to use.
    Ready,
    /// Some requirements not met, skill may not function correctly.
    Degraded,
    /// Critical requirements missing, skill cannot function.
    Unavailable,
}

/// A skill's indexed descriptor — metadata only, never the document body.
///
/// This is what the registry stores and what the planner reads to build the
/// skill catalog. Reading the actual `SKILL.md` contents is the model's job,
/// via a file-reading tool pointed at `path`; the registry never holds the
/// markdown body in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDescriptor {
    /// Stable identifier used for `@name` mentions and `get(id)` lookups.
    /// Derived from the skill's directory/file name.
    pub id: String,

    /// Human-readable name, from frontmatter (falls back to `id`).
    pub name: String,

    /// Short human-readable description of what the skill does.
    pub description: String,

    /// On-disk path to the skill's entry document (`SKILL.md`).
    pub path: PathBuf,

    /// Whether this skill is currently enabled (offered in the catalog).
    pub enabled: bool,

    /// Whether `metadata.requires` is currently satisfied.
    pub dependencies_installed: bool,

    /// Structured metadata parsed from YAML frontmatter.
    pub metadata: SkillMetadata,

    /// Where this skill was loaded from.
    pub source: SkillSource,
}
