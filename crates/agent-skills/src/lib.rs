//! Skill metadata indexing for the agent core runtime.
//!
//! A skill is a documentation package on disk — a `SKILL.md` file and
//! whatever else lives alongside it — not a bundle of tools. This crate:
//!
//! - **[`parser`]** -- parses a `SKILL.md` file's YAML frontmatter into a
//!   [`SkillDescriptor`], discarding the markdown body.
//! - **[`loader`]** -- scans a directory of skill packages at startup and
//!   checks each one's declared requirements.
//! - **[`registry`]** -- indexes descriptors for `list_meta()`/`get(id)`
//!   lookups and renders a Markdown catalog for the system prompt.
//!
//! Skill *contents* are never loaded into memory here; the model reads a
//! skill's document itself, via a file tool pointed at its indexed path.

pub mod error;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod types;

pub use error::{Result, SkillError};
pub use loader::{check_requirements, default_skills_dir, load_skills_from_dir};
pub use parser::parse_skill_md;
pub use registry::SkillRegistry;
pub use types::{
    SkillDescriptor, SkillMetadata, SkillRequirements, SkillSource, SkillStatus,
};
