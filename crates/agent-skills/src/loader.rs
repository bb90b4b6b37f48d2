//! Skill loader — discovers skills from the filesystem at startup.
//!
//! Skills are stored in directories, each containing a `SKILL.md` file. The
//! loader walks the skills directory and produces [`SkillDescriptor`] values
//! with `dependencies_installed` already resolved; it never reads past the
//! frontmatter.

use std::path::{Path, PathBuf};

use crate::error::{Result, SkillError};
use crate::parser::parse_skill_md;
use crate::types::{SkillDescriptor, SkillRequirements, SkillStatus};

/// Load all skills from the given directory.
///
/// Each subdirectory containing a `SKILL.md` becomes one descriptor, keyed
/// by its directory name. Directories without `SKILL.md`, and any read
/// errors for an individual entry, are logged and skipped rather than
/// failing the whole scan. Returned descriptors are disabled by default;
/// the caller (the registry) decides which to enable.
pub fn load_skills_from_dir(dir: &Path) -> Result<Vec<SkillDescriptor>> {
    if !dir.exists() {
        tracing::debug!(path = %dir.display(), "skills directory does not exist");
        return Ok(Vec::new());
    }

    let mut skills = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(SkillError::Io)?;

    for entry in entries {
        let entry = entry.map_err(SkillError::Io)?;
        let path = entry.path();

        if !path.is_dir() {
            continue;
        }

        let skill_md = path.join("SKILL.md");
        if !skill_md.exists() {
            tracing::trace!(path = %path.display(), "no SKILL.md, skipping");
            continue;
        }

        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match load_skill_from_dir(&path, &id) {
            Ok(skill) => {
                tracing::info!(id = %skill.id, name = %skill.name, "indexed skill");
                skills.push(skill);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load skill");
            }
        }
    }

    tracing::info!(count = skills.len(), dir = %dir.display(), "skills indexed");
    Ok(skills)
}

/// Load a single skill descriptor from a directory, checking its
/// requirements in the same pass.
pub fn load_skill_from_dir(dir: &Path, id: &str) -> Result<SkillDescriptor> {
    let skill_md = dir.join("SKILL.md");
    if !skill_md.exists() {
        return Err(SkillError::NotFound(dir.display().to_string()));
    }

    let content = std::fs::read_to_string(&skill_md)?;
    let mut skill = parse_skill_md(&content, id, &skill_md)?;
    skill.dependencies_installed = check_requirements(&skill.metadata.requires) == SkillStatus::Ready;

    Ok(skill)
}

/// Check whether a skill's declared requirements are currently satisfied.
pub fn check_requirements(req: &SkillRequirements) -> SkillStatus {
    for var in &req.env {
        if std::env::var(var).is_err() {
            tracing::debug!(var = %var, "missing required env var");
            return SkillStatus::Degraded;
        }
    }

    for bin in &req.bins {
        if !binary_exists(bin) {
            tracing::debug!(bin = %bin, "missing required binary");
            return SkillStatus::Unavailable;
        }
    }

    if !req.any_bins.is_empty() && !req.any_bins.iter().any(|b| binary_exists(b)) {
        tracing::debug!(bins = ?req.any_bins, "none of the anyBins found");
        return SkillStatus::Unavailable;
    }

    SkillStatus::Ready
}

/// Check if a binary is available on `PATH`.
fn binary_exists(name: &str) -> bool {
    std::process::Command::new("which")
        .arg(name)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Return the default skills directory path.
///
/// Priority:
/// 1. `$AGENTCORE_SKILLS_DIR` environment variable
/// 2. `./skills/` relative to the current working directory
pub fn default_skills_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTCORE_SKILLS_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("skills")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
