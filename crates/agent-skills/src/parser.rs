//! SKILL.md parser.
//!
//! A SKILL.md file consists of:
//! 1. YAML frontmatter delimited by `---` lines.
//! 2. A markdown body containing instructions for the LLM.
//!
//! Only the frontmatter is indexed into a [`SkillDescriptor`]; the body is
//! read by the model itself via a file tool, never loaded into registry
//! state.
//!
//! ```text
//! ---
//! name: my-skill
//! description: Does something useful.
//! metadata:
//!   requires:
//!     env:
//!       - MY_API_KEY
//!     bins:
//!       - curl
//!   primaryEnv: MY_API_KEY
//! ---
//!
//! # My Skill
//!
//! Instructions for the LLM go here...
//! ```

use std::path::Path;

use crate::error::{Result, SkillError};
use crate::types::{SkillDescriptor, SkillMetadata, SkillRequirements, SkillSource};

/// Raw YAML frontmatter structure.
#[derive(Debug, serde::Deserialize)]
struct RawFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    metadata: Option<RawMetadataWrapper>,
    // Direct fields (simplified, non-nested format).
    author: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    emoji: Option<String>,
    homepage: Option<String>,
    requires: Option<RawRequirements>,
    #[serde(rename = "primaryEnv")]
    primary_env: Option<String>,
}

/// Wrapper for the nested `metadata` structure.
#[derive(Debug, serde::Deserialize)]
struct RawMetadataWrapper {
    requires: Option<RawRequirements>,
    #[serde(rename = "primaryEnv")]
    primary_env: Option<String>,
    emoji: Option<String>,
    homepage: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RawRequirements {
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    bins: Vec<String>,
    #[serde(default, rename = "anyBins")]
    any_bins: Vec<String>,
    #[serde(default)]
    config: Vec<String>,
}

/// Split a SKILL.md file into YAML frontmatter and markdown body.
///
/// Returns `(yaml_str, markdown_body)`.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.trim_start();

    if !content.starts_with("---") {
        return None;
    }

    let after_first = &content[3..];
    let end = after_first.find("\n---")?;
    let yaml = after_first[..end].trim();
    let body = after_first[end + 4..].trim_start_matches(['\n', '\r']);

    Some((yaml, body))
}

/// Parse a SKILL.md file's frontmatter into a [`SkillDescriptor`].
///
/// `id` is the stable identifier used for mentions and registry lookups —
/// normally the skill's containing directory name. The markdown body is
/// discarded here; it stays on disk at `source_path` for the model to read.
pub fn parse_skill_md(content: &str, id: &str, source_path: &Path) -> Result<SkillDescriptor> {
    let (yaml_str, _body) = split_frontmatter(content).ok_or_else(|| SkillError::InvalidFormat {
        path: source_path.to_path_buf(),
        reason: "missing YAML frontmatter (must start with ---)".into(),
    })?;

    let frontmatter: RawFrontmatter =
        parse_yaml_via_json(yaml_str).map_err(|e| SkillError::InvalidFormat {
            path: source_path.to_path_buf(),
            reason: format!("YAML parse error: {e}"),
        })?;

    let name = frontmatter.name.clone().unwrap_or_else(|| id.to_owned());

    let description = frontmatter
        .description
        .clone()
        .unwrap_or_else(|| format!("Skill: {name}"));

    let (requires, primary_env, emoji, homepage) =
        if let Some(ref meta_wrapper) = frontmatter.metadata {
            let req = meta_wrapper
                .requires
                .as_ref()
                .map_or_else(SkillRequirements::default, |r| SkillRequirements {
                    env: r.env.clone(),
                    bins: r.bins.clone(),
                    any_bins: r.any_bins.clone(),
                    config: r.config.clone(),
                });
            (
                req,
                meta_wrapper.primary_env.clone().or(frontmatter.primary_env),
                meta_wrapper.emoji.clone().or(frontmatter.emoji),
                meta_wrapper.homepage.clone().or(frontmatter.homepage),
            )
        } else {
            resolve_flat_metadata(&frontmatter)
        };

    let metadata = SkillMetadata {
        requires,
        primary_env,
        emoji,
        homepage,
        author: frontmatter.author,
        tags: frontmatter.tags.unwrap_or_default(),
    };

    Ok(SkillDescriptor {
        id: id.to_owned(),
        name,
        description,
        path: source_path.to_path_buf(),
        enabled: false,
        dependencies_installed: false,
        metadata,
        source: SkillSource::Local(source_path.to_path_buf()),
    })
}

fn resolve_flat_metadata(
    fm: &RawFrontmatter,
) -> (
    SkillRequirements,
    Option<String>,
    Option<String>,
    Option<String>,
) {
    let requires = fm
        .requires
        .as_ref()
        .map_or_else(SkillRequirements::default, |r| SkillRequirements {
            env: r.env.clone(),
            bins: r.bins.clone(),
            any_bins: r.any_bins.clone(),
            config: r.config.clone(),
        });
    (
        requires,
        fm.primary_env.clone(),
        fm.emoji.clone(),
        fm.homepage.clone(),
    )
}

// ---------------------------------------------------------------------------
// Minimal YAML parser (avoids a serde_yaml dependency)
// ---------------------------------------------------------------------------

/// Parse a simple YAML string by converting it to JSON first.
///
/// This handles the subset of YAML used in SKILL.md frontmatter: simple
/// key-value pairs, nested objects, and string lists (`- item` or inline
/// `[a, b]`). It is not a general YAML parser.
fn parse_yaml_via_json<T: serde::de::DeserializeOwned>(
    yaml: &str,
) -> std::result::Result<T, String> {
    let json = yaml_to_json(yaml)?;
    serde_json::from_str(&json).map_err(|e| e.to_string())
}

fn yaml_to_json(yaml: &str) -> std::result::Result<String, String> {
    let mut root = serde_json::Map::new();
    parse_yaml_block(yaml, &mut root, 0)?;
    Ok(serde_json::Value::Object(root).to_string())
}

fn parse_yaml_block(
    yaml: &str,
    map: &mut serde_json::Map<String, serde_json::Value>,
    base_indent: usize,
) -> std::result::Result<(), String> {
    let lines: Vec<&str> = yaml.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        if indent < base_indent {
            break;
        }

        if trimmed.starts_with("- ") {
            i += 1;
            continue;
        }

        if let Some(colon_pos) = trimmed.find(':') {
            let key = trimmed[..colon_pos].trim().to_owned();
            let value_part = trimmed[colon_pos + 1..].trim();

            if value_part.is_empty() {
                i += 1;
                let child_indent = if i < lines.len() {
                    let next = lines[i];
                    next.len() - next.trim_start().len()
                } else {
                    indent + 2
                };

                if i < lines.len() && lines[i].trim_start().starts_with("- ") {
                    let mut list = Vec::new();
                    while i < lines.len() {
                        let l = lines[i];
                        let li = l.len() - l.trim_start().len();
                        if li < child_indent && !l.trim().is_empty() {
                            break;
                        }
                        let lt = l.trim();
                        if let Some(item) = lt.strip_prefix("- ") {
                            let val = item.trim();
                            let val = val.trim_matches('"').trim_matches('\'');
                            list.push(serde_json::Value::String(val.to_owned()));
                        } else if lt.is_empty() {
                            // skip blank lines inside list
                        } else {
                            break;
                        }
                        i += 1;
                    }
                    map.insert(key, serde_json::Value::Array(list));
                } else {
                    let mut child_map = serde_json::Map::new();
                    let block_end = find_block_end(&lines, i, child_indent);
                    let block = lines[i..block_end].join("\n");
                    parse_yaml_block(&block, &mut child_map, child_indent)?;
                    map.insert(key, serde_json::Value::Object(child_map));
                    i = block_end;
                }
            } else {
                let val = parse_yaml_value(value_part);
                map.insert(key, val);
                i += 1;
            }
        } else {
            i += 1;
        }
    }

    Ok(())
}

fn find_block_end(lines: &[&str], start: usize, min_indent: usize) -> usize {
    let mut end = start;
    while end < lines.len() {
        let line = lines[end];
        let trimmed = line.trim();
        if trimmed.is_empty() {
            end += 1;
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        if indent < min_indent {
            break;
        }
        end += 1;
    }
    end
}

fn parse_yaml_value(s: &str) -> serde_json::Value {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')) {
        return serde_json::Value::String(s[1..s.len() - 1].to_owned());
    }

    if s.starts_with('[') && s.ends_with(']') {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(s) {
            return v;
        }
        let inner = s[1..s.len() - 1].trim();
        if inner.is_empty() {
            return serde_json::Value::Array(Vec::new());
        }
        let items: Vec<serde_json::Value> = inner
            .split(',')
            .map(|item| {
                let item = item.trim().trim_matches('"').trim_matches('\'');
                serde_json::Value::String(item.to_owned())
            })
            .collect();
        return serde_json::Value::Array(items);
    }

    if s.starts_with('{') && s.ends_with('}')
        && let Ok(v) = serde_json::from_str::<serde_json::Value>(s)
    {
        return v;
    }

    match s {
        "true" | "yes" | "on" => return serde_json::Value::Bool(true),
        "false" | "no" | "off" => return serde_json::Value::Bool(false),
        "null" | "~" => return serde_json::Value::Null,
        _ => {}
    }

    if let Ok(n) = s.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(n) = s.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(n)
    {
        return serde_json::Value::Number(n);
    }

    serde_json::Value::String(s.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
