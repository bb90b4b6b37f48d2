//! Three-layer tool registry.
//!
//! "What the model can *see*" (LLM tool-binding) is narrower than "what the
//! runtime can *execute*" (tool node). The registry tracks three views over
//! one set of records:
//!
//! - **discovered**: every tool found by the startup scan. This is the
//!   execution set — the tools node must accept any of them, since handlers
//!   may be materialized on demand.
//! - **enabled**: the subset whose metadata says `enabled: true`. Loaded at
//!   startup and bound to the chat model when relevant.
//! - on-demand promotion moves a tool from discovered-only to enabled; it is
//!   idempotent and safe to race across sessions.
//!
//! Internally the registry is backed by [`DashMap`] which provides lock-free
//! concurrent reads and fine-grained write locking, making it safe to share
//! across sessions without a global `RwLock`.
//!
//! # Example
//!
//! ```rust
//! # use agent_kernel::registry::{RiskLevel, ToolMetadata, ToolRecord, ToolRegistry};
//! # use serde_json::json;
//! let registry = ToolRegistry::new();
//! registry.register_discovered(ToolRecord::new(
//!     "now",
//!     "Return the current UTC time",
//!     json!({"type": "object", "properties": {}}),
//!     ToolMetadata::always_available("system"),
//! ));
//! assert!(registry.get("now").is_some());
//! assert!(!registry.is_enabled("now")); // discovered, not yet enabled
//! registry.load_on_demand("now");
//! assert!(registry.is_enabled("now"));
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How risky a tool invocation is judged to be, for HITL rule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Metadata attached to a tool descriptor.
///
/// Config is the single source of truth for this metadata; discovery only
/// binds a name to a handler and schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Grouping used for catalog display (e.g. "filesystem", "system").
    pub category: String,
    /// Free-form tags for search/filtering.
    pub tags: Vec<String>,
    /// Risk level consulted by the HITL approval gate.
    pub risk_level: RiskLevel,
    /// Whether this tool is loaded at startup and bound to the model by
    /// default.
    pub enabled: bool,
    /// Persistent-global tools (`now`, `todo_read`, `ask_human`, …) are
    /// always included in the planner's visibility set regardless of
    /// `allowed_tools` or mentions.
    pub always_available: bool,
    /// Whether the tools node may invoke a batch containing this tool
    /// concurrently with the other calls in the same batch.
    pub concurrency_safe: bool,
}

impl ToolMetadata {
    /// A low-risk, disabled-by-default tool in the given category.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            tags: Vec::new(),
            risk_level: RiskLevel::Low,
            enabled: false,
            always_available: false,
            concurrency_safe: false,
        }
    }

    /// A persistent-global tool: low risk, always visible.
    pub fn always_available(category: impl Into<String>) -> Self {
        Self {
            always_available: true,
            enabled: true,
            ..Self::new(category)
        }
    }

    /// Builder: set risk level.
    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = risk;
        self
    }

    /// Builder: enable at startup.
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Builder: mark concurrency-safe.
    pub fn concurrency_safe(mut self) -> Self {
        self.concurrency_safe = true;
        self
    }

    /// Builder: attach tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A tool descriptor held by the registry.
///
/// The handler is an opaque, cheaply cloneable invocation target; the
/// registry does not know or care what it does.
#[derive(Clone)]
pub struct ToolRecord {
    /// Machine-readable tool name, unique within the registry.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub input_schema: serde_json::Value,
    /// Registry-level metadata (category, risk, enabled, etc).
    pub metadata: ToolMetadata,
}

impl std::fmt::Debug for ToolRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRecord")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ToolRecord {
    /// Create a new tool record with the given name, description, and
    /// JSON-schema parameters.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        metadata: ToolMetadata,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Concurrent, three-layer tool registry backed by [`DashMap`].
///
/// The registry is cheaply cloneable (`Arc`-backed) and `Send + Sync`, safe
/// to share across sessions. The discovered map doubles as the execution
/// set; `ToolMetadata::enabled` distinguishes the enabled subset.
#[derive(Clone)]
pub struct ToolRegistry {
    discovered: Arc<DashMap<String, ToolRecord>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            discovered: Arc::new(DashMap::new()),
        }
    }

    /// Register a tool as discovered (loadable, not necessarily visible to
    /// the model). Re-registering the same name overwrites the prior record,
    /// which keeps repeated startup scans idempotent.
    pub fn register_discovered(&self, record: ToolRecord) {
        tracing::debug!(tool = %record.name, enabled = record.metadata.enabled, "tool discovered");
        self.discovered.insert(record.name.clone(), record);
    }

    /// Register and enable a tool in one step ("enable now").
    pub fn register(&self, mut record: ToolRecord) {
        record.metadata.enabled = true;
        tracing::info!(tool = %record.name, "tool registered and enabled");
        self.discovered.insert(record.name.clone(), record);
    }

    /// Look up a tool by name, regardless of enabled state. This is the view
    /// the tools node uses: the full execution set.
    pub fn get(&self, name: &str) -> Option<ToolRecord> {
        self.discovered.get(name).map(|e| e.value().clone())
    }

    /// Look up just the metadata for a tool.
    pub fn metadata(&self, name: &str) -> Option<ToolMetadata> {
        self.discovered.get(name).map(|e| e.value().metadata.clone())
    }

    /// Promote a discovered tool to enabled, or return the tool unchanged if
    /// it is already enabled. Returns `None` if the name is not discovered at
    /// all.
    ///
    /// Idempotent: promoting an already-enabled tool does not duplicate its
    /// entry or change its identity.
    pub fn load_on_demand(&self, name: &str) -> Option<ToolRecord> {
        let mut entry = self.discovered.get_mut(name)?;
        if !entry.metadata.enabled {
            entry.metadata.enabled = true;
            tracing::info!(tool = %name, "tool promoted to enabled on demand");
        }
        Some(entry.value().clone())
    }

    /// Remove a tool from the registry entirely.
    pub fn unregister(&self, name: &str) -> Option<ToolRecord> {
        self.discovered.remove(name).map(|(_, r)| r)
    }

    /// Whether a tool is in the enabled subset.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.discovered
            .get(name)
            .map(|e| e.metadata.enabled)
            .unwrap_or(false)
    }

    /// Whether a tool is known at all (discovered), i.e. in the execution
    /// set the tools node accepts.
    pub fn is_discovered(&self, name: &str) -> bool {
        self.discovered.contains_key(name)
    }

    /// All enabled records — the basis of the planner's default visibility
    /// set before mentions and `allowed_tools` are applied.
    pub fn enabled_records(&self) -> Vec<ToolRecord> {
        self.discovered
            .iter()
            .filter(|e| e.metadata.enabled)
            .map(|e| e.value().clone())
            .collect()
    }

    /// All persistent-global records (`always_available: true`), included in
    /// every visibility set unconditionally.
    pub fn always_available_records(&self) -> Vec<ToolRecord> {
        self.discovered
            .iter()
            .filter(|e| e.metadata.always_available)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Names of every discovered tool (the execution set).
    pub fn discovered_names(&self) -> Vec<String> {
        self.discovered.iter().map(|e| e.key().clone()).collect()
    }

    /// Total number of discovered tools.
    pub fn count(&self) -> usize {
        self.discovered.len()
    }

    /// Error-returning variant of [`Self::get`], for call sites where an
    /// unknown tool name is itself the failure being reported (distinct from
    /// the "tool not found" *Tool message* policy in the tools node, which
    /// handles the unknown-tool case as a recoverable value, not this error).
    pub fn require(&self, name: &str) -> Result<ToolRecord> {
        self.get(name).ok_or_else(|| KernelError::ToolNotFound {
            name: name.to_string(),
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, enabled: bool) -> ToolRecord {
        let mut meta = ToolMetadata::new("test");
        meta.enabled = enabled;
        ToolRecord::new(name, "a test tool", json!({"type": "object"}), meta)
    }

    #[test]
    fn discovered_but_not_enabled() {
        let registry = ToolRegistry::new();
        registry.register_discovered(record("extract_links", false));

        assert!(registry.is_discovered("extract_links"));
        assert!(!registry.is_enabled("extract_links"));
        assert!(registry.get("extract_links").is_some());
    }

    #[test]
    fn register_enables_immediately() {
        let registry = ToolRegistry::new();
        registry.register(record("todo_write", false));
        assert!(registry.is_enabled("todo_write"));
    }

    #[test]
    fn load_on_demand_promotes_and_is_idempotent() {
        let registry = ToolRegistry::new();
        registry.register_discovered(record("extract_links", false));

        let first = registry.load_on_demand("extract_links").unwrap();
        assert!(registry.is_enabled("extract_links"));

        let second = registry.load_on_demand("extract_links").unwrap();
        assert_eq!(first.name, second.name);
        assert_eq!(registry.count(), 1, "promotion must not duplicate the entry");
    }

    #[test]
    fn load_on_demand_unknown_returns_none() {
        let registry = ToolRegistry::new();
        assert!(registry.load_on_demand("nonexistent").is_none());
    }

    #[test]
    fn always_available_records_are_distinct_from_enabled() {
        let registry = ToolRegistry::new();
        registry.register_discovered(ToolRecord::new(
            "now",
            "current time",
            json!({"type": "object"}),
            ToolMetadata::always_available("system"),
        ));
        registry.register_discovered(record("extract_links", false));

        let globals = registry.always_available_records();
        assert_eq!(globals.len(), 1);
        assert_eq!(globals[0].name, "now");
    }

    #[test]
    fn require_unknown_errors() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.require("missing"),
            Err(KernelError::ToolNotFound { .. })
        ));
    }

    #[test]
    fn re_registering_discovered_is_idempotent() {
        let registry = ToolRegistry::new();
        registry.register_discovered(record("shell_run", false));
        registry.register_discovered(record("shell_run", false));
        assert_eq!(registry.count(), 1);
    }
}
