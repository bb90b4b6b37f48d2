//! Runtime configuration and hot-reloading.
//!
//! [`RuntimeConfig`] loads the recognized key table from a TOML file, with
//! environment-variable overrides for secrets/endpoints, validates ranges at
//! load time, and supports hot-reload: a file watcher notices changes to
//! either the runtime config file or the HITL rule file and republishes a
//! new validated snapshot over a broadcast channel — in-flight sessions keep
//! running against the snapshot they started with; only new turns observe
//! the new one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::graph::planner::{TokenThresholds, DEFAULT_MAX_MESSAGE_HISTORY};
use crate::hitl::ApprovalGate;
use crate::state::SessionState;

fn default_max_loops() -> u32 {
    SessionState::DEFAULT_MAX_LOOPS
}
fn default_max_subagent_loops() -> u32 {
    SessionState::DEFAULT_SUBAGENT_MAX_LOOPS
}
fn default_max_message_history() -> usize {
    DEFAULT_MAX_MESSAGE_HISTORY
}
fn default_info_threshold() -> f32 {
    0.75
}
fn default_warning_threshold() -> f32 {
    0.85
}
fn default_critical_threshold() -> f32 {
    0.95
}
fn default_keep_recent_messages() -> usize {
    10
}
fn default_compact_middle_messages() -> usize {
    30
}
fn default_subagent_min_summary_chars() -> usize {
    crate::delegation::DEFAULT_MIN_SUMMARY_CHARS
}
fn default_tool_timeout_default_seconds() -> u64 {
    30
}

/// The §6 recognized configuration keys, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,
    #[serde(default = "default_max_subagent_loops")]
    pub max_subagent_loops: u32,
    #[serde(default = "default_max_message_history")]
    pub max_message_history: usize,
    #[serde(default = "default_info_threshold")]
    pub info_threshold: f32,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f32,
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f32,
    #[serde(default = "default_keep_recent_messages")]
    pub keep_recent_messages: usize,
    #[serde(default = "default_compact_middle_messages")]
    pub compact_middle_messages: usize,
    #[serde(default = "default_subagent_min_summary_chars")]
    pub subagent_min_summary_chars: usize,
    #[serde(default = "default_tool_timeout_default_seconds")]
    pub tool_timeout_default_seconds: u64,
    /// Path to the HITL rule file, resolved relative to the config file's
    /// directory if relative.
    #[serde(default)]
    pub hitl_rules_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_loops: default_max_loops(),
            max_subagent_loops: default_max_subagent_loops(),
            max_message_history: default_max_message_history(),
            info_threshold: default_info_threshold(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            keep_recent_messages: default_keep_recent_messages(),
            compact_middle_messages: default_compact_middle_messages(),
            subagent_min_summary_chars: default_subagent_min_summary_chars(),
            tool_timeout_default_seconds: default_tool_timeout_default_seconds(),
            hitl_rules_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Validate range constraints §6 imposes on threshold and history keys.
    /// Called after every load, including a hot-reload.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("info_threshold", self.info_threshold),
            ("warning_threshold", self.warning_threshold),
            ("critical_threshold", self.critical_threshold),
        ] {
            if !(0.5..=0.95).contains(&value) {
                return Err(AgentError::Config {
                    reason: format!("{name} must be in [0.5, 0.95], got {value}"),
                });
            }
        }
        if self.info_threshold >= self.warning_threshold
            || self.warning_threshold >= self.critical_threshold
        {
            return Err(AgentError::Config {
                reason: "thresholds must satisfy info < warning < critical".to_string(),
            });
        }
        if !(10..=100).contains(&self.max_message_history) {
            return Err(AgentError::Config {
                reason: format!(
                    "max_message_history must be in [10, 100], got {}",
                    self.max_message_history
                ),
            });
        }
        Ok(())
    }

    pub fn thresholds(&self) -> TokenThresholds {
        TokenThresholds {
            info: self.info_threshold,
            warning: self.warning_threshold,
            critical: self.critical_threshold,
        }
    }

    /// Load from a TOML file, apply environment-variable overrides, then
    /// validate. `OPENINTENT_` + the upper-cased field name overrides any
    /// numeric key (e.g. `OPENINTENT_MAX_LOOPS=50`).
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
                reason: format!("failed to read config file {}: {e}", path.display()),
            })?;
            toml::from_str(&content).map_err(|e| AgentError::Config {
                reason: format!("failed to parse config file {}: {e}", path.display()),
            })?
        } else {
            warn!(path = %path.display(), "runtime config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! override_numeric {
            ($env_name:literal, $field:ident) => {
                if let Ok(raw) = std::env::var($env_name) {
                    match raw.parse() {
                        Ok(value) => self.$field = value,
                        Err(_) => warn!(env = $env_name, value = %raw, "ignoring unparsable override"),
                    }
                }
            };
        }
        override_numeric!("OPENINTENT_MAX_LOOPS", max_loops);
        override_numeric!("OPENINTENT_MAX_SUBAGENT_LOOPS", max_subagent_loops);
        override_numeric!("OPENINTENT_MAX_MESSAGE_HISTORY", max_message_history);
        override_numeric!("OPENINTENT_INFO_THRESHOLD", info_threshold);
        override_numeric!("OPENINTENT_WARNING_THRESHOLD", warning_threshold);
        override_numeric!("OPENINTENT_CRITICAL_THRESHOLD", critical_threshold);
        override_numeric!("OPENINTENT_TOOL_TIMEOUT_DEFAULT_SECONDS", tool_timeout_default_seconds);
    }
}

/// A config-or-rules change notification, published to every hot-reload
/// subscriber.
#[derive(Debug, Clone)]
pub enum ConfigChange {
    /// A new validated [`RuntimeConfig`] snapshot is available.
    Runtime(RuntimeConfig),
    /// A new validated [`ApprovalGate`] is available.
    HitlRules(ApprovalGate),
}

/// Owns the current config/rules snapshot and watches both files for
/// changes, republishing validated snapshots without restarting in-flight
/// sessions.
pub struct ConfigManager {
    config: Arc<RwLock<RuntimeConfig>>,
    gate: Arc<RwLock<ApprovalGate>>,
    config_path: PathBuf,
    change_tx: broadcast::Sender<ConfigChange>,
    _watcher: Option<RecommendedWatcher>,
}

impl ConfigManager {
    /// Load `config_path` (and its configured `hitl_rules_path`, if any)
    /// without setting up a file watcher. Useful for tests and one-shot
    /// tools.
    pub fn load(config_path: PathBuf) -> Result<Self> {
        let config = RuntimeConfig::load(&config_path)?;
        let gate = Self::load_gate(&config, &config_path)?;
        let (change_tx, _) = broadcast::channel(32);
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            gate: Arc::new(RwLock::new(gate)),
            config_path,
            change_tx,
            _watcher: None,
        })
    }

    /// As [`Self::load`], but also watches `config_path`'s parent directory
    /// and republishes on any modification to the config file or the HITL
    /// rule file.
    pub fn with_file_watching(config_path: PathBuf) -> Result<Self> {
        let mut manager = Self::load(config_path)?;

        let tx = manager.change_tx.clone();
        let path = manager.config_path.clone();
        let config_ref = manager.config.clone();
        let gate_ref = manager.gate.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(event.kind, EventKind::Modify(_)) {
                return;
            }
            debug!(path = %path.display(), "runtime config directory changed, reloading");
            match RuntimeConfig::load(&path) {
                Ok(new_config) => {
                    match Self::load_gate(&new_config, &path) {
                        Ok(new_gate) => {
                            *gate_ref.write().unwrap() = new_gate.clone();
                            let _ = tx.send(ConfigChange::HitlRules(new_gate));
                        }
                        Err(err) => warn!(%err, "hot-reload: HITL rule file failed to parse, keeping prior rules"),
                    }
                    *config_ref.write().unwrap() = new_config.clone();
                    let _ = tx.send(ConfigChange::Runtime(new_config));
                    info!("runtime config hot-reloaded");
                }
                Err(err) => warn!(%err, "hot-reload: runtime config failed to load, keeping prior config"),
            }
        })
        .map_err(AgentError::from)?;

        if let Some(parent) = manager.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive).map_err(AgentError::from)?;
        }
        manager._watcher = Some(watcher);
        Ok(manager)
    }

    fn load_gate(config: &RuntimeConfig, config_path: &Path) -> Result<ApprovalGate> {
        let Some(rules_path) = &config.hitl_rules_path else {
            return Ok(ApprovalGate::empty());
        };
        let resolved = if rules_path.is_absolute() {
            rules_path.clone()
        } else {
            config_path
                .parent()
                .map(|dir| dir.join(rules_path))
                .unwrap_or_else(|| rules_path.clone())
        };
        let text = std::fs::read_to_string(&resolved).map_err(|e| AgentError::Config {
            reason: format!("failed to read HITL rule file {}: {e}", resolved.display()),
        })?;
        ApprovalGate::from_toml(&text).map_err(|e| AgentError::Config {
            reason: e.to_string(),
        })
    }

    pub fn config(&self) -> RuntimeConfig {
        self.config.read().unwrap().clone()
    }

    pub fn gate(&self) -> ApprovalGate {
        self.gate.read().unwrap().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
