//! HITL Approval Gate.
//!
//! A wrapper around the tools node: each pending tool call is matched
//! against a rule set loaded from a configuration file. On `require_approval`
//! the tools node suspends with an [`crate::tool::InterruptPayload::Approval`];
//! the host harness resumes with an [`ApprovalResponse`].
//!
//! Rules are loaded at startup and may be hot-reloaded (see
//! [`crate::config::RuntimeConfig`]); a rule file that fails to parse is a
//! startup error — fail closed, since no rules parsed must never be
//! silently treated as no rules configured.

use agent_kernel::registry::RiskLevel;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What the gate decided for a tool call that matched a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Execute without asking.
    AutoAllow,
    /// Suspend and ask the user.
    RequireApproval,
    /// Never execute; produce a denial Tool message immediately.
    AlwaysDeny,
}

/// One HITL rule, matched against a tool call in declaration order; the
/// first matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlRule {
    /// Tool name or glob (`write_*`, `run_bash_command`).
    pub tool_pattern: String,
    /// Optional regex applied to the JSON-serialized arguments (e.g. to
    /// catch `rm -rf`, paths outside the workspace, `.env`).
    #[serde(default)]
    pub argument_pattern: Option<String>,
    pub risk_level: RiskLevel,
    pub decision: Decision,
}

/// The outcome of evaluating one tool call against the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No rule matched, or a matching rule said `auto_allow`.
    Allow,
    /// A matching rule said `require_approval`; carries the risk level for
    /// the interrupt payload.
    RequireApproval(RiskLevel),
    /// A matching rule said `always_deny`.
    Deny,
}

/// The host's answer to an `Approval` interrupt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Loaded, ready-to-evaluate rule set.
#[derive(Debug, Clone, Default)]
pub struct ApprovalGate {
    rules: Vec<HitlRule>,
}

impl ApprovalGate {
    /// An empty gate — every call is allowed. Useful for tests and for a
    /// deployment with no configured rule file.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build a gate from an explicit rule list (already validated).
    pub fn new(rules: Vec<HitlRule>) -> Self {
        Self { rules }
    }

    /// Parse a rule set from TOML text. Fails closed: a parse error is
    /// surfaced, never silently treated as "no rules".
    pub fn from_toml(text: &str) -> Result<Self, HitlError> {
        #[derive(Deserialize)]
        struct RuleFile {
            #[serde(default)]
            rule: Vec<HitlRule>,
        }
        let file: RuleFile = toml::from_str(text).map_err(|e| HitlError::Parse(e.to_string()))?;
        Ok(Self::new(file.rule))
    }

    pub fn rules(&self) -> &[HitlRule] {
        &self.rules
    }

    /// Evaluate a tool call: returns the verdict of the first matching
    /// rule, or [`Verdict::Allow`] if nothing matches.
    pub fn evaluate(&self, tool_name: &str, args: &serde_json::Value) -> Verdict {
        for rule in &self.rules {
            if !glob_match(&rule.tool_pattern, tool_name) {
                continue;
            }
            if let Some(pattern) = &rule.argument_pattern {
                let Ok(re) = Regex::new(pattern) else {
                    warn!(pattern, "invalid HITL argument_pattern regex, skipping rule");
                    continue;
                };
                if !re.is_match(&args.to_string()) {
                    continue;
                }
            }

            debug!(tool = tool_name, decision = ?rule.decision, "HITL rule matched");
            return match rule.decision {
                Decision::AutoAllow => Verdict::Allow,
                Decision::RequireApproval => Verdict::RequireApproval(rule.risk_level),
                Decision::AlwaysDeny => Verdict::Deny,
            };
        }
        Verdict::Allow
    }
}

/// Errors loading the HITL rule file.
#[derive(Debug, thiserror::Error)]
pub enum HitlError {
    #[error("failed to parse HITL rule file: {0}")]
    Parse(String),
}

/// Minimal glob matcher supporting a single trailing `*` wildcard
/// (`write_*`), which covers every pattern shape the rule file needs;
/// anything without a `*` is an exact match.
fn glob_match(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(pattern: &str, decision: Decision, risk: RiskLevel) -> HitlRule {
        HitlRule {
            tool_pattern: pattern.into(),
            argument_pattern: None,
            risk_level: risk,
            decision,
        }
    }

    #[test]
    fn empty_gate_allows_everything() {
        let gate = ApprovalGate::empty();
        assert_eq!(
            gate.evaluate("run_bash_command", &json!({})),
            Verdict::Allow
        );
    }

    #[test]
    fn glob_pattern_matches_prefix() {
        let gate = ApprovalGate::new(vec![rule(
            "write_*",
            Decision::RequireApproval,
            RiskLevel::Medium,
        )]);
        assert_eq!(
            gate.evaluate("write_file", &json!({})),
            Verdict::RequireApproval(RiskLevel::Medium)
        );
        assert_eq!(gate.evaluate("read_file", &json!({})), Verdict::Allow);
    }

    #[test]
    fn argument_pattern_must_also_match() {
        let mut r = rule("run_bash_command", Decision::AlwaysDeny, RiskLevel::Critical);
        r.argument_pattern = Some("rm -rf".to_string());
        let gate = ApprovalGate::new(vec![r]);

        assert_eq!(
            gate.evaluate("run_bash_command", &json!({"cmd": "rm -rf outputs/"})),
            Verdict::Deny
        );
        assert_eq!(
            gate.evaluate("run_bash_command", &json!({"cmd": "ls"})),
            Verdict::Allow
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let gate = ApprovalGate::new(vec![
            rule("write_*", Decision::AutoAllow, RiskLevel::Low),
            rule("write_*", Decision::AlwaysDeny, RiskLevel::Critical),
        ]);
        assert_eq!(gate.evaluate("write_file", &json!({})), Verdict::Allow);
    }

    #[test]
    fn from_toml_parses_rule_table() {
        let text = r#"
            [[rule]]
            tool_pattern = "run_bash_command"
            risk_level = "high"
            decision = "require_approval"
        "#;
        let gate = ApprovalGate::from_toml(text).unwrap();
        assert_eq!(gate.rules().len(), 1);
        assert_eq!(
            gate.evaluate("run_bash_command", &json!({})),
            Verdict::RequireApproval(RiskLevel::High)
        );
    }

    #[test]
    fn from_toml_rejects_unparsable_file() {
        assert!(ApprovalGate::from_toml("not valid toml [[[").is_err());
    }
}
