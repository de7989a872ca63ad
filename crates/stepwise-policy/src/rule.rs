//! Tool rule types.
//!
//! Rules are evaluated in declaration order; the first matching rule wins.
//! If no rule matches, the policy denies by default.

use serde::{Deserialize, Serialize};

/// The decision a rule produces when it matches a tool request.
///
/// Written in kebab-case in TOML:
/// ```toml
/// verdict = "allow"
/// verdict = "deny"
/// verdict = "require-approval"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleVerdict {
    Allow,
    Deny,
    RequireApproval,
}

/// A single tool rule loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRule {
    /// Stable identifier used in logs and refusal reasons.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Tool name to match. `"*"` matches any tool.
    pub tool: String,

    /// When set, the rule only matches inputs starting with this prefix
    /// (e.g. `"ls"` for the command tool).
    #[serde(default)]
    pub input_prefix: Option<String>,

    /// Capabilities the session must hold for this rule to produce its
    /// `verdict`. A missing one turns any verdict into a denial.
    #[serde(default)]
    pub required_capabilities: Vec<String>,

    pub verdict: RuleVerdict,

    pub deny_reason: Option<String>,

    pub approval_reason: Option<String>,
}

impl ToolRule {
    /// Return true if this rule applies to `tool` called with `input`.
    ///
    /// Names match exactly (case-sensitive) unless the rule uses `"*"`.
    pub fn matches(&self, tool: &str, input: &str) -> bool {
        let tool_matches = self.tool == "*" || self.tool == tool;
        let input_matches = self
            .input_prefix
            .as_deref()
            .map_or(true, |prefix| input.trim_start().starts_with(prefix));
        tool_matches && input_matches
    }
}
