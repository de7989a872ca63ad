//! TOML-driven tool policy.
//!
//! Evaluation algorithm:
//!
//! 1. Iterate rules in declaration order.
//! 2. For the first rule whose `tool` and `input_prefix` match:
//!    a. Verify the session holds every capability in `required_capabilities`.
//!       If any is missing → `Deny`, whatever the rule's verdict.
//!    b. Convert `RuleVerdict` → `ToolVerdict` and return.
//! 3. If no rule matched → `Deny` ("denied by default").

use std::path::Path;

use tracing::{debug, warn};

use stepwise_contracts::{
    error::StepwiseResult,
    tool::{ToolRequest, ToolVerdict},
};
use stepwise_core::traits::ToolPolicy;

use crate::{
    config::RuntimeConfig,
    rule::{RuleVerdict, ToolRule},
};

/// A `ToolPolicy` backed by an ordered list of `ToolRule`s.
///
/// ```rust,ignore
/// use stepwise_policy::TomlToolPolicy;
///
/// let policy = TomlToolPolicy::from_file(Path::new("policies/default.toml"))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlToolPolicy {
    rules: Vec<ToolRule>,
}

impl TomlToolPolicy {
    pub fn new(rules: Vec<ToolRule>) -> Self {
        Self { rules }
    }

    /// Parse `s` as a runtime configuration and keep its rules.
    pub fn from_toml_str(s: &str) -> StepwiseResult<Self> {
        Ok(Self::from_config(&RuntimeConfig::from_toml_str(s)?))
    }

    pub fn from_file(path: &Path) -> StepwiseResult<Self> {
        Ok(Self::from_config(&RuntimeConfig::from_file(path)?))
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.rules.clone())
    }

    pub fn rules(&self) -> &[ToolRule] {
        &self.rules
    }
}

impl ToolPolicy for TomlToolPolicy {
    fn evaluate(&self, request: &ToolRequest) -> StepwiseResult<ToolVerdict> {
        debug!(
            query_id = %request.query_id,
            tool = %request.tool,
            "evaluating tool policy"
        );

        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.matches(&request.tool, &request.input))
        else {
            warn!(
                query_id = %request.query_id,
                tool = %request.tool,
                "no tool rule matched; denying by default"
            );
            return Ok(ToolVerdict::Deny {
                reason: format!(
                    "denied by default: no rule matched tool '{}'",
                    request.tool
                ),
            });
        };

        debug!(rule_id = %rule.id, tool = %request.tool, "rule matched");

        if let Some(missing) = rule
            .required_capabilities
            .iter()
            .find(|cap| !request.capabilities.contains(cap))
        {
            warn!(
                rule_id = %rule.id,
                capability = %missing,
                tool = %request.tool,
                "matched rule requires a capability the session does not hold"
            );
            return Ok(ToolVerdict::Deny {
                reason: format!(
                    "rule '{}' requires capability '{}' which is not granted",
                    rule.id, missing
                ),
            });
        }

        let verdict = match rule.verdict {
            RuleVerdict::Allow => ToolVerdict::Allow,

            RuleVerdict::Deny => ToolVerdict::Deny {
                reason: rule
                    .deny_reason
                    .clone()
                    .unwrap_or_else(|| format!("denied by rule '{}'", rule.id)),
            },

            RuleVerdict::RequireApproval => ToolVerdict::RequireApproval {
                reason: rule
                    .approval_reason
                    .clone()
                    .unwrap_or_else(|| format!("approval required by rule '{}'", rule.id)),
            },
        };

        Ok(verdict)
    }
}
