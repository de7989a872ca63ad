//! Tool description and policy request/verdict types.

use serde::{Deserialize, Serialize};

/// What the model is told about a tool, plus what the runtime checks
/// before calling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique key the model uses in an action step's `function` field.
    pub name: String,
    /// Text rendered into the system prompt.
    pub description: String,
    /// Capability names the session must hold for the tool to run.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

/// Everything the tool policy sees when deciding on one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// String form of the query's `QueryId`.
    pub query_id: String,
    pub tool: String,
    pub input: String,
    /// Every capability the session holds.
    pub capabilities: Vec<String>,
}

/// The policy decision for a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolVerdict {
    Allow,
    Deny {
        reason: String,
    },
    /// The invocation may proceed only if an operator approves it.
    RequireApproval {
        reason: String,
    },
}

/// A completed tool invocation, as reported in a `QueryOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub input: String,
    pub output: String,
}
