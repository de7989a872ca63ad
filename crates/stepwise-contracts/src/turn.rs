//! Per-query identity, transcript records and outcomes.
//!
//! `TurnRecord` is what the transcript writer stores, one per loop event.
//! `QueryOutcome` is what the agent loop hands back when a query reaches its
//! terminal step.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{step::Step, tool::ToolCall};

/// Identifies one run of the agent loop for one user query.
///
/// Appears in every transcript record and every log line of that run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub uuid::Uuid);

impl QueryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What happened at one point of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The user's query was relayed to the model.
    Query { text: String },
    /// A step was decoded and dispatched.
    Step { step: Step },
    /// A tool ran and its output went back to the model as an observation.
    ToolInvoked {
        tool: String,
        input: String,
        output: String,
    },
    /// A tool invocation was blocked before the tool ran.
    ToolRefused { tool: String, reason: String },
    /// The query ended with an error.
    Failed { reason: String },
}

/// An immutable transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub query_id: QueryId,
    /// Position of this record within its query, starting at 0.
    pub turn: u64,
    pub event: TurnEvent,
    pub timestamp: DateTime<Utc>,
}

/// The result of a query that reached its terminal step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query_id: QueryId,
    /// Content of the terminal step.
    pub answer: String,
    /// Number of steps dispatched, terminal step included.
    pub steps: u32,
    /// Tool invocations in the order they ran.
    pub tool_calls: Vec<ToolCall>,
}
