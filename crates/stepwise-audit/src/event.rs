//! Transcript entry and log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stepwise_contracts::{
    error::{StepwiseError, StepwiseResult},
    turn::TurnRecord,
};

/// One link in the transcript hash chain.
///
/// Changing any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Position in the chain, starting at 0. Spans every query of the session.
    pub sequence: u64,

    pub record: TurnRecord,

    /// `this_hash` of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    pub this_hash: String,
}

impl TranscriptEvent {
    /// The `prev_hash` of the first entry in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed snapshot of a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLog {
    pub session_id: String,

    pub events: Vec<TranscriptEvent>,

    /// Queries that have been finalized, in completion order.
    pub finalized_queries: Vec<String>,

    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last entry. Empty when the log is empty.
    pub terminal_hash: String,
}

impl TranscriptLog {
    /// Entries belonging to one query, in order.
    pub fn events_for<'a>(&'a self, query_id: &'a str) -> impl Iterator<Item = &'a TranscriptEvent> {
        self.events
            .iter()
            .filter(move |e| e.record.query_id.to_string() == query_id)
    }

    pub fn to_json_pretty(&self) -> StepwiseResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StepwiseError::TranscriptWriteFailed {
            reason: format!("could not encode transcript: {}", e),
        })
    }
}
