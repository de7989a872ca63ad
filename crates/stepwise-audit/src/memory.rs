//! In-memory `TranscriptWriter`.
//!
//! Keeps every entry in a `Vec` behind a `Mutex`. One transcript serves a
//! whole session: entries from successive queries share one chain, and each
//! entry carries its query id.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use stepwise_contracts::{error::StepwiseResult, turn::TurnRecord};
use stepwise_core::traits::TranscriptWriter;

use crate::{
    chain::{hash_event, verify_chain},
    event::{TranscriptEvent, TranscriptLog},
};

pub(crate) struct TranscriptState {
    pub(crate) events: Vec<TranscriptEvent>,
    pub(crate) last_hash: String,
    pub(crate) finalized: Vec<String>,
}

/// An append-only transcript backed by a SHA-256 hash chain.
///
/// Cloning shares the underlying chain, so a host can hand one clone to the
/// agent loop and keep another to export the log afterwards.
#[derive(Clone)]
pub struct InMemoryTranscript {
    session_id: String,
    pub(crate) state: Arc<Mutex<TranscriptState>>,
}

impl InMemoryTranscript {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: Arc::new(Mutex::new(TranscriptState {
                events: Vec::new(),
                last_hash: TranscriptEvent::GENESIS_HASH.to_string(),
                finalized: Vec::new(),
            })),
        }
    }

    // A panic while holding the lock cannot leave a half-written entry: the
    // push is the last mutation before `last_hash` moves.
    fn lock(&self) -> MutexGuard<'_, TranscriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Snapshot every entry written so far.
    pub fn export_log(&self) -> TranscriptLog {
        let state = self.lock();
        let terminal_hash = state
            .events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        TranscriptLog {
            session_id: self.session_id.clone(),
            events: state.events.clone(),
            finalized_queries: state.finalized.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Recheck linkage and hashes of the whole chain.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.lock().events)
    }
}

impl TranscriptWriter for InMemoryTranscript {
    fn write(&self, record: &TurnRecord) -> StepwiseResult<()> {
        let mut state = self.lock();

        let sequence = state.events.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_event(sequence, record, &prev_hash)?;

        debug!(
            query_id = %record.query_id,
            turn = record.turn,
            sequence,
            "transcript entry appended"
        );

        state.events.push(TranscriptEvent {
            sequence,
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;

        Ok(())
    }

    fn finalize(&self, query_id: &str) -> StepwiseResult<()> {
        let mut state = self.lock();
        state.finalized.push(query_id.to_string());

        info!(
            query_id = %query_id,
            entries = state.events.len(),
            terminal_hash = %state.last_hash,
            "query transcript finalized"
        );

        Ok(())
    }
}
