//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. compact JSON of the turn record

use sha2::{Digest, Sha256};

use stepwise_contracts::{
    error::{StepwiseError, StepwiseResult},
    turn::TurnRecord,
};

use crate::event::TranscriptEvent;

/// Compute the lowercase hex SHA-256 of one transcript entry.
///
/// Fails with `TranscriptWriteFailed` if the record cannot be encoded.
pub fn hash_event(sequence: u64, record: &TurnRecord, prev_hash: &str) -> StepwiseResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| StepwiseError::TranscriptWriteFailed {
        reason: format!("could not encode turn record: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Check prev-hash linkage and recompute every hash.
///
/// An empty chain is valid. A record that can no longer be encoded counts
/// as a broken chain.
pub fn verify_chain(events: &[TranscriptEvent]) -> bool {
    let mut expected_prev: &str = TranscriptEvent::GENESIS_HASH;

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.as_str();
    }

    true
}
