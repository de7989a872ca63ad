//! Tolerant extraction of one JSON object from a model reply.
//!
//! The model is asked for a single JSON object per reply but regularly wraps
//! it in a markdown fence or surrounds it with prose. Parsing runs in three
//! passes:
//!
//! 1. If the reply opens with a fence marker, drop the fence lines.
//! 2. Try the whole remaining text as one JSON object.
//! 3. Try every line on its own; the first line that decodes to an object wins.
//!
//! Any JSON object is accepted here, whatever its fields. Whether it is a
//! well-formed step is decided by `shape::decode`.

use serde_json::{Map, Value};
use tracing::debug;

use stepwise_contracts::error::{StepwiseError, StepwiseResult};

/// Markdown code fence delimiter.
pub const FENCE: &str = "```";

/// A decoded JSON object, not yet validated as a step.
pub type StepObject = Map<String, Value>;

/// Extract the first JSON object from `raw`.
///
/// # Errors
///
/// `StepwiseError::ParseFailure` carrying the untouched `raw` text when no
/// candidate decodes to a JSON object. Non-object JSON values (numbers,
/// strings, arrays) do not count.
pub fn parse(raw: &str) -> StepwiseResult<StepObject> {
    let candidate = strip_fence(raw);

    if let Some(object) = decode_object(&candidate) {
        return Ok(object);
    }

    for (index, line) in candidate.lines().enumerate() {
        if let Some(object) = decode_object(line) {
            debug!(line = index, "step object recovered from a single line");
            return Ok(object);
        }
    }

    Err(StepwiseError::ParseFailure {
        raw: raw.to_string(),
    })
}

/// Remove markdown fence lines when `raw` opens with one.
///
/// Only lines that themselves start with the fence marker are dropped, so a
/// reply like "```json\n{...}\n```" becomes "{...}". Text that does not open
/// with a fence is returned trimmed but otherwise unchanged.
fn strip_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with(FENCE) {
        return trimmed.to_string();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with(FENCE))
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_object(text: &str) -> Option<StepObject> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}
