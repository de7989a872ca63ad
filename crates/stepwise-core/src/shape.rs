//! Dispatch-layer validation: turn a parsed JSON object into a `Step`.
//!
//! All missing fields are collected before failing so the report names
//! everything the model left out in one pass.

use serde_json::Value;

use stepwise_contracts::{
    error::{StepwiseError, StepwiseResult},
    step::{Protocol, Step, StepKind},
};

use crate::parser::StepObject;

/// Decode `object` as a step of `protocol`.
///
/// # Errors
///
/// - `IncompleteStep` when `step` is absent or empty, when a non-action step
///   has no non-empty string `content`, or when an action lacks a string
///   `function` or `input`.
/// - `UnexpectedStep` when the `step` tag is unknown or belongs to the other
///   protocol.
pub fn decode(object: &StepObject, protocol: Protocol) -> StepwiseResult<Step> {
    let Some(tag) = non_empty_str(object, "step") else {
        let mut missing = vec!["step".to_string()];
        if non_empty_str(object, "content").is_none() {
            missing.push("content".to_string());
        }
        return Err(incomplete(missing, object));
    };

    let kind: StepKind = tag
        .parse()
        .map_err(|reason: String| StepwiseError::UnexpectedStep { reason })?;

    if !protocol.admits(kind) {
        return Err(StepwiseError::UnexpectedStep {
            reason: format!(
                "step '{}' is not part of the {} protocol (expected one of {})",
                kind,
                protocol,
                protocol
                    .kinds()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    if kind == StepKind::Action {
        let function = non_empty_str(object, "function");
        let input = object.get("input").and_then(Value::as_str);

        return match (function, input) {
            (Some(function), Some(input)) => Ok(Step::Action {
                function: function.to_string(),
                input: input.to_string(),
            }),
            (function, input) => {
                let mut missing = Vec::new();
                if function.is_none() {
                    missing.push("function".to_string());
                }
                if input.is_none() {
                    missing.push("input".to_string());
                }
                Err(incomplete(missing, object))
            }
        };
    }

    let content = non_empty_str(object, "content")
        .ok_or_else(|| incomplete(vec!["content".to_string()], object))?;

    // `with_content` only refuses Action, which returned above.
    Step::with_content(kind, content).ok_or_else(|| StepwiseError::UnexpectedStep {
        reason: format!("step '{}' carries no content", kind),
    })
}

fn non_empty_str<'a>(object: &'a StepObject, field: &str) -> Option<&'a str> {
    object
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn incomplete(missing: Vec<String>, object: &StepObject) -> StepwiseError {
    StepwiseError::IncompleteStep {
        missing,
        value: Value::Object(object.clone()).to_string(),
    }
}
