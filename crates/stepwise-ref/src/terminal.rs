//! Terminal-facing narrator and approver.

use std::io::{self, Write};

use tracing::info;

use stepwise_contracts::{
    error::StepwiseError,
    step::{Protocol, Step},
    tool::ToolRequest,
};
use stepwise_core::traits::{Approver, Narrator};

/// Render one decoded step the way the terminal shows it.
pub fn render_step(protocol: Protocol, step: &Step) -> String {
    match step {
        Step::Action { function, input } => {
            format!("⚙️ ACTION: Calling {} with input: {}", function, input)
        }
        Step::Observe { content } => format!("👀 OBSERVED: {}", content),
        Step::Output { content } if protocol == Protocol::ToolUse => {
            format!("✅ FINAL ANSWER: {}", content)
        }
        Step::Result { content } => format!("✅ FINAL RESULT: {}", content),
        Step::Analyse { content }
        | Step::Think { content }
        | Step::Output { content }
        | Step::Validate { content }
        | Step::Plan { content } => {
            format!("🧠 {}: {}", step.kind().as_str().to_uppercase(), content)
        }
    }
}

/// Render a query failure for the terminal.
pub fn render_failure(error: &StepwiseError) -> String {
    match error {
        StepwiseError::ParseFailure { raw } => {
            format!("❌ Could not parse valid JSON. Response was:\n{}", raw)
        }
        StepwiseError::ChannelFailure { reason } => format!("⚠️ Model error: {}", reason),
        StepwiseError::ToolDenied { .. } | StepwiseError::CapabilityMissing { .. } => {
            format!("⛔ {}", error)
        }
        other => format!("⚠️ {}", other),
    }
}

/// Prints every decoded step to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNarrator;

impl Narrator for ConsoleNarrator {
    fn step(&self, protocol: Protocol, step: &Step) {
        println!("{}", render_step(protocol, step));
    }
}

/// Asks the operator on stderr/stdin before a gated tool runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleApprover;

/// `y` or `yes`, any case.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

impl Approver for ConsoleApprover {
    fn approve(&self, request: &ToolRequest, reason: &str) -> bool {
        eprint!(
            "Approve {}({:?})? {} [y/N] ",
            request.tool, request.input, reason
        );
        let _ = io::stderr().flush();

        let mut answer = String::new();
        let approved = io::stdin().read_line(&mut answer).is_ok() && is_affirmative(&answer);
        info!(
            query_id = %request.query_id,
            tool = %request.tool,
            approved,
            "operator decision"
        );
        approved
    }
}
