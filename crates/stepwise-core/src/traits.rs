//! Trait seams of the stepwise runtime.
//!
//! - `ConversationChannel` - the remote model session (untrusted text in)
//! - `Tool`                - a named local function the model may request
//! - `ToolPolicy`          - trusted gate evaluated before any tool runs
//! - `Approver`            - operator sign-off for gated invocations
//! - `TranscriptWriter`    - append-only sink for every loop event
//! - `Narrator`            - human-facing display of decoded steps
//!
//! The agent loop receives each of these explicitly; nothing is global.

use stepwise_contracts::{
    error::StepwiseResult,
    step::{Protocol, Step},
    tool::{ToolDescriptor, ToolRequest, ToolVerdict},
    turn::TurnRecord,
};

/// A stateful dialogue with the model.
///
/// The channel owns the conversation history. Sends are strictly ordered:
/// `send` blocks until the model has replied, and the loop never issues the
/// next send before the previous one returned. Reconnection and transport
/// retries are the implementation's business.
pub trait ConversationChannel: Send {
    /// Establish the assistant's behavior contract. Called once per session.
    fn seed(&mut self, system_prompt: &str) -> StepwiseResult<()>;

    /// Append `message` to the history and return the model's raw reply.
    fn send(&mut self, message: &str) -> StepwiseResult<String>;
}

/// A locally invocable function with a single string input.
///
/// Implementations report their own failures inside the returned string;
/// the loop forwards whatever comes back as observation text and never
/// inspects it.
pub trait Tool: Send + Sync {
    /// Unique key the model uses to request this tool.
    fn name(&self) -> &str;

    /// Text shown to the model in the system prompt.
    fn description(&self) -> &str;

    /// Capability names the session must hold before this tool may run.
    fn required_capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Run the tool. Blocking, possibly side-effecting.
    fn invoke(&self, input: &str) -> String;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            required_capabilities: self.required_capabilities(),
        }
    }
}

/// Decides whether one tool invocation may proceed.
///
/// Evaluated after the tool is found in the registry and before its declared
/// capabilities are checked. A non-`Allow` verdict means the tool never runs
/// unless an `Approver` signs off on `RequireApproval`.
pub trait ToolPolicy: Send + Sync {
    fn evaluate(&self, request: &ToolRequest) -> StepwiseResult<ToolVerdict>;
}

/// Operator sign-off for invocations the policy marks `RequireApproval`.
pub trait Approver: Send + Sync {
    /// Return true to let the invocation run.
    fn approve(&self, request: &ToolRequest, reason: &str) -> bool;
}

/// The append-only record of every loop event.
///
/// A failed write ends the current query with `TranscriptWriteFailed`.
pub trait TranscriptWriter: Send + Sync {
    fn write(&self, record: &TurnRecord) -> StepwiseResult<()>;

    /// Called once when a query ends, successfully or not.
    fn finalize(&self, query_id: &str) -> StepwiseResult<()>;
}

/// Displays decoded steps to whoever is watching the loop.
pub trait Narrator: Send + Sync {
    fn step(&self, protocol: Protocol, step: &Step);
}

/// A policy that allows every invocation. For trusted setups and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ToolPolicy for AllowAll {
    fn evaluate(&self, _request: &ToolRequest) -> StepwiseResult<ToolVerdict> {
        Ok(ToolVerdict::Allow)
    }
}

/// A narrator that displays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Narrator for Silent {
    fn step(&self, _protocol: Protocol, _step: &Step) {}
}
