//! Error types for the stepwise runtime.
//!
//! Every variant except `ConfigError` is fatal for the current query only:
//! the interactive loop reports it and accepts the next query. Nothing in
//! the runtime retries.

use thiserror::Error;

/// The unified error type for the stepwise crates.
#[derive(Debug, Error)]
pub enum StepwiseError {
    /// The conversation channel could not deliver a message or produce a reply.
    #[error("conversation channel failed: {reason}")]
    ChannelFailure { reason: String },

    /// No line of the model's reply decoded as a JSON object.
    #[error("could not parse valid JSON from reply: {raw}")]
    ParseFailure { raw: String },

    /// The reply decoded as JSON but lacks fields its step kind requires.
    #[error("incomplete step, missing {missing:?}: {value}")]
    IncompleteStep { missing: Vec<String>, value: String },

    /// The step kind is unknown or not part of the active protocol.
    #[error("unexpected step: {reason}")]
    UnexpectedStep { reason: String },

    /// An action step named a tool that is not registered.
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    /// The tool policy refused the invocation, or approval was withheld.
    #[error("tool '{tool}' denied: {reason}")]
    ToolDenied { tool: String, reason: String },

    /// The tool declares a capability the session was not granted.
    #[error("capability '{capability}' required by tool '{tool}' is not granted")]
    CapabilityMissing { capability: String, tool: String },

    /// The query ran past the configured step cap without a terminal step.
    #[error("no terminal step after {limit} steps")]
    StepLimitExceeded { limit: u32 },

    /// A configuration file or registry definition is invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The transcript writer could not record a turn.
    #[error("transcript write failed: {reason}")]
    TranscriptWriteFailed { reason: String },
}

/// Convenience alias used throughout the stepwise crates.
pub type StepwiseResult<T> = Result<T, StepwiseError>;
