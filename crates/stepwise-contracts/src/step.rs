//! Step and protocol types.
//!
//! A `Step` is one structured turn the model emits. Its serde representation
//! is the wire format itself: `{"step": "plan", "content": "..."}` or
//! `{"step": "action", "function": "get_weather", "input": "paris"}`.
//!
//! A `Protocol` fixes which step kinds are legal in a conversation and which
//! one ends it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The tag carried in a step's `step` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    #[serde(alias = "analyze")]
    Analyse,
    Think,
    Output,
    Validate,
    Result,
    Plan,
    Action,
    Observe,
}

impl StepKind {
    /// The wire spelling of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Analyse => "analyse",
            StepKind::Think => "think",
            StepKind::Output => "output",
            StepKind::Validate => "validate",
            StepKind::Result => "result",
            StepKind::Plan => "plan",
            StepKind::Action => "action",
            StepKind::Observe => "observe",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyse" | "analyze" => Ok(StepKind::Analyse),
            "think" => Ok(StepKind::Think),
            "output" => Ok(StepKind::Output),
            "validate" => Ok(StepKind::Validate),
            "result" => Ok(StepKind::Result),
            "plan" => Ok(StepKind::Plan),
            "action" => Ok(StepKind::Action),
            "observe" => Ok(StepKind::Observe),
            other => Err(format!("unknown step kind '{}'", other)),
        }
    }
}

/// One structured turn of the agent protocol.
///
/// Exactly one `Step` is decoded per model reply. Every kind except
/// `Action` carries free-form `content`; `Action` names a tool and the
/// single string argument to pass it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum Step {
    #[serde(alias = "analyze")]
    Analyse { content: String },
    Think { content: String },
    Output { content: String },
    Validate { content: String },
    Result { content: String },
    Plan { content: String },
    Action { function: String, input: String },
    Observe { content: String },
}

impl Step {
    /// Build a step of `kind` carrying `content`.
    ///
    /// Returns `None` for `StepKind::Action`, which has no content.
    pub fn with_content(kind: StepKind, content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        let step = match kind {
            StepKind::Analyse => Step::Analyse { content },
            StepKind::Think => Step::Think { content },
            StepKind::Output => Step::Output { content },
            StepKind::Validate => Step::Validate { content },
            StepKind::Result => Step::Result { content },
            StepKind::Plan => Step::Plan { content },
            StepKind::Observe => Step::Observe { content },
            StepKind::Action => return None,
        };
        Some(step)
    }

    /// The tag of this step.
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Analyse { .. } => StepKind::Analyse,
            Step::Think { .. } => StepKind::Think,
            Step::Output { .. } => StepKind::Output,
            Step::Validate { .. } => StepKind::Validate,
            Step::Result { .. } => StepKind::Result,
            Step::Plan { .. } => StepKind::Plan,
            Step::Action { .. } => StepKind::Action,
            Step::Observe { .. } => StepKind::Observe,
        }
    }
}

/// The turn-taking protocol a conversation follows.
///
/// `Reasoning` walks analyse → think → output → validate → result and ends on
/// `result`. `ToolUse` walks plan → action → observe → output and ends on
/// `output`; it is the only protocol that admits `action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    Reasoning,
    #[default]
    ToolUse,
}

impl Protocol {
    /// The closed set of kinds this protocol admits.
    pub fn kinds(self) -> &'static [StepKind] {
        match self {
            Protocol::Reasoning => &[
                StepKind::Analyse,
                StepKind::Think,
                StepKind::Output,
                StepKind::Validate,
                StepKind::Result,
            ],
            Protocol::ToolUse => &[
                StepKind::Plan,
                StepKind::Action,
                StepKind::Observe,
                StepKind::Output,
            ],
        }
    }

    pub fn admits(self, kind: StepKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// The kind whose dispatch ends a query.
    pub fn terminal_kind(self) -> StepKind {
        match self {
            Protocol::Reasoning => StepKind::Result,
            Protocol::ToolUse => StepKind::Output,
        }
    }

    pub fn is_terminal(self, kind: StepKind) -> bool {
        self.terminal_kind() == kind
    }

    /// The message sent to request each step.
    pub fn next_step_prompt(self) -> &'static str {
        match self {
            Protocol::Reasoning => "Next step, please respond in JSON",
            Protocol::ToolUse => "Next step",
        }
    }

    /// Frame the user's query the way the system prompt announces it.
    pub fn frame_query(self, query: &str) -> String {
        match self {
            Protocol::Reasoning => format!("User Input: {}", query),
            Protocol::ToolUse => format!("User query: {}", query),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Reasoning => "reasoning",
            Protocol::ToolUse => "tool-use",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reasoning" => Ok(Protocol::Reasoning),
            "tool-use" => Ok(Protocol::ToolUse),
            other => Err(format!(
                "unknown protocol '{}' (expected 'reasoning' or 'tool-use')",
                other
            )),
        }
    }
}
