//! A channel that replays canned model replies.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::debug;

use stepwise_contracts::{
    error::{StepwiseError, StepwiseResult},
    step::Protocol,
};
use stepwise_core::traits::ConversationChannel;

/// Reply given to every message that is not a step request.
pub const ACKNOWLEDGEMENT: &str = "OK";

/// Every message a `ScriptedChannel` received, in order.
pub type SentLog = Arc<Mutex<Vec<String>>>;

/// Replays scripted replies for step requests.
///
/// Each next-step prompt of the protocol consumes one scripted reply. Any
/// other message (the system prompt, a relayed query, an observation) is
/// acknowledged without consuming the script. Running out of replies is a
/// `ChannelFailure`, like a dropped connection.
#[derive(Debug)]
pub struct ScriptedChannel {
    protocol: Protocol,
    replies: VecDeque<String>,
    sent: SentLog,
}

impl ScriptedChannel {
    pub fn new<I, S>(protocol: Protocol, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protocol,
            replies: replies.into_iter().map(Into::into).collect(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Parse a script: replies separated by one or more blank lines.
    ///
    /// A reply cannot itself contain a blank line; pretty-printed JSON
    /// must be written without empty lines inside it.
    pub fn from_script(protocol: Protocol, script: &str) -> Self {
        let mut replies = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in script.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    replies.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            replies.push(current.join("\n"));
        }
        Self::new(protocol, replies)
    }

    pub fn from_file(protocol: Protocol, path: &Path) -> StepwiseResult<Self> {
        let script = std::fs::read_to_string(path).map_err(|e| StepwiseError::ConfigError {
            reason: format!("failed to read script file '{}': {}", path.display(), e),
        })?;
        Ok(Self::from_script(protocol, &script))
    }

    /// Handle to the log of received messages. Take it before the channel is
    /// boxed into a session.
    pub fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    fn record(&self, message: &str) {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

impl ConversationChannel for ScriptedChannel {
    fn seed(&mut self, system_prompt: &str) -> StepwiseResult<()> {
        self.record(system_prompt);
        Ok(())
    }

    fn send(&mut self, message: &str) -> StepwiseResult<String> {
        self.record(message);

        if message != self.protocol.next_step_prompt() {
            return Ok(ACKNOWLEDGEMENT.to_string());
        }

        let reply = self
            .replies
            .pop_front()
            .ok_or_else(|| StepwiseError::ChannelFailure {
                reason: "scripted replies exhausted".to_string(),
            })?;
        debug!(remaining = self.replies.len(), "scripted reply served");
        Ok(reply)
    }
}
