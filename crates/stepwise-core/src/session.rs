//! A seeded conversation reused across user queries.

use tracing::{debug, info};

use stepwise_contracts::{error::StepwiseResult, step::Protocol};

use crate::traits::ConversationChannel;

/// Exclusive owner of one conversation channel.
///
/// The channel is seeded with the system prompt exactly once, when the
/// session opens. Each user query then runs one agent loop to completion on
/// the same session; nothing survives the process.
pub struct Session {
    channel: Box<dyn ConversationChannel>,
    protocol: Protocol,
    queries: u64,
    sends: u64,
}

impl Session {
    /// Seed `channel` with `system_prompt` and wrap it in a session.
    pub fn open(
        mut channel: Box<dyn ConversationChannel>,
        protocol: Protocol,
        system_prompt: &str,
    ) -> StepwiseResult<Self> {
        channel.seed(system_prompt)?;
        info!(protocol = %protocol, prompt_len = system_prompt.len(), "session seeded");
        Ok(Self {
            channel,
            protocol,
            queries: 0,
            sends: 0,
        })
    }

    /// The protocol announced by the system prompt.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Send one message and block for the reply.
    pub fn send(&mut self, message: &str) -> StepwiseResult<String> {
        self.sends += 1;
        debug!(send = self.sends, message_len = message.len(), "sending to model");
        let reply = self.channel.send(message)?;
        debug!(send = self.sends, reply_len = reply.len(), "model replied");
        Ok(reply)
    }

    /// Number of queries started on this session.
    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub(crate) fn begin_query(&mut self) -> u64 {
        self.queries += 1;
        self.queries
    }
}
