//! A channel where a person at the terminal plays the model.
//!
//! Each outgoing message is printed; the reply is read line by line until a
//! blank line. This lets the whole loop run without any network transport.

use std::io::{self, BufRead, Write};

use stepwise_contracts::error::{StepwiseError, StepwiseResult};
use stepwise_core::traits::ConversationChannel;

/// Reads one line into the buffer, returning the bytes read (0 at EOF).
pub type ReadLine = Box<dyn FnMut(&mut String) -> io::Result<usize> + Send>;

pub struct ConsoleChannel {
    read_line: ReadLine,
    out: Box<dyn Write + Send>,
}

impl ConsoleChannel {
    pub fn new(read_line: ReadLine, out: Box<dyn Write + Send>) -> Self {
        Self { read_line, out }
    }

    /// Read from the process stdin and print to stdout.
    ///
    /// Lines are read through `Stdin::read_line`, which shares std's buffer,
    /// so the host may keep reading user queries from stdin in between.
    pub fn stdio() -> Self {
        Self::new(
            Box::new(|buf: &mut String| io::stdin().read_line(buf)),
            Box::new(io::stdout()),
        )
    }

    pub fn from_reader<R>(mut reader: R, out: Box<dyn Write + Send>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self::new(Box::new(move |buf: &mut String| reader.read_line(buf)), out)
    }

    fn print(&mut self, label: &str, message: &str) -> StepwiseResult<()> {
        writeln!(self.out, "[{}]\n{}", label, message)
            .and_then(|()| self.out.flush())
            .map_err(|e| StepwiseError::ChannelFailure {
                reason: format!("console write failed: {}", e),
            })
    }

    fn read_reply(&mut self) -> StepwiseResult<String> {
        let mut lines: Vec<String> = Vec::new();
        loop {
            let mut line = String::new();
            let read = (self.read_line)(&mut line).map_err(|e| StepwiseError::ChannelFailure {
                reason: format!("console read failed: {}", e),
            })?;
            if read == 0 {
                if lines.is_empty() {
                    return Err(StepwiseError::ChannelFailure {
                        reason: "console input closed".to_string(),
                    });
                }
                break;
            }
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if line.trim().is_empty() {
                if lines.is_empty() {
                    continue;
                }
                break;
            }
            lines.push(line.to_string());
        }
        Ok(lines.join("\n"))
    }
}

impl ConversationChannel for ConsoleChannel {
    fn seed(&mut self, system_prompt: &str) -> StepwiseResult<()> {
        self.print("system", system_prompt)
    }

    fn send(&mut self, message: &str) -> StepwiseResult<String> {
        self.print("to model", message)?;
        self.read_reply()
    }
}
