//! System prompts and one-shot prompting.
//!
//! `system_prompt` renders the step protocol contract and injects the tool
//! list from the registry. `FewShot` renders an instruction followed by
//! worked examples. `ask` sends a single prompt and returns the raw reply,
//! with no step protocol at all.

use std::fmt::Write as _;

use stepwise_contracts::{error::StepwiseResult, step::Protocol};

use crate::{registry::ToolRegistry, traits::ConversationChannel};

/// Render the system prompt that establishes `protocol` with the model.
pub fn system_prompt(protocol: Protocol, registry: &ToolRegistry) -> String {
    let mut prompt = String::new();

    match protocol {
        Protocol::Reasoning => {
            prompt.push_str(
                "You are an AI assistant who is expert in breaking down complex problems \
                 and resolving user queries.\n\n\
                 For a given user input, follow these steps in order:\n\
                 1. \"analyse\"\n\
                 2. \"think\" (can repeat multiple times)\n\
                 3. \"output\"\n\
                 4. \"validate\"\n\
                 5. \"result\"\n\n\
                 Rules:\n\
                 - Output a single JSON object at each step in the format:\n  \
                 { \"step\": \"string\", \"content\": \"string\" }\n\
                 - Wait for the next input before continuing to the next step.\n\n\
                 Example Input: What is 2 + 2\n\
                 Example Output:\n\
                 { \"step\": \"analyse\", \"content\": \"The user is asking a basic arithmetic operation.\" }\n\
                 { \"step\": \"think\", \"content\": \"To solve this, I should add 2 and 2.\" }\n\
                 { \"step\": \"output\", \"content\": \"4\" }\n\
                 { \"step\": \"validate\", \"content\": \"2 + 2 equals 4, so the output is correct.\" }\n\
                 { \"step\": \"result\", \"content\": \"2 + 2 = 4\" }\n\n\
                 Respond one step at a time.\n",
            );
        }
        Protocol::ToolUse => {
            prompt.push_str(
                "You are a helpful AI assistant who resolves user queries in plan, action, \
                 observe and output steps.\n\
                 Plan the execution step by step, select a relevant tool from the available \
                 tools, perform an action to call it, wait for the observation and resolve \
                 the query from it.\n\n\
                 Rules:\n\
                 - Always respond with exactly one valid JSON object.\n\
                 - Perform one step at a time and wait for the next input.\n\n\
                 Output JSON Format:\n\
                 {\n    \"step\": \"string\",\n    \"content\": \"string\",\n    \
                 \"function\": \"The name of the function if the step is action\",\n    \
                 \"input\": \"The input parameter for the function\"\n}\n\n",
            );
            prompt.push_str("Available Tools:\n");
            if registry.is_empty() {
                prompt.push_str("- (none)\n");
            }
            for descriptor in registry.descriptors() {
                // Writing to a String cannot fail.
                let _ = writeln!(prompt, "- {} : {}", descriptor.name, descriptor.description);
            }
            prompt.push_str(
                "\nExample:\n\
                 User Query: What is the weather of new york?\n\
                 Output: {\"step\": \"plan\", \"content\": \"The user wants weather data for new york\"}\n\
                 Output: {\"step\": \"action\", \"function\": \"get_weather\", \"input\": \"new york\"}\n\
                 Output: {\"step\": \"observe\", \"content\": \"12 degrees celsius\"}\n\
                 Output: {\"step\": \"output\", \"content\": \"The weather in new york is 12 degrees.\"}\n",
            );
        }
    }

    prompt
}

/// One worked example in a few-shot prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub input: String,
    pub output: String,
}

impl Example {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Parse the CLI form `"input=>output"`.
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (input, output) = pair.split_once("=>")?;
        let (input, output) = (input.trim(), output.trim());
        if input.is_empty() || output.is_empty() {
            return None;
        }
        Some(Self::new(input, output))
    }
}

/// An instruction followed by worked examples.
#[derive(Debug, Clone, Default)]
pub struct FewShot {
    pub instruction: String,
    pub examples: Vec<Example>,
}

impl FewShot {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            examples: Vec::new(),
        }
    }

    pub fn example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push(Example::new(input, output));
        self
    }

    pub fn render(&self) -> String {
        let mut text = self.instruction.trim().to_string();
        if !self.examples.is_empty() {
            text.push_str("\n\nExample:");
            for example in &self.examples {
                let _ = write!(
                    text,
                    "\nInput: {}\nOutput: {}\n",
                    example.input, example.output
                );
            }
        }
        text
    }
}

/// Single-shot prompting: optionally seed a system instruction, send one
/// prompt, return the raw reply.
pub fn ask(
    channel: &mut dyn ConversationChannel,
    system_instruction: Option<&str>,
    prompt: &str,
) -> StepwiseResult<String> {
    if let Some(instruction) = system_instruction {
        channel.seed(instruction)?;
    }
    channel.send(prompt)
}
