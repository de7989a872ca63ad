//! Scenario: tool use with layered enforcement.
//!
//! Three queries run on one seeded session:
//!
//!   1. Weather in paris: plan → action(get_weather) → observe → output.
//!      Policy allows, `weather:read` is granted, the tool runs.
//!   2. Weather in atlantis: the tool runs and reports its own failure in
//!      the observation text; the model still answers.
//!   3. List files: the model asks for `run_command`. The session lacks
//!      `shell:exec`, so the policy denies it and nothing runs.

use stepwise_audit::InMemoryTranscript;
use stepwise_contracts::{error::StepwiseResult, step::Protocol};
use stepwise_core::{prompt::system_prompt, AgentLoop, Session};
use stepwise_policy::{RuntimeConfig, TomlToolPolicy};

use crate::{
    channel::ScriptedChannel, terminal::ConsoleNarrator, tools::reference_registry,
    DEFAULT_CONFIG,
};

use super::{run_queries, ScenarioReport};

pub const QUERIES: [&str; 3] = [
    "What is the weather in paris?",
    "What is the weather in atlantis?",
    "List the files in the current directory",
];

fn script() -> Vec<&'static str> {
    vec![
        // Query 1
        r#"{"step": "plan", "content": "The user is interested in weather data of paris"}"#,
        r#"{"step": "plan", "content": "From the available tools I should call get_weather"}"#,
        r#"{"step": "action", "function": "get_weather", "input": "paris"}"#,
        r#"{"step": "observe", "content": "The weather in paris is Sunny +20°C."}"#,
        r#"{"step": "output", "content": "It is sunny in paris at 20°C."}"#,
        // Query 2
        r#"{"step": "plan", "content": "The user wants the weather of atlantis"}"#,
        "```json\n{\"step\": \"action\", \"function\": \"get_weather\", \"input\": \"atlantis\"}\n```",
        r#"{"step": "output", "content": "I could not find weather data for atlantis."}"#,
        // Query 3
        r#"{"step": "plan", "content": "I should list the directory with run_command"}"#,
        r#"{"step": "action", "function": "run_command", "input": "ls"}"#,
    ]
}

pub fn run_scenario() -> StepwiseResult<ScenarioReport> {
    println!("=== Scenario: Tool use ===");
    println!();

    let config = RuntimeConfig::from_toml_str(DEFAULT_CONFIG)?;
    let registry = reference_registry(config.tools.allowed_commands.as_deref())?;
    let prompt = system_prompt(Protocol::ToolUse, &registry);

    let capabilities = config.agent.capability_set();
    println!("  Granted capabilities: {}", capabilities.names().join(", "));
    println!();

    let transcript = InMemoryTranscript::new("scenario-weather");
    let agent = AgentLoop::new(
        registry,
        Box::new(TomlToolPolicy::from_config(&config)),
        Box::new(transcript.clone()),
        config.agent.loop_settings(),
    )
    .with_narrator(Box::new(ConsoleNarrator));

    let channel = ScriptedChannel::new(Protocol::ToolUse, script());
    let mut session = Session::open(Box::new(channel), Protocol::ToolUse, &prompt)?;

    let report = run_queries(&agent, &mut session, &capabilities, &transcript, &QUERIES);

    println!("  Scenario complete.");
    println!();
    Ok(report)
}
