//! Scenario: chain-of-thought arithmetic.
//!
//! The model walks analyse → think → think → output → validate → result.
//! The script mixes the reply shapes real models produce: the American
//! spelling `analyze`, a markdown-fenced object and an object preceded by
//! chatter. `output` is an intermediate step here; only `result` ends the
//! query.

use stepwise_audit::InMemoryTranscript;
use stepwise_contracts::{error::StepwiseResult, step::Protocol};
use stepwise_core::{prompt::system_prompt, AgentLoop, Session, ToolRegistry};
use stepwise_policy::{RuntimeConfig, TomlToolPolicy};

use crate::{channel::ScriptedChannel, terminal::ConsoleNarrator, DEFAULT_CONFIG};

use super::{run_queries, ScenarioReport};

pub const QUERY: &str = "What is 2 + 2";

fn script() -> Vec<&'static str> {
    vec![
        r#"{"step": "analyze", "content": "The user is asking a basic arithmetic operation involving addition."}"#,
        "```json\n{\"step\": \"think\", \"content\": \"To solve this, I should add 2 and 2.\"}\n```",
        "Sure, here is the next step:\n{\"step\": \"think\", \"content\": \"Adding 2 to 2 gives 4.\"}",
        r#"{"step": "output", "content": "4"}"#,
        r#"{"step": "validate", "content": "Double-checking: 2 + 2 equals 4, so the output is correct."}"#,
        r#"{"step": "result", "content": "2 + 2 = 4, calculated by adding the operands."}"#,
    ]
}

pub fn run_scenario() -> StepwiseResult<ScenarioReport> {
    println!("=== Scenario: Reasoning protocol ===");
    println!();

    let config = RuntimeConfig::from_toml_str(DEFAULT_CONFIG)?;
    let registry = ToolRegistry::empty();
    let prompt = system_prompt(Protocol::Reasoning, &registry);

    let transcript = InMemoryTranscript::new("scenario-reasoning");
    let agent = AgentLoop::new(
        registry,
        Box::new(TomlToolPolicy::from_config(&config)),
        Box::new(transcript.clone()),
        config.agent.loop_settings(),
    )
    .with_narrator(Box::new(ConsoleNarrator));

    let channel = ScriptedChannel::new(Protocol::Reasoning, script());
    let mut session = Session::open(Box::new(channel), Protocol::Reasoning, &prompt)?;

    let report = run_queries(
        &agent,
        &mut session,
        &config.agent.capability_set(),
        &transcript,
        &[QUERY],
    );

    println!("  Scenario complete.");
    println!();
    Ok(report)
}
