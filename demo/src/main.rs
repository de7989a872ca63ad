//! Stepwise demo CLI
//!
//! Runs the canned scenarios, an interactive query loop, or a single
//! few-shot prompt. No network transport is involved: model replies come
//! from a script file or from the person at the terminal.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- reasoning
//!   cargo run -p demo -- weather
//!   cargo run -p demo -- chat --script replies.txt
//!   cargo run -p demo -- ask --example "2 + 2=>4" "What is 3 * 10?"

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stepwise_audit::InMemoryTranscript;
use stepwise_contracts::{
    error::{StepwiseError, StepwiseResult},
    step::Protocol,
};
use stepwise_core::{
    prompt::{self, Example, FewShot},
    traits::ConversationChannel,
    AgentLoop, Session, ToolRegistry,
};
use stepwise_policy::{RuntimeConfig, TomlToolPolicy};
use stepwise_ref::{
    channel::{ConsoleChannel, ScriptedChannel},
    scenarios::{reasoning, weather},
    terminal::{render_failure, ConsoleApprover, ConsoleNarrator},
    tools::reference_registry,
    DEFAULT_CONFIG,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Stepwise: a step-at-a-time, tool-calling agent loop.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Stepwise agent runtime demo",
    long_about = "Drives the stepwise agent loop: canned scenarios, an interactive\n\
                  query loop, or a single few-shot prompt."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run both canned scenarios in sequence.
    RunAll,
    /// Reasoning protocol: analyse → think → output → validate → result.
    Reasoning,
    /// Tool use: plan → action → observe → output, with policy enforcement.
    Weather,
    /// Interactive query loop on one seeded session.
    Chat {
        /// Runtime configuration (TOML). Defaults to the embedded config.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured protocol: `reasoning` or `tool-use`.
        #[arg(long)]
        protocol: Option<Protocol>,
        /// Replay model replies from this file instead of reading them from
        /// the terminal. Replies are separated by blank lines, so a reply
        /// may not contain an empty line.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Write the hash-chained transcript as JSON on exit.
        #[arg(long)]
        export_transcript: Option<PathBuf>,
    },
    /// Send one prompt, optionally with a system instruction and examples.
    Ask {
        #[arg(long)]
        system: Option<String>,
        /// Worked example as `INPUT=>OUTPUT`; repeatable.
        #[arg(long = "example", value_parser = parse_example)]
        examples: Vec<Example>,
        prompt: String,
    },
}

fn parse_example(s: &str) -> Result<Example, String> {
    Example::parse_pair(s).ok_or_else(|| format!("expected INPUT=>OUTPUT, got '{}'", s))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => {
            print_banner();
            run_all()
        }
        Command::Reasoning => {
            print_banner();
            reasoning::run_scenario().map(|_| ())
        }
        Command::Weather => {
            print_banner();
            weather::run_scenario().map(|_| ())
        }
        Command::Chat {
            config,
            protocol,
            script,
            export_transcript,
        } => run_chat(
            config.as_deref(),
            protocol,
            script.as_deref(),
            export_transcript.as_deref(),
        ),
        Command::Ask {
            system,
            examples,
            prompt,
        } => run_ask(system, examples, &prompt),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> StepwiseResult<()> {
    reasoning::run_scenario()?;
    weather::run_scenario()?;
    println!("All scenarios completed.");
    Ok(())
}

// ── Interactive loop ──────────────────────────────────────────────────────────

fn run_chat(
    config_path: Option<&Path>,
    protocol: Option<Protocol>,
    script: Option<&Path>,
    export_to: Option<&Path>,
) -> StepwiseResult<()> {
    let config = match config_path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::from_toml_str(DEFAULT_CONFIG)?,
    };
    let protocol = protocol.unwrap_or(config.agent.protocol);

    let registry = match protocol {
        Protocol::ToolUse => reference_registry(config.tools.allowed_commands.as_deref())?,
        Protocol::Reasoning => ToolRegistry::empty(),
    };
    let system_prompt = prompt::system_prompt(protocol, &registry);

    let channel: Box<dyn ConversationChannel> = match script {
        Some(path) => Box::new(ScriptedChannel::from_file(protocol, path)?),
        None => Box::new(ConsoleChannel::stdio()),
    };

    let transcript = InMemoryTranscript::new("chat");
    let agent = AgentLoop::new(
        registry,
        Box::new(TomlToolPolicy::from_config(&config)),
        Box::new(transcript.clone()),
        config.agent.loop_settings(),
    )
    .with_narrator(Box::new(ConsoleNarrator))
    .with_approver(Box::new(ConsoleApprover));

    let capabilities = config.agent.capability_set();
    let mut session = Session::open(channel, protocol, &system_prompt)?;
    info!(protocol = %protocol, tools = agent.registry().len(), "chat session ready");

    loop {
        print!(">> ");
        io::stdout().flush().map_err(|e| StepwiseError::ChannelFailure {
            reason: format!("stdout flush failed: {}", e),
        })?;

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .map_err(|e| StepwiseError::ChannelFailure {
                reason: format!("stdin read failed: {}", e),
            })?;
        if read == 0 {
            println!();
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" {
            break;
        }

        if let Err(err) = agent.run_query(&mut session, &capabilities, query) {
            println!("{}", render_failure(&err));
        }
    }

    if let Some(path) = export_to {
        export_transcript(&transcript, path)?;
    }
    Ok(())
}

fn export_transcript(transcript: &InMemoryTranscript, path: &Path) -> StepwiseResult<()> {
    let json = transcript.export_log().to_json_pretty()?;
    std::fs::write(path, json).map_err(|e| StepwiseError::TranscriptWriteFailed {
        reason: format!("failed to write '{}': {}", path.display(), e),
    })?;
    println!(
        "Transcript written to {} ({} entries, integrity {})",
        path.display(),
        transcript.len(),
        if transcript.verify_integrity() { "verified" } else { "FAILED" }
    );
    Ok(())
}

// ── Single-shot prompting ─────────────────────────────────────────────────────

fn run_ask(system: Option<String>, examples: Vec<Example>, prompt_text: &str) -> StepwiseResult<()> {
    let instruction = if system.is_none() && examples.is_empty() {
        None
    } else {
        let mut few_shot = FewShot::new(system.unwrap_or_default());
        few_shot.examples = examples;
        Some(few_shot.render())
    };

    let mut channel = ConsoleChannel::stdio();
    let reply = prompt::ask(&mut channel, instruction.as_deref(), prompt_text)?;
    println!("{}", reply);
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Stepwise: step-at-a-time agent loop");
    println!("===================================");
    println!();
    println!("Per model reply:");
    println!("  [1] Request exactly one step and parse one JSON object from the reply");
    println!("  [2] Decode it against the protocol; incomplete or foreign steps end the query");
    println!("  [3] For an action: registry lookup → policy → capability check → tool");
    println!("  [4] Feed the tool output back as an observe step");
    println!("  [5] Record the turn in the SHA-256 transcript chain");
    println!();
}
