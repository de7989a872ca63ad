//! Canned scenarios that drive the real loop over a `ScriptedChannel`.
//!
//! Each scenario wires the policy, transcript, registry and narrator the
//! same way an interactive session does; only the model is replaced by a
//! script.

pub mod reasoning;
pub mod weather;

use stepwise_audit::{InMemoryTranscript, TranscriptLog};
use stepwise_contracts::{capability::CapabilitySet, turn::QueryOutcome};
use stepwise_core::{AgentLoop, Session};

use crate::terminal::render_failure;

/// What a scenario run produced.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Queries that reached a terminal step.
    pub outcomes: Vec<QueryOutcome>,
    /// Rendered failures of the queries that did not.
    pub failures: Vec<String>,
    pub transcript: TranscriptLog,
    pub integrity_verified: bool,
}

/// Run `queries` one after another on `session`, printing as they go.
///
/// A failing query is printed and recorded; the next query still runs.
pub(crate) fn run_queries(
    agent: &AgentLoop,
    session: &mut Session,
    capabilities: &CapabilitySet,
    transcript: &InMemoryTranscript,
    queries: &[&str],
) -> ScenarioReport {
    let mut outcomes = Vec::new();
    let mut failures = Vec::new();

    for query in queries {
        println!(">> {}", query);
        match agent.run_query(session, capabilities, query) {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                let rendered = render_failure(&err);
                println!("{}", rendered);
                failures.push(rendered);
            }
        }
        println!();
    }

    let integrity_verified = transcript.verify_integrity();
    let log = transcript.export_log();
    println!(
        "  Transcript integrity:  {} ({} entr{} in chain)",
        if integrity_verified { "VERIFIED" } else { "FAILED" },
        log.events.len(),
        if log.events.len() == 1 { "y" } else { "ies" }
    );
    println!();

    ScenarioReport {
        outcomes,
        failures,
        transcript: log,
        integrity_verified,
    }
}
