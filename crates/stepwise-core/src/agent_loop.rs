//! The agent loop: the sequential, step-at-a-time dispatcher.
//!
//! One call to `run_query` drives one user query to its end:
//!
//!   Relay query → [Request step → Parse → Decode → Narrate → Record → Dispatch]*
//!
//! where dispatching an `action` step runs
//!
//!   Lookup → Policy → Capability → Narrate → Tool::invoke → Observation
//!
//! A tool only runs after the registry knows it, the policy allows it and
//! the session holds every capability the tool declares. When the policy
//! wants approval, the capability check runs before the approver is asked.
//! An action step is narrated only once its tool is about to run. The next step is never requested before the previous step,
//! including its tool call and observation, has finished.

use chrono::Utc;
use tracing::{debug, info, warn};

use stepwise_contracts::{
    capability::{Capability, CapabilitySet},
    error::{StepwiseError, StepwiseResult},
    step::Step,
    tool::{ToolCall, ToolRequest, ToolVerdict},
    turn::{QueryId, QueryOutcome, TurnEvent, TurnRecord},
};

use crate::{
    parser, shape,
    registry::ToolRegistry,
    session::Session,
    traits::{Approver, Narrator, Silent, Tool, ToolPolicy, TranscriptWriter},
};

/// Step cap applied when the configuration does not set one.
pub const DEFAULT_MAX_STEPS: u32 = 64;

/// Tunables for one agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Steps a single query may dispatch before it is abandoned with
    /// `StepLimitExceeded`. `0` removes the cap.
    pub max_steps: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Drives queries over a session.
///
/// Construct one per process; it owns the registry and the trusted
/// components and can serve any number of queries and sessions.
pub struct AgentLoop {
    registry: ToolRegistry,
    policy: Box<dyn ToolPolicy>,
    transcript: Box<dyn TranscriptWriter>,
    approver: Option<Box<dyn Approver>>,
    narrator: Box<dyn Narrator>,
    settings: LoopSettings,
}

/// Per-query bookkeeping.
struct QueryRun {
    query_id: QueryId,
    turn: u64,
    steps: u32,
    tool_calls: Vec<ToolCall>,
}

impl QueryRun {
    fn record(&mut self, transcript: &dyn TranscriptWriter, event: TurnEvent) -> StepwiseResult<()> {
        let record = TurnRecord {
            query_id: self.query_id.clone(),
            turn: self.turn,
            event,
            timestamp: Utc::now(),
        };
        transcript.write(&record)?;
        self.turn += 1;
        Ok(())
    }
}

impl AgentLoop {
    pub fn new(
        registry: ToolRegistry,
        policy: Box<dyn ToolPolicy>,
        transcript: Box<dyn TranscriptWriter>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            registry,
            policy,
            transcript,
            approver: None,
            narrator: Box::new(Silent),
            settings,
        }
    }

    /// Let `approver` decide invocations the policy marks `RequireApproval`.
    /// Without one, such invocations are denied.
    pub fn with_approver(mut self, approver: Box<dyn Approver>) -> Self {
        self.approver = Some(approver);
        self
    }

    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    /// Run one user query on `session` until a terminal step or a failure.
    ///
    /// # Errors
    ///
    /// Every error is terminal for this query only and is recorded in the
    /// transcript before it is returned: `ChannelFailure`, `ParseFailure`,
    /// `IncompleteStep`, `UnexpectedStep`, `UnknownTool`, `ToolDenied`,
    /// `CapabilityMissing`, `StepLimitExceeded` and `TranscriptWriteFailed`.
    /// The session stays usable for the next query.
    pub fn run_query(
        &self,
        session: &mut Session,
        capabilities: &CapabilitySet,
        query: &str,
    ) -> StepwiseResult<QueryOutcome> {
        let ordinal = session.begin_query();
        let mut run = QueryRun {
            query_id: QueryId::new(),
            turn: 0,
            steps: 0,
            tool_calls: Vec::new(),
        };
        let query_id = run.query_id.to_string();

        info!(
            query_id = %query_id,
            query = ordinal,
            protocol = %session.protocol(),
            "query started"
        );

        let result = self.drive(&mut run, session, capabilities, query);

        if let Err(err) = &result {
            warn!(query_id = %query_id, steps = run.steps, error = %err, "query failed");
            let failed = TurnEvent::Failed {
                reason: err.to_string(),
            };
            if let Err(write_err) = run.record(self.transcript.as_ref(), failed) {
                warn!(query_id = %query_id, error = %write_err, "could not record query failure");
            }
        }

        if let Err(err) = self.transcript.finalize(&query_id) {
            warn!(query_id = %query_id, error = %err, "could not finalize query transcript");
            // A query that already failed keeps its own error.
            if result.is_ok() {
                return Err(err);
            }
        }
        result
    }

    fn drive(
        &self,
        run: &mut QueryRun,
        session: &mut Session,
        capabilities: &CapabilitySet,
        query: &str,
    ) -> StepwiseResult<QueryOutcome> {
        let protocol = session.protocol();

        // The acknowledgement of the query carries no step; the first step
        // comes from the first explicit request below.
        session.send(&protocol.frame_query(query))?;
        run.record(
            self.transcript.as_ref(),
            TurnEvent::Query {
                text: query.to_string(),
            },
        )?;

        loop {
            if self.settings.max_steps > 0 && run.steps >= self.settings.max_steps {
                return Err(StepwiseError::StepLimitExceeded {
                    limit: self.settings.max_steps,
                });
            }

            let reply = session.send(protocol.next_step_prompt())?;
            let object = parser::parse(&reply)?;
            let step = shape::decode(&object, protocol)?;
            run.steps += 1;

            debug!(
                query_id = %run.query_id,
                step = run.steps,
                kind = %step.kind(),
                "step decoded"
            );

            // Actions are narrated by dispatch, once the call is cleared.
            if !matches!(step, Step::Action { .. }) {
                self.narrator.step(protocol, &step);
            }
            run.record(self.transcript.as_ref(), TurnEvent::Step { step: step.clone() })?;

            let kind = step.kind();
            match &step {
                Step::Action { function, input } => {
                    let call = self.dispatch_action(run, session, capabilities, &step, function, input)?;
                    run.tool_calls.push(call);
                }

                Step::Output { content } | Step::Result { content }
                    if protocol.is_terminal(kind) =>
                {
                    info!(
                        query_id = %run.query_id,
                        steps = run.steps,
                        tool_calls = run.tool_calls.len(),
                        "query reached terminal step"
                    );
                    return Ok(QueryOutcome {
                        query_id: run.query_id.clone(),
                        answer: content.clone(),
                        steps: run.steps,
                        tool_calls: std::mem::take(&mut run.tool_calls),
                    });
                }

                // Narration only; no side effects.
                Step::Analyse { .. }
                | Step::Think { .. }
                | Step::Output { .. }
                | Step::Validate { .. }
                | Step::Result { .. }
                | Step::Plan { .. }
                | Step::Observe { .. } => {}
            }
        }
    }

    /// Run the tool an action step names and feed its output back.
    fn dispatch_action(
        &self,
        run: &mut QueryRun,
        session: &mut Session,
        capabilities: &CapabilitySet,
        step: &Step,
        function: &str,
        input: &str,
    ) -> StepwiseResult<ToolCall> {
        let tool = self
            .registry
            .lookup(function)
            .ok_or_else(|| StepwiseError::UnknownTool {
                name: function.to_string(),
            })?;

        let request = ToolRequest {
            query_id: run.query_id.to_string(),
            tool: function.to_string(),
            input: input.to_string(),
            capabilities: capabilities.names(),
        };

        // ── Policy and capability gates ──────────────────────────────────────────────────────
        match self.policy.evaluate(&request)? {
            ToolVerdict::Allow => self.check_capabilities(run, tool, capabilities)?,

            ToolVerdict::Deny { reason } => {
                return Err(self.refuse(run, function, reason)?);
            }

            ToolVerdict::RequireApproval { reason } => {
                // Capabilities first: nobody is asked about a call that cannot run.
                self.check_capabilities(run, tool, capabilities)?;
                let approved = self
                    .approver
                    .as_ref()
                    .is_some_and(|approver| approver.approve(&request, &reason));
                if !approved {
                    return Err(self.refuse(run, function, format!("approval withheld: {}", reason))?);
                }
                info!(query_id = %run.query_id, tool = %function, "invocation approved");
            }
        }

        // ── Invocation ───────────────────────────────────────────────────────
        self.narrator.step(session.protocol(), step);
        debug!(query_id = %run.query_id, tool = %function, input_len = input.len(), "invoking tool");
        let output = tool.invoke(input);

        run.record(
            self.transcript.as_ref(),
            TurnEvent::ToolInvoked {
                tool: function.to_string(),
                input: input.to_string(),
                output: output.clone(),
            },
        )?;

        // ── Observation round-trip ───────────────────────────────────────────
        let observation = serde_json::to_string(&Step::Observe {
            content: output.clone(),
        })
        .map_err(|e| StepwiseError::ChannelFailure {
            reason: format!("could not encode observation: {}", e),
        })?;
        session.send(&observation)?;

        Ok(ToolCall {
            tool: function.to_string(),
            input: input.to_string(),
            output,
        })
    }

    /// Refuse the call unless the session holds every capability `tool`
    /// declares.
    fn check_capabilities(
        &self,
        run: &mut QueryRun,
        tool: &dyn Tool,
        capabilities: &CapabilitySet,
    ) -> StepwiseResult<()> {
        for name in tool.required_capabilities() {
            if !capabilities.has(&Capability::new(name.as_str())) {
                warn!(
                    query_id = %run.query_id,
                    tool = %tool.name(),
                    capability = %name,
                    "capability missing, tool not invoked"
                );
                run.record(
                    self.transcript.as_ref(),
                    TurnEvent::ToolRefused {
                        tool: tool.name().to_string(),
                        reason: format!("capability '{}' not granted", name),
                    },
                )?;
                return Err(StepwiseError::CapabilityMissing {
                    capability: name,
                    tool: tool.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Record a refused invocation and build the matching error.
    fn refuse(
        &self,
        run: &mut QueryRun,
        tool: &str,
        reason: String,
    ) -> StepwiseResult<StepwiseError> {
        warn!(query_id = %run.query_id, tool = %tool, reason = %reason, "tool invocation refused");
        run.record(
            self.transcript.as_ref(),
            TurnEvent::ToolRefused {
                tool: tool.to_string(),
                reason: reason.clone(),
            },
        )?;
        Ok(StepwiseError::ToolDenied {
            tool: tool.to_string(),
            reason,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use stepwise_contracts::{
        capability::CapabilitySet,
        error::{StepwiseError, StepwiseResult},
        step::{Protocol, Step, StepKind},
        tool::{ToolRequest, ToolVerdict},
        turn::{TurnEvent, TurnRecord},
    };

    use crate::{
        registry::{FnTool, ToolRegistry},
        session::Session,
        traits::{AllowAll, Approver, ConversationChannel, Narrator, ToolPolicy, TranscriptWriter},
    };

    use super::{AgentLoop, LoopSettings};

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// Shared, ordered log of everything the channel and tools observe.
    type EventLog = Arc<Mutex<Vec<String>>>;

    /// A channel that answers step requests from a queue and acknowledges
    /// every other message.
    struct MockChannel {
        protocol: Protocol,
        replies: VecDeque<String>,
        log: EventLog,
        tool_in_flight: Arc<AtomicBool>,
        fail_on_send: Option<usize>,
        sends: usize,
    }

    impl MockChannel {
        fn new(protocol: Protocol, replies: &[&str], log: EventLog, in_flight: Arc<AtomicBool>) -> Self {
            Self {
                protocol,
                replies: replies.iter().map(|r| r.to_string()).collect(),
                log,
                tool_in_flight: in_flight,
                fail_on_send: None,
                sends: 0,
            }
        }
    }

    impl ConversationChannel for MockChannel {
        fn seed(&mut self, _system_prompt: &str) -> StepwiseResult<()> {
            self.log.lock().unwrap().push("seed".to_string());
            Ok(())
        }

        fn send(&mut self, message: &str) -> StepwiseResult<String> {
            assert!(
                !self.tool_in_flight.load(Ordering::SeqCst),
                "channel send issued while a tool invocation was in flight"
            );
            self.sends += 1;
            if self.fail_on_send == Some(self.sends) {
                return Err(StepwiseError::ChannelFailure {
                    reason: "connection reset".to_string(),
                });
            }

            if message == self.protocol.next_step_prompt() {
                self.log.lock().unwrap().push("next".to_string());
                self.replies.pop_front().ok_or_else(|| StepwiseError::ChannelFailure {
                    reason: "script exhausted".to_string(),
                })
            } else {
                self.log.lock().unwrap().push(format!("send:{}", message));
                Ok("OK".to_string())
            }
        }
    }

    /// A tool that logs its start and end and flags itself in flight.
    fn logged_tool(name: &str, log: EventLog, in_flight: Arc<AtomicBool>) -> FnTool {
        let tool_name = name.to_string();
        FnTool::new(name, "test tool", move |input| {
            assert!(!in_flight.swap(true, Ordering::SeqCst), "tool invocations overlapped");
            log.lock().unwrap().push(format!("invoke:{}:{}", tool_name, input));
            let output = format!("The weather in {} is Sunny +20°C.", input);
            log.lock().unwrap().push(format!("done:{}", tool_name));
            in_flight.store(false, Ordering::SeqCst);
            output
        })
    }

    struct MockTranscript {
        records: Arc<Mutex<Vec<TurnRecord>>>,
        finalized: Arc<Mutex<Vec<String>>>,
        fail_finalize: bool,
    }

    impl MockTranscript {
        fn new() -> Self {
            Self {
                records: Arc::new(Mutex::new(vec![])),
                finalized: Arc::new(Mutex::new(vec![])),
                fail_finalize: false,
            }
        }
    }

    impl TranscriptWriter for MockTranscript {
        fn write(&self, record: &TurnRecord) -> StepwiseResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, query_id: &str) -> StepwiseResult<()> {
            if self.fail_finalize {
                return Err(StepwiseError::TranscriptWriteFailed {
                    reason: "disk full".to_string(),
                });
            }
            self.finalized.lock().unwrap().push(query_id.to_string());
            Ok(())
        }
    }

    struct FixedPolicy {
        verdict: ToolVerdict,
    }

    impl ToolPolicy for FixedPolicy {
        fn evaluate(&self, _request: &ToolRequest) -> StepwiseResult<ToolVerdict> {
            Ok(self.verdict.clone())
        }
    }

    struct FixedApprover {
        answer: bool,
        asked: Arc<Mutex<u32>>,
    }

    impl Approver for FixedApprover {
        fn approve(&self, _request: &ToolRequest, _reason: &str) -> bool {
            *self.asked.lock().unwrap() += 1;
            self.answer
        }
    }

    struct RecordingNarrator {
        kinds: Arc<Mutex<Vec<StepKind>>>,
    }

    impl Narrator for RecordingNarrator {
        fn step(&self, _protocol: Protocol, step: &Step) {
            self.kinds.lock().unwrap().push(step.kind());
        }
    }

    /// Everything a test needs to drive one query.
    struct Harness {
        log: EventLog,
        in_flight: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                log: Arc::new(Mutex::new(vec![])),
                in_flight: Arc::new(AtomicBool::new(false)),
            }
        }

        fn session(&self, protocol: Protocol, replies: &[&str]) -> Session {
            let channel = MockChannel::new(
                protocol,
                replies,
                Arc::clone(&self.log),
                Arc::clone(&self.in_flight),
            );
            Session::open(Box::new(channel), protocol, "system").unwrap()
        }

        fn weather_registry(&self) -> ToolRegistry {
            ToolRegistry::builder()
                .register(logged_tool(
                    "get_weather",
                    Arc::clone(&self.log),
                    Arc::clone(&self.in_flight),
                ))
                .build()
                .unwrap()
        }

        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.events().iter().filter(|e| e.starts_with(prefix)).count()
        }
    }

    const PLAN: &str = r#"{"step": "plan", "content": "The user wants the weather in paris"}"#;
    const ACTION: &str = r#"{"step": "action", "function": "get_weather", "input": "paris"}"#;
    const OBSERVE: &str = r#"{"step": "observe", "content": "Sunny +20°C"}"#;
    const OUTPUT: &str = r#"{"step": "output", "content": "done"}"#;

    fn allow_all_loop(registry: ToolRegistry) -> AgentLoop {
        AgentLoop::new(
            registry,
            Box::new(AllowAll),
            Box::new(MockTranscript::new()),
            LoopSettings::default(),
        )
    }

    // ── Test cases ───────────────────────────────────────────────────────────

    /// plan → action → observe → output: one invocation, one observation,
    /// and no step request after the terminal output.
    #[test]
    fn test_tool_use_query_terminates_on_output() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut session = h.session(Protocol::ToolUse, &[PLAN, ACTION, OBSERVE, OUTPUT, PLAN]);

        let outcome = agent
            .run_query(&mut session, &CapabilitySet::default(), "weather in paris?")
            .unwrap();

        assert_eq!(outcome.answer, "done");
        assert_eq!(outcome.steps, 4);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].tool, "get_weather");
        assert_eq!(outcome.tool_calls[0].input, "paris");

        assert_eq!(h.count("invoke:"), 1);
        assert_eq!(h.count("invoke:get_weather:paris"), 1);
        assert_eq!(h.count("send:{\"step\":\"observe\""), 1);
        assert_eq!(h.count("next"), 4, "no step may be requested after output");
    }

    /// The n-th step request is only issued after the (n-1)-th step's tool
    /// call and observation round-trip have finished.
    #[test]
    fn test_steps_are_strictly_sequential() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut session = h.session(Protocol::ToolUse, &[PLAN, ACTION, ACTION, OUTPUT]);

        agent
            .run_query(&mut session, &CapabilitySet::default(), "twice")
            .unwrap();

        let events = h.events();
        let expected = vec![
            "seed".to_string(),
            "send:User query: twice".to_string(),
            "next".to_string(),
            "next".to_string(),
            "invoke:get_weather:paris".to_string(),
            "done:get_weather".to_string(),
            "send:{\"step\":\"observe\",\"content\":\"The weather in paris is Sunny +20°C.\"}".to_string(),
            "next".to_string(),
            "invoke:get_weather:paris".to_string(),
            "done:get_weather".to_string(),
            "send:{\"step\":\"observe\",\"content\":\"The weather in paris is Sunny +20°C.\"}".to_string(),
            "next".to_string(),
        ];
        assert_eq!(events, expected);
    }

    #[test]
    fn test_unknown_tool_ends_query_without_invocation() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut session = h.session(
            Protocol::ToolUse,
            &[r#"{"step": "action", "function": "query_db", "input": "select 1"}"#, OUTPUT],
        );

        let result = agent.run_query(&mut session, &CapabilitySet::default(), "db?");

        match result {
            Err(StepwiseError::UnknownTool { name }) => assert_eq!(name, "query_db"),
            other => panic!("expected UnknownTool, got {:?}", other),
        }
        assert_eq!(h.count("invoke:"), 0);
        assert_eq!(h.count("next"), 1);
    }

    #[test]
    fn test_missing_content_is_rejected_at_dispatch() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut session = h.session(Protocol::ToolUse, &[r#"{"step": "plan"}"#, OUTPUT]);

        let result = agent.run_query(&mut session, &CapabilitySet::default(), "q");

        match result {
            Err(StepwiseError::IncompleteStep { missing, .. }) => assert_eq!(missing, vec!["content"]),
            other => panic!("expected IncompleteStep, got {:?}", other),
        }
        assert_eq!(h.count("next"), 1);
    }

    #[test]
    fn test_unparseable_reply_ends_query_with_raw_text() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut session = h.session(Protocol::ToolUse, &["I am waiting for the tool.", OUTPUT]);

        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::ParseFailure { raw }) => assert_eq!(raw, "I am waiting for the tool."),
            other => panic!("expected ParseFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_fenced_and_chatty_replies_are_dispatched() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let fenced_plan = format!("```json\n{}\n```", PLAN);
        let chatty_output = format!("Sure! Here it is:\n{}", OUTPUT);
        let mut session = h.session(
            Protocol::ToolUse,
            &[fenced_plan.as_str(), chatty_output.as_str()],
        );

        let outcome = agent
            .run_query(&mut session, &CapabilitySet::default(), "q")
            .unwrap();
        assert_eq!(outcome.answer, "done");
        assert_eq!(outcome.steps, 2);
    }

    #[test]
    fn test_reasoning_protocol_treats_output_as_intermediate() {
        let h = Harness::new();
        let kinds = Arc::new(Mutex::new(vec![]));
        let agent = AgentLoop::new(
            ToolRegistry::empty(),
            Box::new(AllowAll),
            Box::new(MockTranscript::new()),
            LoopSettings::default(),
        )
        .with_narrator(Box::new(RecordingNarrator { kinds: Arc::clone(&kinds) }));

        let mut session = h.session(
            Protocol::Reasoning,
            &[
                r#"{"step": "analyse", "content": "basic addition"}"#,
                r#"{"step": "think", "content": "add 2 and 2"}"#,
                r#"{"step": "output", "content": "4"}"#,
                r#"{"step": "validate", "content": "2 + 2 is 4"}"#,
                r#"{"step": "result", "content": "2 + 2 = 4"}"#,
            ],
        );

        let outcome = agent
            .run_query(&mut session, &CapabilitySet::default(), "What is 2 + 2")
            .unwrap();

        assert_eq!(outcome.answer, "2 + 2 = 4");
        assert_eq!(outcome.steps, 5);
        assert_eq!(
            *kinds.lock().unwrap(),
            vec![
                StepKind::Analyse,
                StepKind::Think,
                StepKind::Output,
                StepKind::Validate,
                StepKind::Result
            ]
        );
        assert_eq!(h.count("send:User Input: What is 2 + 2"), 1);
    }

    #[test]
    fn test_step_from_other_protocol_is_unexpected() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut session = h.session(
            Protocol::ToolUse,
            &[r#"{"step": "result", "content": "4"}"#],
        );

        let result = agent.run_query(&mut session, &CapabilitySet::default(), "q");
        assert!(matches!(result, Err(StepwiseError::UnexpectedStep { .. })));
    }

    #[test]
    fn test_policy_deny_blocks_tool() {
        let h = Harness::new();
        let transcript = MockTranscript::new();
        let records = Arc::clone(&transcript.records);
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(FixedPolicy {
                verdict: ToolVerdict::Deny { reason: "not today".to_string() },
            }),
            Box::new(transcript),
            LoopSettings::default(),
        );
        let mut session = h.session(Protocol::ToolUse, &[ACTION, OUTPUT]);

        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::ToolDenied { tool, reason }) => {
                assert_eq!(tool, "get_weather");
                assert_eq!(reason, "not today");
            }
            other => panic!("expected ToolDenied, got {:?}", other),
        }
        assert_eq!(h.count("invoke:"), 0);

        let records = records.lock().unwrap();
        assert!(records
            .iter()
            .any(|r| matches!(r.event, TurnEvent::ToolRefused { .. })));
    }

    #[test]
    fn test_require_approval_without_approver_is_denied() {
        let h = Harness::new();
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(FixedPolicy {
                verdict: ToolVerdict::RequireApproval { reason: "external call".to_string() },
            }),
            Box::new(MockTranscript::new()),
            LoopSettings::default(),
        );
        let mut session = h.session(Protocol::ToolUse, &[ACTION, OUTPUT]);

        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::ToolDenied { reason, .. }) => {
                assert!(reason.contains("approval withheld"), "unexpected reason: {reason}");
            }
            other => panic!("expected ToolDenied, got {:?}", other),
        }
        assert_eq!(h.count("invoke:"), 0);
    }

    #[test]
    fn test_require_approval_with_consenting_approver_invokes() {
        let h = Harness::new();
        let asked = Arc::new(Mutex::new(0));
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(FixedPolicy {
                verdict: ToolVerdict::RequireApproval { reason: "external call".to_string() },
            }),
            Box::new(MockTranscript::new()),
            LoopSettings::default(),
        )
        .with_approver(Box::new(FixedApprover { answer: true, asked: Arc::clone(&asked) }));
        let mut session = h.session(Protocol::ToolUse, &[ACTION, OUTPUT]);

        let outcome = agent
            .run_query(&mut session, &CapabilitySet::default(), "q")
            .unwrap();

        assert_eq!(*asked.lock().unwrap(), 1);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(h.count("invoke:"), 1);
    }

    #[test]
    fn test_capability_missing_blocks_tool() {
        let h = Harness::new();
        let in_flight = Arc::clone(&h.in_flight);
        let log = Arc::clone(&h.log);
        let registry = ToolRegistry::builder()
            .register(logged_tool("run_command", log, in_flight).requires("shell:exec"))
            .build()
            .unwrap();
        let agent = allow_all_loop(registry);
        let mut session = h.session(
            Protocol::ToolUse,
            &[r#"{"step": "action", "function": "run_command", "input": "ls"}"#],
        );

        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::CapabilityMissing { capability, tool }) => {
                assert_eq!(capability, "shell:exec");
                assert_eq!(tool, "run_command");
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
        assert_eq!(h.count("invoke:"), 0);

        // Granting the capability lets the same tool run.
        let mut session = h.session(
            Protocol::ToolUse,
            &[r#"{"step": "action", "function": "run_command", "input": "ls"}"#, OUTPUT],
        );
        let caps = CapabilitySet::from_names(["shell:exec"]);
        agent.run_query(&mut session, &caps, "q").unwrap();
        assert_eq!(h.count("invoke:run_command:ls"), 1);
    }

    #[test]
    fn test_step_cap_stops_a_model_that_never_finishes() {
        let h = Harness::new();
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(AllowAll),
            Box::new(MockTranscript::new()),
            LoopSettings { max_steps: 3 },
        );
        let mut session = h.session(Protocol::ToolUse, &[PLAN, PLAN, PLAN, PLAN, PLAN]);

        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::StepLimitExceeded { limit }) => assert_eq!(limit, 3),
            other => panic!("expected StepLimitExceeded, got {:?}", other),
        }
        assert_eq!(h.count("next"), 3);
    }

    #[test]
    fn test_zero_step_cap_is_unbounded() {
        let h = Harness::new();
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(AllowAll),
            Box::new(MockTranscript::new()),
            LoopSettings { max_steps: 0 },
        );
        let mut replies = vec![PLAN; 100];
        replies.push(OUTPUT);
        let mut session = h.session(Protocol::ToolUse, &replies);

        let outcome = agent
            .run_query(&mut session, &CapabilitySet::default(), "q")
            .unwrap();
        assert_eq!(outcome.steps, 101);
    }

    #[test]
    fn test_channel_failure_ends_query_and_session_survives() {
        let h = Harness::new();
        let agent = allow_all_loop(h.weather_registry());
        let mut channel = MockChannel::new(
            Protocol::ToolUse,
            &[PLAN, OUTPUT],
            Arc::clone(&h.log),
            Arc::clone(&h.in_flight),
        );
        // Send 1 relays the query, send 2 requests the first step.
        channel.fail_on_send = Some(2);
        let mut session = Session::open(Box::new(channel), Protocol::ToolUse, "system").unwrap();

        let first = agent.run_query(&mut session, &CapabilitySet::default(), "q1");
        assert!(matches!(first, Err(StepwiseError::ChannelFailure { .. })));

        let second = agent
            .run_query(&mut session, &CapabilitySet::default(), "q2")
            .unwrap();
        assert_eq!(second.answer, "done");
        assert_eq!(session.queries(), 2);
        assert_eq!(h.count("seed"), 1, "the session is seeded exactly once");
    }

    #[test]
    fn test_transcript_records_each_event_and_finalizes() {
        let h = Harness::new();
        let transcript = MockTranscript::new();
        let records = Arc::clone(&transcript.records);
        let finalized = Arc::clone(&transcript.finalized);
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(AllowAll),
            Box::new(transcript),
            LoopSettings::default(),
        );
        let mut session = h.session(Protocol::ToolUse, &[PLAN, ACTION, OUTPUT]);

        let outcome = agent
            .run_query(&mut session, &CapabilitySet::default(), "weather?")
            .unwrap();

        let records = records.lock().unwrap();
        let events: Vec<&TurnEvent> = records.iter().map(|r| &r.event).collect();
        assert!(matches!(events[0], TurnEvent::Query { text } if text == "weather?"));
        assert!(matches!(events[1], TurnEvent::Step { step: Step::Plan { .. } }));
        assert!(matches!(events[2], TurnEvent::Step { step: Step::Action { .. } }));
        assert!(matches!(events[3], TurnEvent::ToolInvoked { tool, .. } if tool == "get_weather"));
        assert!(matches!(events[4], TurnEvent::Step { step: Step::Output { .. } }));
        assert_eq!(events.len(), 5);

        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.turn, i as u64);
            assert_eq!(record.query_id, outcome.query_id);
        }
        assert_eq!(*finalized.lock().unwrap(), vec![outcome.query_id.to_string()]);
    }

    #[test]
    fn test_failure_is_recorded_before_returning() {
        let h = Harness::new();
        let transcript = MockTranscript::new();
        let records = Arc::clone(&transcript.records);
        let finalized = Arc::clone(&transcript.finalized);
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(AllowAll),
            Box::new(transcript),
            LoopSettings::default(),
        );
        let mut session = h.session(Protocol::ToolUse, &["not json at all"]);

        assert!(agent.run_query(&mut session, &CapabilitySet::default(), "q").is_err());

        let records = records.lock().unwrap();
        match &records.last().unwrap().event {
            TurnEvent::Failed { reason } => assert!(reason.contains("not json at all")),
            other => panic!("expected Failed record, got {:?}", other),
        }
        assert_eq!(finalized.lock().unwrap().len(), 1);
    }

    /// An action is announced only when its tool is about to run.
    #[test]
    fn test_refused_or_unknown_action_is_not_narrated() {
        let h = Harness::new();
        let kinds = Arc::new(Mutex::new(vec![]));
        let narrated = |policy: Box<dyn ToolPolicy>| {
            AgentLoop::new(
                h.weather_registry(),
                policy,
                Box::new(MockTranscript::new()),
                LoopSettings::default(),
            )
            .with_narrator(Box::new(RecordingNarrator { kinds: Arc::clone(&kinds) }))
        };

        let agent = narrated(Box::new(AllowAll));
        let mut session = h.session(
            Protocol::ToolUse,
            &[PLAN, r#"{"step": "action", "function": "query_db", "input": "select 1"}"#],
        );
        let result = agent.run_query(&mut session, &CapabilitySet::default(), "db?");
        assert!(matches!(result, Err(StepwiseError::UnknownTool { .. })));
        assert_eq!(*kinds.lock().unwrap(), vec![StepKind::Plan]);

        kinds.lock().unwrap().clear();
        let agent = narrated(Box::new(FixedPolicy {
            verdict: ToolVerdict::Deny { reason: "not today".to_string() },
        }));
        let mut session = h.session(Protocol::ToolUse, &[PLAN, ACTION]);
        let result = agent.run_query(&mut session, &CapabilitySet::default(), "q");
        assert!(matches!(result, Err(StepwiseError::ToolDenied { .. })));
        assert_eq!(*kinds.lock().unwrap(), vec![StepKind::Plan]);

        kinds.lock().unwrap().clear();
        let agent = narrated(Box::new(AllowAll));
        let mut session = h.session(Protocol::ToolUse, &[PLAN, ACTION, OUTPUT]);
        agent
            .run_query(&mut session, &CapabilitySet::default(), "q")
            .unwrap();
        assert_eq!(
            *kinds.lock().unwrap(),
            vec![StepKind::Plan, StepKind::Action, StepKind::Output]
        );
    }

    #[test]
    fn test_approver_not_asked_when_capability_missing() {
        let h = Harness::new();
        let asked = Arc::new(Mutex::new(0));
        let registry = ToolRegistry::builder()
            .register(
                logged_tool("run_command", Arc::clone(&h.log), Arc::clone(&h.in_flight))
                    .requires("shell:exec"),
            )
            .build()
            .unwrap();
        let agent = AgentLoop::new(
            registry,
            Box::new(FixedPolicy {
                verdict: ToolVerdict::RequireApproval { reason: "runs a program".to_string() },
            }),
            Box::new(MockTranscript::new()),
            LoopSettings::default(),
        )
        .with_approver(Box::new(FixedApprover { answer: true, asked: Arc::clone(&asked) }));
        let mut session = h.session(
            Protocol::ToolUse,
            &[r#"{"step": "action", "function": "run_command", "input": "ls"}"#],
        );

        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "shell:exec")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
        assert_eq!(*asked.lock().unwrap(), 0);
        assert_eq!(h.count("invoke:"), 0);
    }

    #[test]
    fn test_finalize_failure_keeps_the_query_error() {
        let h = Harness::new();
        let mut transcript = MockTranscript::new();
        transcript.fail_finalize = true;
        let agent = AgentLoop::new(
            h.weather_registry(),
            Box::new(AllowAll),
            Box::new(transcript),
            LoopSettings::default(),
        );

        let mut session = h.session(Protocol::ToolUse, &["not json at all"]);
        match agent.run_query(&mut session, &CapabilitySet::default(), "q") {
            Err(StepwiseError::ParseFailure { raw }) => assert_eq!(raw, "not json at all"),
            other => panic!("expected ParseFailure, got {:?}", other),
        }

        // A query that succeeded surfaces the transcript failure instead.
        let mut session = h.session(Protocol::ToolUse, &[OUTPUT]);
        let result = agent.run_query(&mut session, &CapabilitySet::default(), "q");
        assert!(matches!(result, Err(StepwiseError::TranscriptWriteFailed { .. })));
    }
}
