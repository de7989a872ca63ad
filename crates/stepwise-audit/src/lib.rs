//! # stepwise-audit
//!
//! Append-only, SHA-256 hash-chained transcript of agent loop events.
//!
//! Every `TurnRecord` the loop writes is wrapped in a `TranscriptEvent` that
//! links to the previous entry by hash. Editing any entry breaks the chain,
//! which `verify_chain` detects.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stepwise_audit::InMemoryTranscript;
//!
//! let transcript = InMemoryTranscript::new("session-1");
//! let agent = AgentLoop::new(registry, policy, Box::new(transcript.clone()), settings);
//! // ... run queries ...
//! assert!(transcript.verify_integrity());
//! let json = transcript.export_log().to_json_pretty()?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{TranscriptEvent, TranscriptLog};
pub use memory::InMemoryTranscript;

// ── Tests ─────────────────────────────────────────────────────────────────────
