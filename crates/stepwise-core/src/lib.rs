//! # stepwise-core
//!
//! The step-wise agent runtime.
//!
//! This crate provides:
//! - The trait seams (`ConversationChannel`, `Tool`, `ToolPolicy`, `Approver`,
//!   `TranscriptWriter`, `Narrator`)
//! - The response parser and step decoder
//! - The fixed tool registry
//! - `Session` and the sequential `AgentLoop` that drives one query at a time
//! - System prompts and single-shot prompting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stepwise_core::{AgentLoop, LoopSettings, Session, ToolRegistry};
//! ```

pub mod agent_loop;
pub mod parser;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod shape;
pub mod traits;

pub use agent_loop::{AgentLoop, LoopSettings, DEFAULT_MAX_STEPS};
pub use registry::{FnTool, ToolRegistry, ToolRegistryBuilder};
pub use session::Session;
