//! # stepwise-ref
//!
//! Reference pieces for running the stepwise agent loop end to end:
//!
//! - **Tools**: `get_weather` over a fictional offline table and
//!   `run_command` limited to allow-listed programs.
//! - **Channels**: `ScriptedChannel` replays canned replies and
//!   `ConsoleChannel` lets a person at the terminal play the model.
//! - **Terminal**: step narration, failure rendering, operator approval.
//! - **Scenarios**: a reasoning run and a tool-use run over scripted replies.
//!
//! No network calls are made anywhere in this crate.

pub mod channel;
pub mod scenarios;
pub mod terminal;
pub mod tools;

/// Default runtime configuration, embedded at build time.
pub const DEFAULT_CONFIG: &str = include_str!("../policies/default.toml");
