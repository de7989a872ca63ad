//! # stepwise-policy
//!
//! Runtime configuration and a TOML-driven, deny-by-default tool policy.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use stepwise_policy::{RuntimeConfig, TomlToolPolicy};
//!
//! let config = RuntimeConfig::from_file(Path::new("policies/default.toml"))?;
//! let policy = TomlToolPolicy::from_config(&config);
//! // Pass `policy` to `stepwise_core::AgentLoop::new(...)`.
//! ```
//!
//! ## Rule matching
//!
//! Each rule names a `tool` (or `"*"`) and optionally an `input_prefix`.
//! Rules are applied in declaration order; the first match wins.

pub mod config;
pub mod engine;
pub mod rule;

pub use config::{AgentSettings, RuntimeConfig, ToolSettings};
pub use engine::TomlToolPolicy;
pub use rule::{RuleVerdict, ToolRule};

// ── Tests ─────────────────────────────────────────────────────────────────────
