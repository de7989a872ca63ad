//! Runtime configuration loaded from TOML.
//!
//! ```toml
//! [agent]
//! protocol = "tool-use"
//! max_steps = 64
//! capabilities = ["weather:read"]
//!
//! [tools]
//! allowed_commands = ["ls", "date"]
//!
//! [[rules]]
//! id = "allow-weather"
//! tool = "get_weather"
//! verdict = "allow"
//! ```
//!
//! Every field is optional. An absent `[agent]` table yields the defaults;
//! an absent `rules` array yields an empty, deny-everything rule set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use stepwise_contracts::{
    capability::CapabilitySet,
    error::{StepwiseError, StepwiseResult},
    step::Protocol,
};
use stepwise_core::{LoopSettings, DEFAULT_MAX_STEPS};

use crate::rule::ToolRule;

/// The `[agent]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub protocol: Protocol,
    /// `0` removes the step cap.
    pub max_steps: u32,
    /// Capabilities granted to every session.
    pub capabilities: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            max_steps: DEFAULT_MAX_STEPS,
            capabilities: Vec::new(),
        }
    }
}

impl AgentSettings {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_steps: self.max_steps,
        }
    }

    pub fn capability_set(&self) -> CapabilitySet {
        CapabilitySet::from_names(self.capabilities.iter().map(String::as_str))
    }
}

/// The `[tools]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Programs the command tool may start. `None` keeps the tool's own
    /// default list.
    pub allowed_commands: Option<Vec<String>>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    /// Ordered tool rules. First match wins.
    pub rules: Vec<ToolRule>,
}

impl RuntimeConfig {
    /// Returns `ConfigError` if the TOML is malformed or does not match the
    /// expected schema.
    pub fn from_toml_str(s: &str) -> StepwiseResult<Self> {
        toml::from_str(s).map_err(|e| StepwiseError::ConfigError {
            reason: format!("failed to parse configuration TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> StepwiseResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| StepwiseError::ConfigError {
            reason: format!("failed to read configuration file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
