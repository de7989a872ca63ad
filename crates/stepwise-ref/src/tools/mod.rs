//! Reference tools and the registry that bundles them.

pub mod command;
pub mod weather;

use stepwise_contracts::error::StepwiseResult;
use stepwise_core::ToolRegistry;

pub use command::CommandTool;
pub use weather::WeatherTool;

/// Registry with `get_weather` and `run_command`, in that order.
///
/// `allowed_commands` replaces the command tool's default allow-list.
pub fn reference_registry(allowed_commands: Option<&[String]>) -> StepwiseResult<ToolRegistry> {
    let command = match allowed_commands {
        Some(allowed) => CommandTool::new(allowed.iter().cloned()),
        None => CommandTool::default(),
    };
    ToolRegistry::builder()
        .register(WeatherTool)
        .register(command)
        .build()
}
