//! `run_command`: start an allow-listed local program.
//!
//! The input is split on whitespace into a program and its arguments and
//! started directly, without a shell, so pipes, redirections and globbing
//! are not interpreted. Programs outside the allow-list never start.

use std::process::Command;

use tracing::{debug, warn};

use stepwise_core::traits::Tool;

/// Capability a session must hold to run local programs.
pub const SHELL_EXEC: &str = "shell:exec";

/// Programs allowed when the configuration does not name any.
pub const DEFAULT_ALLOWED: &[&str] = &["echo", "ls", "date", "pwd", "whoami", "uname"];

#[derive(Debug, Clone)]
pub struct CommandTool {
    allowed: Vec<String>,
}

impl Default for CommandTool {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED.iter().copied())
    }
}

impl CommandTool {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    fn is_allowed(&self, program: &str) -> bool {
        self.allowed.iter().any(|p| p == program)
    }
}

impl Tool for CommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Takes a command as input to execute on system and returns output"
    }

    fn required_capabilities(&self) -> Vec<String> {
        vec![SHELL_EXEC.to_string()]
    }

    fn invoke(&self, input: &str) -> String {
        let mut words = input.split_whitespace();
        let Some(program) = words.next() else {
            return "Error: empty command".to_string();
        };
        let args: Vec<&str> = words.collect();

        if !self.is_allowed(program) {
            warn!(program = %program, "program not on the allow-list");
            return format!(
                "Error: '{}' is not an allowed program (allowed: {})",
                program,
                self.allowed.join(", ")
            );
        }

        debug!(program = %program, args = args.len(), "starting program");
        match Command::new(program).args(&args).output() {
            Ok(output) => {
                let code = output
                    .status
                    .code()
                    .map_or_else(|| "terminated by signal".to_string(), |c| c.to_string());
                let mut text = format!("Exit code: {}", code);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    text.push('\n');
                    text.push_str(stdout.trim_end());
                }
                if !stderr.trim().is_empty() {
                    text.push_str("\nstderr: ");
                    text.push_str(stderr.trim_end());
                }
                text
            }
            Err(e) => format!("Error: failed to run '{}': {}", program, e),
        }
    }
}
