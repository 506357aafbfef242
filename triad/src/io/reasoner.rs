//! Reasoning-engine boundary.
//!
//! The [`Reasoner`] trait decouples the three roles from the actual reasoning
//! backend. The production backend spawns a configured command and feeds the
//! prompt on stdin; tests use scripted reasoners that return predetermined
//! text without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Parameters for one reasoning call.
#[derive(Debug, Clone)]
pub struct ReasonRequest {
    /// Prompt text to feed to the reasoning engine.
    pub prompt: String,
    /// Maximum time to wait for a response.
    pub timeout: Duration,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over reasoning backends.
///
/// Synchronous by contract; a call may fail with a transport error or return
/// text that fails to parse downstream. Both are recoverable for the
/// developer/critic roles and fatal only for planning.
pub trait Reasoner {
    fn reason(&self, request: &ReasonRequest) -> Result<String>;
}

/// Reasoner that spawns a configured command, writes the prompt to its stdin,
/// and returns its stdout as the response text.
#[derive(Debug, Clone)]
pub struct CommandReasoner {
    command: Vec<String>,
}

impl CommandReasoner {
    /// `command` is the argv to spawn; must be non-empty.
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(anyhow!("reasoner command must be a non-empty array"));
        }
        Ok(Self { command })
    }
}

impl Reasoner for CommandReasoner {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn reason(&self, request: &ReasonRequest) -> Result<String> {
        info!(command = %self.command[0], "starting reasoner command");

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "reasoner timed out"
            );
            return Err(anyhow!(
                "reasoner timed out after {:?}",
                request.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "reasoner command failed");
            return Err(anyhow!(
                "reasoner failed with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        debug!(
            bytes = output.stdout.len(),
            truncated = output.stdout_truncated,
            "reasoner completed"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
