//! Shell-backed terminal runner

use async_trait::async_trait;
use rgo_foundation::{RgoError, RgoResult, TerminalExit, TerminalRunner};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs command lines through the platform shell with the user's terminal attached
#[derive(Debug, Clone, Default)]
pub struct ShellTerminal;

impl ShellTerminal {
    pub fn new() -> Self {
        Self
    }

    fn command(command_line: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command_line]);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command_line]);
            cmd
        }
    }
}

#[async_trait]
impl TerminalRunner for ShellTerminal {
    async fn run(&self, command_line: &str) -> RgoResult<TerminalExit> {
        info!(command = %command_line, "Running command in terminal");

        let status = Self::command(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                RgoError::install(format!("Failed to run '{}': {}", command_line, e))
            })?;

        debug!(command = %command_line, status = ?status, "Terminal command exited");
        Ok(TerminalExit {
            code: status.code(),
        })
    }
}
