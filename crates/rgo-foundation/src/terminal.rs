//! Terminal collaborator used to run install commands where the user can see them

use crate::error::RgoResult;
use async_trait::async_trait;
use std::fmt;

/// Exit status of a command run through a [`TerminalRunner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalExit {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl TerminalExit {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for TerminalExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs a shell command line in a terminal visible to the user
#[async_trait]
pub trait TerminalRunner: Send + Sync {
    /// Run `command_line` and wait for the process to exit
    async fn run(&self, command_line: &str) -> RgoResult<TerminalExit>;
}
