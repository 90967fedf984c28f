//! Process Port
//!
//! Contract for launching external trader/model commands and observing
//! their output and termination.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Empty command line")]
    EmptyCommand,

    #[error("Failed waiting for '{command}': {reason}")]
    Wait { command: String, reason: String },

    #[error("Process runner dropped '{0}' before reporting termination")]
    Abandoned(String),
}

/// One external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub command: String,
    pub args: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl ProcessInvocation {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            started_at: Utc::now(),
        }
    }

    /// Command line as it would be typed in a shell
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Terminal status of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub invocation: ProcessInvocation,
    /// Exit code, absent when the child was killed by a signal
    pub code: Option<i32>,
    /// Terminating signal number (unix only)
    pub signal: Option<i32>,
    /// Captured stdout lines in arrival order
    pub stdout: Vec<String>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human-readable status, e.g. `exit code 1` or `signal 9`
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit code {}", code),
            (None, Some(sig)) => format!("signal {}", sig),
            (None, None) => "unknown status".to_string(),
        }
    }
}

/// Live reference to a spawned command
///
/// Resolves exactly once, after every stdout line of the invocation has
/// been delivered to the log sink.
#[derive(Debug)]
pub struct ProcessHandle {
    invocation: ProcessInvocation,
    pid: Option<u32>,
    completion: oneshot::Receiver<Result<ProcessExit, ProcessError>>,
}

impl ProcessHandle {
    pub fn new(
        invocation: ProcessInvocation,
        pid: Option<u32>,
        completion: oneshot::Receiver<Result<ProcessExit, ProcessError>>,
    ) -> Self {
        Self {
            invocation,
            pid,
            completion,
        }
    }

    /// Handle whose terminal notification is already available
    pub fn completed(exit: ProcessExit) -> Self {
        let (tx, rx) = oneshot::channel();
        let invocation = exit.invocation.clone();
        let _ = tx.send(Ok(exit));
        Self::new(invocation, None, rx)
    }

    pub fn invocation(&self) -> &ProcessInvocation {
        &self.invocation
    }

    /// OS process id, if the child was still alive when queried at spawn
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Await the terminal notification
    ///
    /// No timeout is applied; a hung child keeps this pending.
    pub async fn wait(self) -> Result<ProcessExit, ProcessError> {
        let command = self.invocation.command.clone();
        self.completion
            .await
            .map_err(|_| ProcessError::Abandoned(command))?
    }
}

/// Launches external commands
///
/// `run` only initiates the spawn; output streaming and completion happen
/// in the background and are observed through the returned handle.
pub trait ProcessPort: Send + Sync {
    fn run(&self, command: &str, args: &[String]) -> Result<ProcessHandle, ProcessError>;
}
