//! Process Runner
//!
//! Spawns external commands with tokio, streams their output line by line
//! into the log sink and reports the terminal status exactly once through
//! the returned handle.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::application::LogSink;
use crate::ports::{ProcessError, ProcessExit, ProcessHandle, ProcessInvocation, ProcessPort};

/// Tokio-backed implementation of [`ProcessPort`]
///
/// Must be used from within a Tokio runtime. No timeout is applied: a hung
/// child keeps its handle pending until it is terminated out of band.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    log: LogSink,
}

impl ProcessRunner {
    pub fn new(log: LogSink) -> Self {
        Self { log }
    }
}

impl ProcessPort for ProcessRunner {
    fn run(&self, command: &str, args: &[String]) -> Result<ProcessHandle, ProcessError> {
        if command.trim().is_empty() {
            self.log.error("Refusing to run an empty command.");
            return Err(ProcessError::EmptyCommand);
        }

        let invocation = ProcessInvocation::new(command, args.to_vec());
        self.log.info(format!("Running: {}", invocation.display()));

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                let err = ProcessError::SpawnFailed {
                    command: command.to_string(),
                    reason: e.to_string(),
                };
                self.log.error(err.to_string());
                err
            })?;

        let pid = child.id();
        let (tx, rx) = oneshot::channel();
        let log = self.log.clone();
        let supervised = invocation.clone();

        tokio::spawn(async move {
            let result = supervise(&mut child, supervised, &log).await;
            if let Err(e) = &result {
                log.error(e.to_string());
            }
            // The caller may have dropped the handle; termination is still logged.
            let _ = tx.send(result);
        });

        Ok(ProcessHandle::new(invocation, pid, rx))
    }
}

async fn supervise(
    child: &mut Child,
    invocation: ProcessInvocation,
    log: &LogSink,
) -> Result<ProcessExit, ProcessError> {
    let stderr_task = child.stderr.take().map(|stderr| {
        let log = log.clone();
        tokio::spawn(async move {
            let mut ignored = Vec::new();
            stream_lines(stderr, &mut ignored, |line| log.warn(format!("STDERR: {}", line))).await;
        })
    });

    let mut captured = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        stream_lines(stdout, &mut captured, |line| log.info(format!("OUTPUT: {}", line))).await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let status = child.wait().await.map_err(|e| ProcessError::Wait {
        command: invocation.command.clone(),
        reason: e.to_string(),
    })?;

    let exit = ProcessExit {
        code: status.code(),
        signal: exit_signal(&status),
        stdout: captured,
        invocation,
    };
    log.info(format!(
        "command finished: {} ({})",
        exit.invocation.command,
        exit.describe()
    ));
    Ok(exit)
}

/// Deliver each line of `reader` to `on_line` in arrival order.
/// Invalid UTF-8 is replaced rather than aborting, so the pipe is always drained.
async fn stream_lines<R, F>(reader: R, captured: &mut Vec<String>, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                let line = text.strip_suffix('\r').unwrap_or(&*text).to_string();
                on_line(&line);
                captured.push(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Output stream read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
