//! Recording test doubles for the ports

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::dashboard::{DashboardError, DashboardPort};
use super::process::{ProcessError, ProcessExit, ProcessHandle, ProcessInvocation, ProcessPort};

/// Mock process port that records calls and completes them immediately
#[derive(Debug, Default, Clone)]
pub struct MockProcessRunner {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    exit_codes: Arc<Mutex<HashMap<String, i32>>>,
    stdout: Arc<Mutex<HashMap<String, Vec<String>>>>,
    fail_spawn: Arc<Mutex<Vec<String>>>,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the exit code for a given program
    pub fn with_exit_code(self, command: &str, code: i32) -> Self {
        self.exit_codes.lock().unwrap().insert(command.to_string(), code);
        self
    }

    /// Builder method to set the stdout lines for a given program
    pub fn with_stdout(self, command: &str, lines: &[&str]) -> Self {
        self.stdout.lock().unwrap().insert(
            command.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Builder method making spawns of a given program fail
    pub fn with_spawn_failure(self, command: &str) -> Self {
        self.fail_spawn.lock().unwrap().push(command.to_string());
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ProcessPort for MockProcessRunner {
    fn run(&self, command: &str, args: &[String]) -> Result<ProcessHandle, ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), args.to_vec()));

        if self.fail_spawn.lock().unwrap().iter().any(|c| c == command) {
            return Err(ProcessError::SpawnFailed {
                command: command.to_string(),
                reason: "mock spawn failure".to_string(),
            });
        }

        let code = self.exit_codes.lock().unwrap().get(command).copied().unwrap_or(0);
        let stdout = self.stdout.lock().unwrap().get(command).cloned().unwrap_or_default();

        Ok(ProcessHandle::completed(ProcessExit {
            invocation: ProcessInvocation::new(command, args.to_vec()),
            code: Some(code),
            signal: None,
            stdout,
        }))
    }
}

/// Mock dashboard that counts refreshes and redraws
#[derive(Debug, Default, Clone)]
pub struct MockDashboard {
    refreshes: Arc<AtomicUsize>,
    completed_refreshes: Arc<AtomicUsize>,
    redraws: Arc<AtomicUsize>,
    refresh_delay: Option<Duration>,
    fail: bool,
}

impl MockDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method making every refresh take `delay`
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Builder method making every refresh fail
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn completed_refresh_count(&self) -> usize {
        self.completed_refreshes.load(Ordering::SeqCst)
    }

    pub fn redraw_count(&self) -> usize {
        self.redraws.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DashboardPort for MockDashboard {
    async fn refresh_data(&self) -> Result<(), DashboardError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        self.completed_refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DashboardError::ReadError {
                path: "mock".to_string(),
                reason: "mock refresh failure".to_string(),
            });
        }
        Ok(())
    }

    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::SeqCst);
    }
}
