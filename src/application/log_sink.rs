//! Operator Log Sink
//!
//! Append-only, ordered text stream consumed by the dashboard log panel.
//! Every line is kept in a bounded history, fanned out to live subscribers
//! and mirrored to `tracing`.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Default number of lines kept for the log panel
pub const DEFAULT_HISTORY_LINES: usize = 500;

const LIVE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Monotonic position in the stream, starting at 1
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub text: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            LogLevel::Info => "",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR ",
        };
        write!(f, "[{}] {}{}", self.at.format("%H:%M:%S"), tag, self.text)
    }
}

#[derive(Debug)]
struct History {
    next_seq: u64,
    capacity: usize,
    lines: VecDeque<LogLine>,
}

/// Cloneable handle to the shared log stream
#[derive(Debug, Clone)]
pub struct LogSink {
    history: Arc<Mutex<History>>,
    live: broadcast::Sender<LogLine>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LINES)
    }
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            history: Arc::new(Mutex::new(History {
                next_seq: 1,
                capacity,
                lines: VecDeque::with_capacity(capacity),
            })),
            live,
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(LogLevel::Info, text.into());
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.push(LogLevel::Warn, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(LogLevel::Error, text.into());
    }

    /// Append a line; sequence numbers follow call order across all clones
    pub fn push(&self, level: LogLevel, text: String) {
        match level {
            LogLevel::Info => tracing::info!(target: "bitvision::log", "{}", text),
            LogLevel::Warn => tracing::warn!(target: "bitvision::log", "{}", text),
            LogLevel::Error => tracing::error!(target: "bitvision::log", "{}", text),
        }

        let mut history = self.lock();
        let line = LogLine {
            seq: history.next_seq,
            at: Utc::now(),
            level,
            text,
        };
        history.next_seq += 1;
        if history.lines.len() == history.capacity {
            history.lines.pop_front();
        }
        history.lines.push_back(line.clone());
        // Sent under the lock so subscribers see the same order as the history.
        let _ = self.live.send(line);
    }

    /// Text of every retained line, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.iter().map(|l| l.text.clone()).collect()
    }

    /// Retained lines with a sequence number greater than `seq`
    pub fn since(&self, seq: u64) -> Vec<LogLine> {
        self.lock()
            .lines
            .iter()
            .filter(|l| l.seq > seq)
            .cloned()
            .collect()
    }

    /// True if any retained line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().lines.iter().any(|l| l.text.contains(needle))
    }

    /// Live feed of lines pushed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LogLine> {
        self.live.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
