use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Severity of a collected log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// A single line produced during a job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Formats as `<level>: <message>`, the line shape used in notifications.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

/// Ordered buffer of log entries.
///
/// `append` and `snapshot_and_clear` take the same lock, so a clear returns
/// exactly the entries appended before it and none appended after it.
#[derive(Debug, Default)]
pub struct LogCollector {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Take every entry accumulated since the previous clear.
    pub fn snapshot_and_clear(&self) -> Vec<LogEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *entries)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Logging handle scoped to one job run.
///
/// Each message is recorded in the run's collector and forwarded to the
/// process-wide `tracing` subscriber, which stamps it and writes it out.
#[derive(Debug, Clone)]
pub struct RunLog {
    job: String,
    collector: Arc<LogCollector>,
}

impl RunLog {
    pub fn new(job: impl Into<String>, collector: Arc<LogCollector>) -> Self {
        Self {
            job: job.into(),
            collector,
        }
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn collector(&self) -> &Arc<LogCollector> {
        &self.collector
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogEntry::info(message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(LogEntry::warn(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogEntry::error(message));
    }

    pub fn record(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => info!(job = %self.job, "{}", entry.message),
            LogLevel::Warn => warn!(job = %self.job, "{}", entry.message),
            LogLevel::Error => error!(job = %self.job, "{}", entry.message),
        }
        self.collector.append(entry);
    }
}
