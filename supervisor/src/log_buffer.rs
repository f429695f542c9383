//! Fixed-capacity log ring buffer for captured worker output

use std::collections::VecDeque;

use shared::{LogEntry, LogLevel, LogSource};

#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append, evicting the oldest entries beyond capacity
    pub fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Level for one captured line
///
/// Python's logging writes everything to stderr, so stderr lines are only
/// escalated when they look like warnings or errors.
pub fn classify_line(source: LogSource, line: &str) -> LogLevel {
    match source {
        LogSource::Stdout | LogSource::Supervisor => LogLevel::Info,
        LogSource::Stderr => {
            let upper = line.to_ascii_uppercase();
            if upper.contains("ERROR") || upper.contains("CRITICAL") || upper.contains("TRACEBACK") {
                LogLevel::Error
            } else if upper.contains("WARN") {
                LogLevel::Warn
            } else if upper.contains("DEBUG") {
                LogLevel::Debug
            } else {
                LogLevel::Info
            }
        }
    }
}
