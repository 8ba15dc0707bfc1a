//! User-facing event log for one tracking session.
//!
//! Entries are immutable and kept in insertion order. The log only grows;
//! nothing is ever edited or removed. Severity is carried as a tag word at
//! the start of the message text (`INFO`, `SUCCESS`, `WARN`, `ERROR`).

use std::fmt;

use chrono::Local;
use serde::Serialize;

use crate::types::Timestamp;

/// Display format of the timestamp segment.
const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// Marker that visually distinguishes an entry.
const SUCCESS_MARKER: &str = "SUCCESS";

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Severity tag prefixed onto a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    Info,
    Success,
    Warn,
    Error,
}

impl LogTag {
    pub fn as_str(self) -> &'static str {
        match self {
            LogTag::Info => "INFO",
            LogTag::Success => SUCCESS_MARKER,
            LogTag::Warn => "WARN",
            LogTag::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// A single timestamped message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    timestamp: Timestamp,
    message: String,
}

impl LogEntry {
    fn new(message: String) -> Self {
        Self {
            timestamp: Local::now(),
            message,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bracketed local-time segment, e.g. `[14:03:27]`.
    pub fn time_segment(&self) -> String {
        format!("[{}]", self.timestamp.format(TIMESTAMP_FORMAT))
    }

    /// Split into `(timestamp segment, message segment)` for independent
    /// styling.
    pub fn segments(&self) -> (String, &str) {
        (self.time_segment(), &self.message)
    }

    /// Whether the entry records a milestone and should stand out.
    pub fn is_success(&self) -> bool {
        self.message.contains(SUCCESS_MARKER)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time_segment(), self.message)
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Append-only, insertion-ordered list of [`LogEntry`]s.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, stamping it with the current local time.
    pub fn append(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry::new(message.into()));
    }

    /// Append a message prefixed with a severity tag.
    pub fn append_tagged(&mut self, tag: LogTag, message: impl fmt::Display) {
        self.append(format!("{tag} {message}"));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries appended after the first `seen` ones. Used by renderers that
    /// print incrementally.
    pub fn since(&self, seen: usize) -> &[LogEntry] {
        self.entries.get(seen..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
