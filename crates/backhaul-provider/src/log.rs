//! In-memory lifecycle event log
//!
//! Providers record human-readable lifecycle events here so the external
//! routing layer can expose them through its observability endpoints. The log
//! is append-only and purely diagnostic; no invariant depends on it.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.to_rfc3339(), self.message)
    }
}

/// Append-only event log owned by a provider instance
#[derive(Debug, Default)]
pub struct EventLog {
    entries: RwLock<Vec<LogEntry>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Appends an event stamped with the current time.
    pub fn record(&self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        };
        self.entries.write().unwrap().push(entry);
    }

    /// Returns an immutable copy of all entries in append order.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_append_order() {
        let log = EventLog::new();
        log.record("first");
        log.record("second");
        log.record("third");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
        assert_eq!(entries[2].message, "third");
        assert!(entries[0].timestamp <= entries[2].timestamp);
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let log = EventLog::new();
        log.record("first");
        let snapshot = log.snapshot();
        log.record("second");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn starts_empty() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }
}
