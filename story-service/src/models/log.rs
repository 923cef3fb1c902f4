//! Per-session inference log.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::VecDeque;

/// Maximum entries kept per session; the oldest entry is dropped first.
pub const SESSION_LOG_CAPACITY: usize = 100;

/// Output length the caller declared, or `"N/A"` when it was omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggedLength {
    Tokens(u32),
    NotApplicable,
}

impl From<Option<u32>> for LoggedLength {
    fn from(length: Option<u32>) -> Self {
        length.map_or(LoggedLength::NotApplicable, LoggedLength::Tokens)
    }
}

impl Serialize for LoggedLength {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LoggedLength::Tokens(n) => serializer.serialize_u32(*n),
            LoggedLength::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

/// A successful generation as seen by its session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub prompt: String,
    pub output: String,
    pub length: LoggedLength,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

impl LogEntry {
    /// Build an entry for a record observed now.
    pub fn from_record(record: GenerationRecord) -> Self {
        Self {
            prompt: record.prompt,
            output: record.output,
            length: record.length.into(),
            timestamp: Utc::now(),
            session_id: record.session_id,
        }
    }
}

/// Side-channel handed from the generate handler to the log recorder through
/// response extensions, so the recorder never re-runs the generation.
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub session_id: String,
    pub prompt: String,
    pub output: String,
    pub length: Option<u32>,
}

/// Bounded FIFO of log entries, serialised as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SessionLog {
    entries: VecDeque<LogEntry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, evicting the oldest once the log is at capacity.
    pub fn push(&mut self, entry: LogEntry) {
        while self.entries.len() >= SESSION_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> LogEntry {
        LogEntry {
            prompt: format!("prompt {}", n),
            output: format!("output {}", n),
            length: LoggedLength::Tokens(150),
            timestamp: Utc::now(),
            session_id: "session-a".to_string(),
        }
    }

    #[test]
    fn push_keeps_insertion_order() {
        let mut log = SessionLog::new();
        log.push(entry(1));
        log.push(entry(2));

        let prompts: Vec<_> = log.iter().map(|e| e.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["prompt 1", "prompt 2"]);
    }

    #[test]
    fn full_log_drops_exactly_the_oldest_entry() {
        let mut log = SessionLog::new();
        for n in 1..=SESSION_LOG_CAPACITY {
            log.push(entry(n));
        }
        assert_eq!(log.len(), SESSION_LOG_CAPACITY);

        log.push(entry(101));

        assert_eq!(log.len(), SESSION_LOG_CAPACITY);
        assert_eq!(log.iter().next().unwrap().prompt, "prompt 2");
        assert_eq!(log.latest().unwrap().prompt, "prompt 101");
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut log = SessionLog::new();
        for n in 1..=250 {
            log.push(entry(n));
            assert!(log.len() <= SESSION_LOG_CAPACITY);
        }
        assert_eq!(log.iter().next().unwrap().prompt, "prompt 151");
    }

    #[test]
    fn serializes_entries_in_camel_case_with_length_marker() {
        let mut log = SessionLog::new();
        log.push(LogEntry::from_record(GenerationRecord {
            session_id: "abc".to_string(),
            prompt: "A wizard enters a cave.".to_string(),
            output: "It was dark.".to_string(),
            length: None,
        }));

        let json = serde_json::to_value(&log).unwrap();
        let first = &json.as_array().unwrap()[0];
        assert_eq!(first["sessionId"], "abc");
        assert_eq!(first["length"], "N/A");
        assert_eq!(first["output"], "It was dark.");
        assert!(first["timestamp"].is_string());
    }

    #[test]
    fn declared_length_is_logged_as_number() {
        let length: LoggedLength = Some(150).into();
        assert_eq!(serde_json::to_value(length).unwrap(), 150);
    }
}
