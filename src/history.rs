//! Bounded record of the traffic a transport has seen, for diagnostics.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A command written to the device.
    Send,
    /// A response read back for a command.
    Receive,
    /// A notification pushed by the device.
    Push,
}

/// A recorded message in the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub msg_type: MessageType,
    pub method: String,
    pub message: Value,
    /// Seconds since history creation
    pub timestamp: f64,
}

/// Keeps the most recent messages, oldest first.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    entries: VecDeque<HistoryEntry>,
    counts: [usize; 3],
    last_error: Option<String>,
    start_time: Instant,
    max_entries: usize,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub const DEFAULT_MAX_ENTRIES: usize = 100;

    pub fn new() -> Self {
        Self::with_max_entries(Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(Self::DEFAULT_MAX_ENTRIES)),
            counts: [0; 3],
            last_error: None,
            start_time: Instant::now(),
            max_entries,
        }
    }

    pub fn record(&mut self, msg_type: MessageType, method: &str, message: Value) {
        self.counts[Self::slot(msg_type)] += 1;
        self.entries.push_back(HistoryEntry {
            msg_type,
            method: method.to_string(),
            message,
            timestamp: self.start_time.elapsed().as_secs_f64(),
        });
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Most recent entry of the given type, if still retained.
    pub fn last(&self, msg_type: MessageType) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| e.msg_type == msg_type)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.counts = [0; 3];
        self.last_error = None;
    }

    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            send_count: self.counts[Self::slot(MessageType::Send)],
            receive_count: self.counts[Self::slot(MessageType::Receive)],
            push_count: self.counts[Self::slot(MessageType::Push)],
            retained_entries: self.entries.len(),
            last_error: self.last_error.clone(),
        }
    }

    fn slot(msg_type: MessageType) -> usize {
        match msg_type {
            MessageType::Send => 0,
            MessageType::Receive => 1,
            MessageType::Push => 2,
        }
    }
}

/// Totals since creation (or the last [`MessageHistory::clear`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub send_count: usize,
    pub receive_count: usize,
    pub push_count: usize,
    pub retained_entries: usize,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_message() {
        let mut history = MessageHistory::new();
        history.record(
            MessageType::Send,
            "set_power",
            json!({"id": 1, "method": "set_power", "params": ["on"]}),
        );

        assert_eq!(history.len(), 1);
        assert_eq!(history.last(MessageType::Send).unwrap().method, "set_power");
        assert!(history.last(MessageType::Push).is_none());
    }

    #[test]
    fn test_record_error() {
        let mut history = MessageHistory::new();
        history.record_error("connection refused");
        assert_eq!(history.last_error(), Some("connection refused"));
    }

    #[test]
    fn test_max_entries_keeps_newest_but_counts_all() {
        let mut history = MessageHistory::with_max_entries(2);
        for i in 0..5 {
            history.record(MessageType::Push, "props", json!({"n": i}));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries().next().unwrap().message["n"], 3);

        let summary = history.summary();
        assert_eq!(summary.push_count, 5);
        assert_eq!(summary.retained_entries, 2);
    }
}
