// src/core/history.rs

use crate::constants::HISTORY_CAPACITY;
use std::collections::VecDeque;
use std::time::SystemTime;

/// What kind of primary execution produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Shell,
    Callback,
}

/// One executed command, as shown by the history listing.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub timestamp: SystemTime,
    pub label: String,
    pub command: String,
    pub kind: HistoryKind,
    /// `None` when the child was terminated by a signal or timed out.
    pub exit_code: Option<i32>,
}

/// Bounded ring of recently executed commands, most recent first.
/// Only synchronous shell commands and in-process callbacks are recorded;
/// background, parallel, and watch invocations are deliberately excluded.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        label: impl Into<String>,
        command: impl Into<String>,
        kind: HistoryKind,
        exit_code: Option<i32>,
    ) {
        self.entries.push_front(HistoryEntry {
            timestamp: SystemTime::now(),
            label: label.into(),
            command: command.into(),
            kind,
            exit_code,
        });
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_back();
        }
    }

    /// Entries newest-first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_n(log: &mut HistoryLog, n: usize) {
        for i in 0..n {
            log.record(format!("entry {i}"), format!("echo {i}"), HistoryKind::Shell, Some(0));
        }
    }

    #[test]
    fn test_newest_first() {
        let mut log = HistoryLog::new();
        record_n(&mut log, 3);
        let labels: Vec<_> = log.entries().map(|e| e.label.clone()).collect();
        assert_eq!(labels, vec!["entry 2", "entry 1", "entry 0"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = HistoryLog::new();
        record_n(&mut log, HISTORY_CAPACITY + 1);
        assert_eq!(log.len(), HISTORY_CAPACITY);
        // After inserting a 51st entry the first entry is gone and the
        // newest is at the front.
        let labels: Vec<_> = log.entries().map(|e| e.label.clone()).collect();
        assert_eq!(labels.first().map(String::as_str), Some("entry 50"));
        assert_eq!(labels.last().map(String::as_str), Some("entry 1"));
    }

    #[test]
    fn test_records_exit_code_and_kind() {
        let mut log = HistoryLog::new();
        log.record("fail", "false", HistoryKind::Shell, Some(1));
        log.record("cb", "greet", HistoryKind::Callback, Some(0));
        let newest = log.entries().next().expect("entry");
        assert_eq!(newest.kind, HistoryKind::Callback);
        assert_eq!(newest.exit_code, Some(0));
    }
}
