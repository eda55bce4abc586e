//! Capped ring buffer for per-server log entries.

use std::collections::VecDeque;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::types::LogEntry;

/// Maximum number of log entries retained per server.
pub const MAX_LOG_ENTRIES: usize = 500;

/// Append-with-cap log storage: once full, the oldest entry is dropped for
/// every new one, preserving order.
#[derive(Debug, Clone)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when the ring is full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
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

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(MAX_LOG_ENTRIES)
    }
}

impl Serialize for LogRing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}
