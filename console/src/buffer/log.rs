//! Rolling log buffer

use std::collections::vec_deque;

use serde::Serialize;

use crate::buffer::ring::Ring;
use crate::console::events::LogStream;

/// Default number of lines kept
pub const LOG_CAPACITY: usize = 1000;

/// A buffered log line.
///
/// `id` is buffer-local and stable for the lifetime of the buffer, which
/// makes it usable as a rendering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: u64,
    pub text: String,
    pub stream: LogStream,
}

/// Bounded, append-only log window
#[derive(Debug, Clone)]
pub struct RollingLogBuffer {
    entries: Ring<LogEntry>,
    next_id: u64,
    evicted: u64,
}

impl RollingLogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Ring::new(capacity),
            next_id: 0,
            evicted: 0,
        }
    }

    /// Append a line and return its id.
    ///
    /// Ids start at 0 and are never reused, not even after eviction or
    /// `clear`.
    pub fn append(&mut self, text: impl Into<String>, stream: LogStream) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let evicted = self.entries.push(LogEntry {
            id,
            text: text.into(),
            stream,
        });
        self.evicted += evicted as u64;
        id
    }

    /// Current contents in arrival order, borrowed
    pub fn snapshot(&self) -> LogSnapshot<'_> {
        LogSnapshot {
            inner: self.entries.iter(),
        }
    }

    /// The newest `n` entries, oldest first
    pub fn tail(&self, n: usize) -> LogSnapshot<'_> {
        LogSnapshot {
            inner: self.entries.tail(n),
        }
    }

    /// Entries with an id greater than `id`
    pub fn since(&self, id: u64) -> LogSnapshot<'_> {
        let start = self.entries.partition_point(|entry| entry.id <= id);
        LogSnapshot {
            inner: self.entries.range_from(start),
        }
    }

    /// Empty the buffer; the id counter keeps counting
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Id the next appended line will get
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Id of the oldest line still buffered
    pub fn first_id(&self) -> Option<u64> {
        self.entries.front().map(|entry| entry.id)
    }

    /// Lines dropped by overflow since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for RollingLogBuffer {
    fn default() -> Self {
        Self::new(LOG_CAPACITY)
    }
}

/// Borrowed, ordered view over buffered entries
#[derive(Debug, Clone)]
pub struct LogSnapshot<'a> {
    inner: vec_deque::Iter<'a, LogEntry>,
}

impl<'a> Iterator for LogSnapshot<'a> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for LogSnapshot<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for LogSnapshot<'_> {}
