// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;

use super::entry::LogEntry;

/// Fixed-capacity, FIFO-evicting log store for one target.
///
/// `len() <= max_length()` holds after every operation. A batch that would
/// overflow evicts the oldest entries first; the surviving window keeps
/// insertion order.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    max_length: usize,
}

impl LogBuffer {
    /// Creates an empty buffer. A capacity of zero is raised to one.
    pub fn new(max_length: usize) -> Self {
        let max_length = max_length.max(1);
        Self {
            entries: VecDeque::with_capacity(max_length.min(4096)),
            max_length,
        }
    }

    /// Capacity of the buffer.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends one entry.
    pub fn push(&mut self, entry: LogEntry) {
        self.extend(std::iter::once(entry));
    }

    /// Appends a batch of entries in order.
    pub fn extend<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = LogEntry>,
    {
        for entry in batch {
            if self.entries.len() == self.max_length {
                self.entries.pop_front();
            }
            self.entries.push_back(entry);
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over the entries, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Returns the entries in `start..end` (clamped to the buffer).
    pub fn range(&self, start: usize, end: usize) -> Vec<&LogEntry> {
        let end = end.min(self.entries.len());
        let start = start.min(end);
        self.entries.range(start..end).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::entry::Severity;
    use crate::target::Target;
    use proptest::prelude::*;

    fn entry(i: usize) -> LogEntry {
        LogEntry::new(Target::Backend, Severity::Info, format!("line {}", i))
    }

    #[test]
    fn test_150_into_100_keeps_51_to_150() {
        let mut buffer = LogBuffer::new(100);
        for i in 1..=150 {
            buffer.push(entry(i));
        }

        assert_eq!(buffer.len(), 100);
        let texts: Vec<_> = buffer.iter().map(|e| e.text.clone()).collect();
        let expected: Vec<_> = (51..=150).map(|i| format!("line {}", i)).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_batch_larger_than_capacity() {
        let mut buffer = LogBuffer::new(3);
        buffer.extend((0..10).map(entry));
        let texts: Vec<_> = buffer.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn test_range_is_clamped() {
        let mut buffer = LogBuffer::new(10);
        buffer.extend((0..4).map(entry));
        assert_eq!(buffer.range(2, 99).len(), 2);
        assert!(buffer.range(7, 3).is_empty());
    }

    proptest! {
        #[test]
        fn prop_fifo_eviction_law(
            capacity in 1usize..50,
            batches in prop::collection::vec(0usize..30, 0..20),
        ) {
            let mut buffer = LogBuffer::new(capacity);
            let mut all = Vec::new();
            let mut next = 0;
            for size in batches {
                let batch: Vec<_> = (next..next + size).map(entry).collect();
                next += size;
                all.extend(batch.clone());
                buffer.extend(batch);
                prop_assert!(buffer.len() <= capacity);
            }

            let skip = all.len().saturating_sub(capacity);
            let expected: Vec<_> = all.into_iter().skip(skip).collect();
            let actual: Vec<_> = buffer.iter().cloned().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
