//! Bounded, newest-first signal log.
//!
//! Fixed slot arena written round-robin; `head` is the next slot to write,
//! so the newest entry sits just behind it.

use spreadwatch_core::LogEntry;

#[derive(Debug, Clone)]
pub struct SignalLogBuffer {
    slots: Vec<Option<LogEntry>>,
    head: usize,
    len: usize,
    total_appended: u64,
}

impl SignalLogBuffer {
    /// Create a buffer. Capacity is at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
            total_appended: 0,
        }
    }

    /// Insert at the front, evicting the oldest entry when full.
    pub fn append(&mut self, entry: LogEntry) {
        let capacity = self.slots.len();
        self.slots[self.head] = Some(entry);
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
        self.total_appended += 1;
    }

    /// Entries newest-first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        let capacity = self.slots.len();
        (0..self.len).filter_map(move |i| {
            let idx = (self.head + capacity - 1 - i) % capacity;
            self.slots[idx].as_ref()
        })
    }

    /// Current entries, newest-first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.iter().cloned().collect()
    }

    pub fn newest(&self) -> Option<&LogEntry> {
        self.iter().next()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Appends since creation, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}
