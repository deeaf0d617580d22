//! Deterministic timer queue in abstract time units.
//!
//! Timers fire in deadline order; timers sharing a deadline fire in the
//! order they were scheduled.

use std::collections::BTreeMap;

/// Ordering key: deadline first, then schedule sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct TimerKey {
    deadline: u64,
    seq: u64,
}

#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    entries: BTreeMap<TimerKey, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: u64, timer: T) {
        let key = TimerKey {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, timer);
    }

    /// Remove every timer matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, timer| !pred(timer));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.keys().next().map(|id| id.deadline)
    }

    /// Pop the earliest timer whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, T)> {
        let id = *self.entries.keys().next()?;
        if id.deadline > now {
            return None;
        }
        self.entries.remove(&id).map(|timer| (id.deadline, timer))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
