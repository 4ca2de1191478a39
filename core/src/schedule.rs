use core::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::*;

#[derive(Debug)]
struct Entry<T> {
    due: Millis,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Single-threaded queue of deferred tasks on a virtual millisecond clock.
///
/// Tasks come out ordered by due time, ties in the order they were scheduled. The clock only moves when the owner
/// pops tasks or calls [`Scheduler::advance_to`].
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Millis,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Entry<T>>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs `task` once `delay` has passed from the current time.
    pub fn schedule(&mut self, delay: Millis, task: T) {
        let due = self.now.saturating_add(delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due, seq, task }));
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    /// Pops the earliest task due at or before `deadline`, moving the clock to its due time.
    pub fn pop_due(&mut self, deadline: Millis) -> Option<T> {
        if self.next_due()? > deadline {
            return None;
        }
        self.pop_next()
    }

    /// Pops the earliest task regardless of how far away it is.
    pub fn pop_next(&mut self) -> Option<T> {
        let Reverse(entry) = self.queue.pop()?;
        self.now = self.now.max(entry.due);
        Some(entry.task)
    }

    /// Moves the clock forward; never backwards.
    pub fn advance_to(&mut self, time: Millis) {
        self.now = self.now.max(time);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
