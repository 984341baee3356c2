//! Bounded priority admission queue
//!
//! Three FIFO lanes sharing one capacity. This is a load-shedding
//! buffer, not a fair scheduler: strict priority means LOW can starve
//! while HIGH traffic keeps arriving.

use std::collections::VecDeque;
use std::time::Instant;

use crate::error::{Error, Result};

/// Admission priority. Lower number dequeues first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High = 0,
    Medium = 1,
    Low = 2,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    fn lane(self) -> usize {
        self as usize
    }
}

/// A queued entry with its admission metadata.
#[derive(Debug)]
pub struct QueuedItem<T> {
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub item: T,
}

/// Bounded three-level priority queue, FIFO within each level.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    lanes: [VecDeque<QueuedItem<T>>; 3],
    capacity: usize,
}

impl<T> PriorityQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            capacity,
        }
    }

    /// Admit an item, or reject immediately when at capacity.
    pub fn enqueue(&mut self, priority: Priority, item: T) -> Result<()> {
        if self.len() >= self.capacity {
            return Err(Error::QueueFull);
        }
        self.lanes[priority.lane()].push_back(QueuedItem {
            priority,
            enqueued_at: Instant::now(),
            item,
        });
        Ok(())
    }

    /// Highest-priority, oldest-admitted entry, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<QueuedItem<T>> {
        self.lanes.iter_mut().find_map(VecDeque::pop_front)
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
