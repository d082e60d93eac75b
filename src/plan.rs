//! A priority queue that stores arbitrary data sorted by simulated day
//!
//! Defines a `Queue<T, P>` that stores items of type `T` - sorted by `u32` day
//! and a definable phase `P` - called 'plans'. Adding a plan and retrieving
//! the earliest plan are both *O*(log(*n*)).
//!
//! This queue is used by `Context` to store the day-triggered callbacks
//! (policy events, the daily step and output recording) of a realization.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A priority queue that stores arbitrary data sorted by day
///
/// Plans scheduled for the same day are ordered by phase, the lowest phase
/// first. Plans with the same day and phase come out in the order they were
/// added, which keeps policy tables with several events on one day in table
/// order.
pub struct Queue<T, P: Ord> {
    queue: BinaryHeap<Entry<T, P>>,
    plan_counter: u64,
}

impl<T, P: Ord> Queue<T, P> {
    #[must_use]
    pub fn new() -> Queue<T, P> {
        Queue {
            queue: BinaryHeap::new(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified day and phase
    pub fn add_plan(&mut self, day: u32, data: T, phase: P) {
        let id = self.plan_counter;
        self.queue.push(Entry {
            day,
            phase,
            id,
            data,
        });
        self.plan_counter += 1;
    }

    /// Retrieve the earliest plan in the queue, or `None` if it is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.queue.pop().map(|entry| Plan {
            day: entry.day,
            data: entry.data,
        })
    }

    /// The day of the earliest pending plan
    pub fn next_day(&self) -> Option<u32> {
        self.queue.peek().map(|entry| entry.day)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Drops every pending plan.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T, P: Ord> Default for Queue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry<T, P: Ord> {
    day: u32,
    phase: P,
    id: u64,
    data: T,
}

impl<T, P: Ord> PartialEq for Entry<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T, P: Ord> Eq for Entry<T, P> {}

impl<T, P: Ord> PartialOrd for Entry<T, P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `BinaryHeap` is a max-heap, so every comparison is reversed to pop the
/// earliest day, then the lowest phase, then the lowest id.
impl<T, P: Ord> Ord for Entry<T, P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.day
            .cmp(&other.day)
            .then_with(|| self.phase.cmp(&other.phase))
            .then_with(|| self.id.cmp(&other.id))
            .reverse()
    }
}

/// A plan that holds data of type `T` intended to run on the specified day
pub struct Plan<T> {
    pub day: u32,
    pub data: T,
}
