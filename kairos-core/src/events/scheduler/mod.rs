//! ## kairos-core::events::scheduler
//! **Time-ordered queues of pending events**
//!
//! Two interchangeable strategies share the [`Scheduler`] contract:
//! - [`Heap`]: binary min-heap, O(log n) insert and removal
//! - [`Calendar`]: bucketed calendar queue, O(1) amortized under near-uniform density
//!
//! Both order by `(time, seq)`. The sequence number is assigned by the
//! controller when an event is scheduled, so same-time events come out in the
//! order they were scheduled and the two strategies are observably identical.

mod calendar;
mod heap;

pub use calendar::Calendar;
pub use heap::Heap;

use kairos_config::{SchedulerConfig, SchedulerKind};
use thiserror::Error;

use crate::time::Time;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler queue is empty")]
    Empty,
}

/// Anything with a position on the simulation timeline.
pub trait Scheduled {
    fn time(&self) -> Time;

    /// Tie-break among items with equal time; lower runs first.
    fn seq(&self) -> u64;

    #[inline]
    fn key(&self) -> (Time, u64) {
        (self.time(), self.seq())
    }
}

impl<T: Scheduled + ?Sized> Scheduled for Box<T> {
    #[inline]
    fn time(&self) -> Time {
        (**self).time()
    }

    #[inline]
    fn seq(&self) -> u64 {
        (**self).seq()
    }
}

/// Priority queue contract shared by every scheduling strategy.
pub trait Scheduler<T: Scheduled> {
    fn insert(&mut self, item: T);

    /// Removes the earliest item.
    fn remove_first(&mut self) -> Result<T, SchedulerError>;

    /// Earliest item without removing it.
    fn peek_first(&mut self) -> Option<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        while self.remove_first().is_ok() {}
    }
}

/// Build the strategy selected by configuration.
pub fn from_config<T: Scheduled + 'static>(config: &SchedulerConfig) -> Box<dyn Scheduler<T>> {
    match config.kind {
        SchedulerKind::Heap => Box::new(Heap::new()),
        SchedulerKind::Calendar => Box::new(Calendar::new(
            config.calendar.bin_width,
            config.calendar.bins,
        )),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Minimal scheduled item for queue tests.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Item {
        pub time: Time,
        pub seq: u64,
    }

    impl Scheduled for Item {
        fn time(&self) -> Time {
            self.time
        }

        fn seq(&self) -> u64 {
            self.seq
        }
    }

    pub fn drain<S: Scheduler<Item> + ?Sized>(scheduler: &mut S) -> Vec<Item> {
        let mut out = Vec::with_capacity(scheduler.len());
        while let Ok(item) = scheduler.remove_first() {
            out.push(item);
        }
        out
    }
}
