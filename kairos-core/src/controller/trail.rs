use std::collections::VecDeque;

use crate::entity::EntityRef;
use crate::time::{Time, TimeUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailEntry {
    pub time: Time,
    pub target: EntityRef,
    pub operation: &'static str,
}

/// Bounded ring of the most recently dispatched events, attached to
/// application failure reports.
#[derive(Debug)]
pub struct EventTrail {
    depth: usize,
    entries: VecDeque<TrailEntry>,
}

impl EventTrail {
    /// A depth of zero records nothing.
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            entries: VecDeque::with_capacity(depth),
        }
    }

    #[inline]
    pub fn record(&mut self, time: Time, target: EntityRef, operation: &'static str) {
        if self.depth == 0 {
            return;
        }
        if self.entries.len() == self.depth {
            self.entries.pop_front();
        }
        self.entries.push_back(TrailEntry {
            time,
            target,
            operation,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &TrailEntry> {
        self.entries.iter()
    }

    /// Oldest first.
    pub fn lines(&self, unit: &TimeUnit) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{} {} {}", unit.format(e.time), e.target, e.operation))
            .collect()
    }
}
