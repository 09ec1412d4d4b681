//! ## kairos-core::time
//! **Simulation clock and time reporting**
//!
//! Simulation time is a logical tick counter, not wall-clock time. It only
//! moves when the controller dispatches an event or an operation advances it.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time in ticks.
pub type Time = u64;

/// Terminal time. Events scheduled here still run while the controller drains.
pub const END: Time = Time::MAX;

/// Single-threaded clock owned by one controller.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<Time>,
}

impl SimClock {
    pub fn new(start: Time) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    #[inline]
    pub fn now(&self) -> Time {
        self.now.get()
    }

    #[inline]
    pub(crate) fn set(&self, time: Time) {
        self.now.set(time);
    }

    /// Advances by `ticks`, saturating at [`END`].
    #[inline]
    pub fn advance(&self, ticks: Time) -> Time {
        let next = self.now.get().saturating_add(ticks);
        self.now.set(next);
        next
    }
}

/// Purely cosmetic unit used when rendering times for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUnit {
    ticks: u64,
    label: String,
}

impl TimeUnit {
    /// `ticks` of simulation time make one displayed unit. Zero is treated as one.
    pub fn new(ticks: u64, label: impl Into<String>) -> Self {
        Self {
            ticks: ticks.max(1),
            label: label.into(),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self, time: Time) -> String {
        if time == END {
            "END".to_string()
        } else {
            format!("{}{}", time / self.ticks, self.label)
        }
    }
}

impl Default for TimeUnit {
    fn default() -> Self {
        Self::new(1, " ticks")
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ticks, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_initial_value() {
        let clock = SimClock::new(100);
        assert_eq!(clock.now(), 100);
    }

    #[test]
    fn test_clock_advance() {
        let clock = SimClock::new(0);
        clock.advance(500);
        assert_eq!(clock.now(), 500);
        clock.advance(250);
        assert_eq!(clock.now(), 750);
    }

    #[test]
    fn test_clock_saturates_at_end() {
        let clock = SimClock::new(END - 1);
        assert_eq!(clock.advance(10), END);
    }

    #[test]
    fn test_unit_formatting() {
        let unit = TimeUnit::new(1000, " ms");
        assert_eq!(unit.format(2500), "2 ms");
        assert_eq!(unit.format(END), "END");
        assert_eq!(TimeUnit::new(0, "x").ticks(), 1);
    }
}
