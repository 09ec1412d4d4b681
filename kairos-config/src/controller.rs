//! Controller configuration parameters.
//!
//! Manages the properties of a single dispatch loop:
//! - Scheduler strategy and calendar-queue geometry
//! - Event and continuation pool sizing
//! - Time unit used for human-readable reporting

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Dispatch loop configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Pending-event queue strategy.
    #[validate(nested)]
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Free-list sizes for the hot dispatch path.
    #[validate(nested)]
    #[serde(default)]
    pub pools: PoolConfig,

    /// Cosmetic unit for time reporting.
    #[validate(nested)]
    #[serde(default)]
    pub time_unit: TimeUnitConfig,

    /// Optional end-of-simulation tick.
    #[serde(default)]
    pub end_at: Option<u64>,

    /// Number of recently dispatched events kept for failure reports.
    #[serde(default = "default_trail_depth")]
    #[validate(range(max = 4096))]
    pub trail_depth: usize,

    /// Count dispatched events per operation and report them at the end of the run.
    #[serde(default)]
    pub count_events: bool,
}

fn default_trail_depth() -> usize {
    16
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            pools: PoolConfig::default(),
            time_unit: TimeUnitConfig::default(),
            end_at: None,
            trail_depth: default_trail_depth(),
            count_events: false,
        }
    }
}

/// Which priority queue backs the scheduler.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Binary min-heap, general purpose.
    #[default]
    Heap,
    /// Calendar queue, O(1) amortized for near-uniform event density.
    Calendar,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Default)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub kind: SchedulerKind,

    /// Only consulted when `kind` is `calendar`.
    #[validate(nested)]
    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Calendar queue geometry: `bins` buckets, each `bin_width` ticks wide.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CalendarConfig {
    #[serde(default = "default_bin_width")]
    #[validate(range(min = 1))]
    pub bin_width: u64,

    #[serde(default = "default_bins")]
    #[validate(range(min = 1, max = 1048576))]
    pub bins: usize,
}

fn default_bin_width() -> u64 {
    16
}

fn default_bins() -> usize {
    1024
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            bin_width: default_bin_width(),
            bins: default_bins(),
        }
    }
}

/// Pool capacities. A pool never holds more than its capacity; extra releases are dropped.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct PoolConfig {
    #[serde(default = "default_pool_capacity")]
    #[validate(range(max = 1048576))]
    pub event_capacity: usize,

    #[serde(default = "default_pool_capacity")]
    #[validate(range(max = 1048576))]
    pub continuation_capacity: usize,
}

fn default_pool_capacity() -> usize {
    100
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_pool_capacity(),
            continuation_capacity: default_pool_capacity(),
        }
    }
}

/// Time reporting unit: `ticks` per displayed unit, followed by `label`.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TimeUnitConfig {
    #[serde(default = "default_ticks")]
    #[validate(range(min = 1))]
    pub ticks: u64,

    #[serde(default = "default_label")]
    #[validate(length(max = 32), custom(function = validation::validate_unit_label))]
    pub label: String,
}

fn default_ticks() -> u64 {
    1
}

fn default_label() -> String {
    " ticks".into()
}

impl Default for TimeUnitConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            label: default_label(),
        }
    }
}
