use std::collections::BTreeMap;
use std::time::Duration;

use kairos_telemetry::format_hms;
use serde::Serialize;
use tracing::info;

use crate::alloc::PoolStats;
use crate::time::{Time, TimeUnit};

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Events dispatched, end sentinels excluded.
    pub events: u64,
    /// Events dropped because they fell after the end of simulation.
    pub discarded: u64,
    pub sim_time: Time,
    pub wall: Duration,
    /// Dispatches per operation; empty unless event counting is enabled.
    pub operations: BTreeMap<&'static str, u64>,
    /// Blocking calls still waiting for a result when the run halted.
    pub pending_continuations: usize,
    #[serde(skip)]
    pub event_pool: PoolStats,
    #[serde(skip)]
    pub continuation_pool: PoolStats,
}

impl RunSummary {
    pub fn events_per_second(&self) -> f64 {
        let secs = self.wall.as_secs_f64();
        if secs > 0.0 {
            self.events as f64 / secs
        } else {
            0.0
        }
    }

    pub(crate) fn log(&self, unit: &TimeUnit) {
        info!(
            "TOTAL: {} real, {} sim, {} ev, {:.0} ev/s",
            format_hms(self.wall.as_secs()),
            unit.format(self.sim_time),
            self.events,
            self.events_per_second()
        );
        for (operation, count) in &self.operations {
            info!("  {operation}: {count}");
        }
        info!(
            events = %self.event_pool,
            continuations = %self.continuation_pool,
            "pool usage"
        );
    }
}
