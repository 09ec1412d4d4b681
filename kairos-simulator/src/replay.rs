//! Reproducibility checks built on [`RunDigest`](crate::RunDigest).
//!
//! A run's digest covers every dispatched event's time, target and
//! operation, so two runs with equal digests processed the same trace.

use kairos_config::{KairosConfig, SchedulerKind};
use tracing::{info, warn};

use crate::{Bootstrap, RunReport, Simulation, SimulatorError};

/// The same scenario run once per scheduler strategy.
#[derive(Debug, Clone)]
pub struct SchedulerComparison {
    pub heap: RunReport,
    pub calendar: RunReport,
}

impl SchedulerComparison {
    pub fn matches(&self) -> bool {
        self.heap.digest == self.calendar.digest
    }
}

/// Run `bootstrap` under the heap and the calendar queue with otherwise identical
/// configuration.
pub fn compare_schedulers<B: Bootstrap + ?Sized>(
    config: &KairosConfig,
    bootstrap: &B,
) -> Result<SchedulerComparison, SimulatorError> {
    let run_with = |kind: SchedulerKind| {
        let mut config = config.clone();
        config.controller.scheduler.kind = kind;
        Simulation::new(config).run(bootstrap)
    };
    let comparison = SchedulerComparison {
        heap: run_with(SchedulerKind::Heap)?,
        calendar: run_with(SchedulerKind::Calendar)?,
    };
    if comparison.matches() {
        info!(scenario = bootstrap.name(), digest = %comparison.heap.digest, "schedulers agree");
    } else {
        warn!(
            scenario = bootstrap.name(),
            heap = %comparison.heap.digest,
            calendar = %comparison.calendar.digest,
            "schedulers disagree"
        );
    }
    Ok(comparison)
}

/// Rerun `bootstrap` and fail unless it reproduces `expected`.
pub fn verify_replay<B: Bootstrap + ?Sized>(
    simulation: &Simulation,
    bootstrap: &B,
    expected: &str,
) -> Result<RunReport, SimulatorError> {
    let report = simulation.run(bootstrap)?;
    if !report.digest.eq_ignore_ascii_case(expected) {
        return Err(SimulatorError::ReplayMismatch {
            scenario: report.scenario,
            expected: expected.to_owned(),
            actual: report.digest,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{Greeting, PingPong};

    #[test]
    fn both_schedulers_produce_the_same_trace() {
        let comparison = compare_schedulers(&KairosConfig::default(), &PingPong::new(4, 3)).unwrap();
        assert!(comparison.matches());
        assert_eq!(comparison.heap.summary.events, comparison.calendar.summary.events);
    }

    #[test]
    fn replay_against_a_recorded_digest() {
        let simulation = Simulation::default();
        let recorded = simulation.run(&Greeting::new(3)).unwrap().digest;
        let replayed = verify_replay(&simulation, &Greeting::new(3), &recorded).unwrap();
        assert_eq!(replayed.digest, recorded);

        let err = verify_replay(&simulation, &Greeting::new(4), &recorded).unwrap_err();
        assert!(matches!(err, SimulatorError::ReplayMismatch { .. }));
    }
}
