/*!
# Kairos Simulator

Bootstrap collaborator for the Kairos kernel: builds a controller from
configuration, lets a [`Bootstrap`] create the initial entities, runs the
dispatch loop with optional progress reporting and metrics, and returns a
[`RunReport`] whose BLAKE3 digest identifies the processed event trace.

## Key Components:
- **Driver:** the [`Bootstrap`] trait implemented by every scenario.
- **Digest:** event-trace hashing for reproducibility checks.
- **Scenarios:** greeting, channel ping-pong, proxied bank, random workload.
- **Replay:** rerun a scenario and compare digests, across scheduler strategies.
*/

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use kairos_config::{ConfigError, KairosConfig};
use kairos_core::controller::RunSummary;
use kairos_core::log::TracingSink;
use kairos_core::{SimulationError, Sim};
use kairos_telemetry::{MetricsRecorder, ProgressProbe, ProgressReporter};

pub mod digest;
pub mod driver;
pub mod replay;
pub mod scenario;

pub use digest::RunDigest;
pub use driver::Bootstrap;
pub use replay::{compare_schedulers, verify_replay, SchedulerComparison};
pub use scenario::ScenarioSpec;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bootstrap '{scenario}' failed: {failure:#}")]
    Bootstrap {
        scenario: String,
        failure: anyhow::Error,
    },

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    #[error("Replay of '{scenario}' diverged: expected {expected}, got {actual}")]
    ReplayMismatch {
        scenario: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub summary: RunSummary,
    /// Hex BLAKE3 digest of `(time, entity index, operation)` for every dispatched event.
    pub digest: String,
    /// Prometheus text exposition, when metrics are enabled.
    pub metrics: Option<String>,
}

/// Configured runner. Each call to [`Simulation::run`] uses a fresh controller.
pub struct Simulation {
    config: KairosConfig,
}

impl Simulation {
    pub fn new(config: KairosConfig) -> Self {
        Self { config }
    }

    /// Defaults, `config/` files and `KAIROS_*` overrides.
    pub fn load() -> Result<Self, SimulatorError> {
        Ok(Self::new(KairosConfig::load()?))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SimulatorError> {
        Ok(Self::new(KairosConfig::load_from_path(path)?))
    }

    pub fn config(&self) -> &KairosConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut KairosConfig {
        &mut self.config
    }

    /// Install the global `tracing` subscriber at the configured level.
    pub fn init_logging(&self) -> bool {
        kairos_telemetry::init_logging(&self.config.telemetry.log_level)
    }

    pub fn run<B: Bootstrap + ?Sized>(&self, bootstrap: &B) -> Result<RunReport, SimulatorError> {
        let sim = Sim::from_config(&self.config.controller);
        sim.set_logger(TracingSink);
        let digest = RunDigest::default();
        sim.set_observer(digest.clone());

        let metrics = if self.config.telemetry.metrics {
            let recorder = MetricsRecorder::new()
                .map_err(|e| SimulatorError::Telemetry(e.to_string()))?;
            let recorder = Arc::new(recorder);
            sim.set_metrics(recorder.clone());
            Some(recorder)
        } else {
            None
        };

        bootstrap
            .seed(&sim)
            .map_err(|failure| SimulatorError::Bootstrap {
                scenario: bootstrap.name().to_owned(),
                failure,
            })?;
        info!(scenario = bootstrap.name(), entities = sim.entity_count(), "scenario seeded");

        let reporter = match self.config.telemetry.progress_interval_ms {
            0 => None,
            interval => {
                let probe = ProgressProbe::new();
                sim.set_probe(probe.clone());
                let unit = sim.time_unit();
                Some(ProgressReporter::spawn(
                    probe,
                    Duration::from_millis(interval),
                    unit.ticks(),
                    unit.label().to_owned(),
                )?)
            }
        };

        let outcome = sim.run();
        // joined before anything looks at the final state
        if let Some(reporter) = reporter {
            reporter.stop();
        }
        let summary = outcome?;

        let metrics = match metrics {
            Some(recorder) => Some(
                recorder
                    .gather_metrics()
                    .map_err(|e| SimulatorError::Telemetry(e.to_string()))?,
            ),
            None => None,
        };

        Ok(RunReport {
            scenario: bootstrap.name().to_owned(),
            summary,
            digest: digest.hex(),
            metrics,
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(KairosConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Greeting;
    use kairos_core::prelude::Failure;

    #[test]
    fn bootstrap_failures_are_reported_with_the_scenario_name() {
        struct Broken;
        impl Bootstrap for Broken {
            fn name(&self) -> &str {
                "broken"
            }

            fn seed(&self, _sim: &Sim) -> Result<(), Failure> {
                Err(anyhow::anyhow!("no entities"))
            }
        }

        let err = Simulation::default().run(&Broken).unwrap_err();
        assert!(matches!(err, SimulatorError::Bootstrap { ref scenario, .. } if scenario == "broken"));
    }

    #[test]
    fn metrics_are_exposed_when_enabled() {
        let mut simulation = Simulation::default();
        simulation.config_mut().telemetry.metrics = true;
        let report = simulation.run(&Greeting::new(3)).unwrap();
        let text = report.metrics.expect("metrics enabled");
        assert!(text.contains("kairos_events_total 3"), "{text}");
    }

    #[test]
    fn progress_reporter_is_joined_before_returning() {
        let mut simulation = Simulation::default();
        simulation.config_mut().telemetry.progress_interval_ms = 1;
        let report = simulation.run(&Greeting::new(5)).unwrap();
        assert_eq!(report.summary.events, 5);
    }
}
