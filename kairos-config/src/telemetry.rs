//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Default `tracing` filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    #[validate(custom(function = validation::validate_log_level))]
    pub log_level: String,

    /// Interval between progress lines; `0` disables the reporter thread.
    #[serde(default)]
    #[validate(range(max = 3600000))]
    pub progress_interval_ms: u64,

    /// Record Prometheus metrics for the dispatch loop.
    #[serde(default)]
    pub metrics: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            progress_interval_ms: 0,
            metrics: false,
        }
    }
}
