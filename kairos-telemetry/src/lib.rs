//! # Kairos Telemetry
//!
//! Logging, metrics and progress reporting for the simulation kernel.
//! Nothing in this crate mutates simulation state: the dispatch loop writes
//! into a [`ProgressProbe`] and [`MetricsRecorder`], everything else only reads.

pub mod logging;
pub mod metrics;
pub mod progress;

pub use logging::init as init_logging;
pub use metrics::MetricsRecorder;
pub use progress::{format_hms, ProgressProbe, ProgressReporter};
