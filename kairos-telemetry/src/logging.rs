//! ## kairos-telemetry::logging
//! **`tracing` subscriber setup**
//!
//! `RUST_LOG` wins over the configured level so a single run can be made
//! chattier without touching the config file.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber. Returns `false` if one was already installed.
pub fn init(default_level: &str) -> bool {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_thread_names(true)
        .with_span_events(FmtSpan::NONE)
        .try_init()
        .is_ok()
}
