//! # Kairos Configuration System
//!
//! Hierarchical configuration for the Kairos simulation kernel.
//!
//! ## Features
//! - **Unified Configuration**: one document drives the controller and telemetry
//! - **Validation**: every load path validates before handing the config out
//! - **Environment Awareness**: `KAIROS_*` variables override file values

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod controller;
mod error;
mod provider;
mod telemetry;
mod validation;

pub use controller::CalendarConfig;
pub use controller::ControllerConfig;
pub use controller::PoolConfig;
pub use controller::SchedulerConfig;
pub use controller::SchedulerKind;
pub use controller::TimeUnitConfig;
pub use error::ConfigError;
pub use provider::{ConfigProvider, LayeredProvider, YamlFileProvider};
pub use telemetry::TelemetryConfig;

/// Environment variable prefix for overrides, `__` separates nesting levels.
pub const ENV_PREFIX: &str = "KAIROS_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct KairosConfig {
    /// Dispatch loop, scheduler and pool parameters.
    #[validate(nested)]
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Logging, progress reporting and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl KairosConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/kairos.yaml`, skipped when missing
    /// 3. `config/<KAIROS_ENV>.yaml`, skipped when missing
    /// 4. `KAIROS_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&LayeredProvider::default())
    }

    /// Load configuration through an arbitrary provider.
    pub fn load_with<P: ConfigProvider>(provider: &P) -> Result<Self, ConfigError> {
        provider
            .load()?
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Load configuration from a specific path, with environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with(&YamlFileProvider::new(path.as_ref()))
    }

    /// Base figment holding the compiled-in defaults.
    pub(crate) fn defaults() -> Figment {
        Figment::from(Serialized::defaults(KairosConfig::default()))
    }

    pub(crate) fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    pub(crate) fn yaml(path: &Path) -> figment::providers::Data<Yaml> {
        Yaml::file(path)
    }
}
