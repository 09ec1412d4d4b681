//! Configuration providers: where a [`KairosConfig`](crate::KairosConfig) figment comes from.

use std::path::{Path, PathBuf};

use figment::Figment;

use crate::{ConfigError, KairosConfig};

/// Trait for loading Kairos configuration from different sources.
pub trait ConfigProvider {
    /// Loads the configuration and returns a Figment instance.
    fn load(&self) -> Result<Figment, ConfigError>;
}

/// Defaults, then `config/kairos.yaml`, then `config/<env>.yaml`, then environment.
#[derive(Debug, Clone)]
pub struct LayeredProvider {
    dir: PathBuf,
}

impl LayeredProvider {
    /// Layer files found under `dir` instead of `config/`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for LayeredProvider {
    fn default() -> Self {
        Self::in_dir("config")
    }
}

impl ConfigProvider for LayeredProvider {
    fn load(&self) -> Result<Figment, ConfigError> {
        let mut figment = KairosConfig::defaults();

        let base = self.dir.join("kairos.yaml");
        if base.exists() {
            figment = figment.merge(KairosConfig::yaml(&base));
        }

        let env = std::env::var("KAIROS_ENV").unwrap_or_else(|_| "default".into());
        let env_file = self.dir.join(format!("{env}.yaml"));
        if env_file.exists() {
            figment = figment.merge(KairosConfig::yaml(&env_file));
        }

        Ok(figment.merge(KairosConfig::env()))
    }
}

/// A single YAML file over the defaults, plus environment overrides.
#[derive(Debug, Clone)]
pub struct YamlFileProvider {
    path: PathBuf,
}

impl YamlFileProvider {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ConfigProvider for YamlFileProvider {
    fn load(&self) -> Result<Figment, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::FileNotFound(self.path.clone()));
        }
        Ok(KairosConfig::defaults()
            .merge(KairosConfig::yaml(&self.path))
            .merge(KairosConfig::env()))
    }
}
