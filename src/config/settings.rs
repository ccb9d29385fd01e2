use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::BrokerConfig;
use crate::{error::SettingsError, logging::LoggingConfig};

/// Environment variable holding an explicit configuration file path.
pub const CONFIG_PATH_ENV: &str = "PIPESUB_CONFIG";
/// File read from the working directory when `PIPESUB_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "pipesub.toml";
/// Prefix of environment overrides, e.g. `PIPESUB__BROKER__DEFAULT_LIMIT=8`.
pub const ENV_PREFIX: &str = "PIPESUB";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads settings from the file named by `PIPESUB_CONFIG`, or from
    /// `pipesub.toml` if present, then applies environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Like [`load`](Self::load) with an explicit file. A given path must
    /// exist; without one the default file is optional.
    pub fn load_from(path: Option<&Path>) -> Result<Self, SettingsError> {
        let defaults = Settings::default();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let cfg = Config::builder()
            // Adding default values
            .set_default(
                "broker.auto_create_topics",
                defaults.broker.auto_create_topics,
            )?
            .set_default("broker.default_limit", defaults.broker.default_limit as u64)?
            .set_default(
                "broker.default_timeout_secs",
                defaults.broker.default_timeout_secs,
            )?
            .set_default(
                "broker.shutdown_timeout_secs",
                defaults.broker.shutdown_timeout_secs,
            )?
            .set_default("logging.level", defaults.logging.level.as_str())?
            .set_default("logging.format", defaults.logging.format.as_str())?
            .set_default("logging.ansi", defaults.logging.ansi)?
            .set_default("logging.with_target", defaults.logging.with_target)?
            .add_source(file)
            // Add environment variables with the PIPESUB__ prefix
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.broker.validate()?;
        self.logging
            .validate()
            .map_err(|e| SettingsError::invalid("logging", e.to_string()))
    }
}
