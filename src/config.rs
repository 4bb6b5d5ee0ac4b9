//! Load the monitor configuration.
use envconfig::Envconfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use temperature_common::readings::LabelError;
use thiserror::Error;

use crate::services::remote;
use crate::{logging, scheduler, view};

/// Settings taken from environment variables.
#[derive(Envconfig)]
pub struct Environment {
    /// YAML configuration file. Defaults are used if not set.
    #[envconfig(from = "MONITOR_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

fn load_file(filename: &Path) -> Result<Config, Error> {
    let f = std::fs::File::open(filename).map_err(|e| Error::File(filename.to_path_buf(), e))?;
    let config: Config =
        serde_yml::from_reader(f).map_err(|e| Error::Yaml(filename.to_path_buf(), e))?;

    Ok(config)
}

impl Environment {
    /// Get the configuration.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or parsed, or holds invalid values.
    pub fn config(&self) -> Result<Config, Error> {
        let config = match &self.config_file {
            Some(config_file) => load_file(config_file)?,
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the environment from the environment variables.
    ///
    /// # Errors
    ///
    /// If a variable is set but cannot be parsed.
    pub fn load() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }
}

/// The full configuration.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The remote temperature service.
    pub remote: remote::Config,
    /// Refresh cycle intervals.
    pub polling: scheduler::Config,
    /// How readings are shown.
    pub display: view::Config,
    /// Log output.
    pub logging: logging::Config,
}

impl Config {
    /// Check values that cannot be checked while parsing.
    ///
    /// # Errors
    ///
    /// If an interval is zero or the date format is invalid.
    pub fn validate(&self) -> Result<(), Error> {
        self.polling.validate()?;
        self.display.labels()?;
        Ok(())
    }
}

/// An error loading the Config
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading the file
    #[error("Error reading file {0}: {1}")]
    File(PathBuf, std::io::Error),

    /// Error parsing the file
    #[error("Error parsing file {0}: {1}")]
    Yaml(PathBuf, serde_yml::Error),

    /// The polling settings are invalid
    #[error("Invalid polling settings: {0}")]
    Polling(#[from] scheduler::ConfigError),

    /// The date format is invalid
    #[error("Invalid display settings: {0}")]
    Labels(#[from] LabelError),
}
