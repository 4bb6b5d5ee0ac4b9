//! Log output setup.
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// An error setting up logging.
#[derive(Error, Debug)]
pub enum Error {
    /// The filter could not be parsed.
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    /// A global subscriber was already installed.
    #[error("TryInitError error: {0}")]
    TryInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the log filter.
///
/// `RUST_LOG` wins over the configured level. HTTP client internals are
/// limited to warnings either way.
///
/// # Errors
///
/// If a directive cannot be parsed.
pub fn filter(config: &Config) -> Result<EnvFilter, Error> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.is_empty() => EnvFilter::try_new(env)?,
        _ => EnvFilter::try_new(&config.level)?,
    };

    Ok(filter
        .add_directive("hyper=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?)
        .add_directive("reqwest=warn".parse()?))
}

/// Install the global subscriber.
///
/// # Errors
///
/// If the filter is invalid or a subscriber is already installed.
pub fn init(config: &Config) -> Result<(), Error> {
    let filter = filter(config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
