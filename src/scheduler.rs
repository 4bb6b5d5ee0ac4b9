//! Drive the two refresh cycles.
//!
//! The fast cycle refreshes the current reading, the slow cycle refreshes
//! both history windows. Every tick runs in its own task, so a slow fetch
//! never delays the next tick and cycles may overlap. The store applies
//! results in the order the cycles complete.
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use temperature_common::datetime::{epoch_now, with_duration, Epoch, Granularity, Window};
use temperature_common::readings::{normalize, normalize_current, Labels};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::display;
use crate::services::remote::{self, TemperatureSource};
use crate::spawn;

/// Polling configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// How often to refresh the current reading.
    #[serde(with = "with_duration")]
    pub current_interval: Duration,

    /// How often to refresh the history windows.
    #[serde(with = "with_duration")]
    pub history_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_interval: Duration::from_secs(1),
            history_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Check both intervals can drive a timer.
    ///
    /// # Errors
    ///
    /// If either interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.current_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("current_interval"));
        }
        if self.history_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("history_interval"));
        }
        Ok(())
    }
}

/// The polling configuration cannot be used.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// A polling interval is zero.
    #[error("Polling interval {0} must not be zero")]
    ZeroInterval(&'static str),
}

/// A refresh cycle did not update the display.
#[derive(Error, Debug)]
pub enum CycleError {
    /// The current reading could not be fetched.
    #[error("Failed to fetch current temperature: {0}")]
    Current(#[source] remote::Error),

    /// One of the history windows could not be fetched.
    #[error("Failed to fetch {granularity} history: {source}")]
    History {
        /// The window that failed.
        granularity: Granularity,
        /// Why it failed.
        #[source]
        source: remote::Error,
    },

    /// The display no longer accepts updates.
    #[error("Cannot update display: {0}")]
    Display(#[from] display::Error),
}

/// Fetch the current reading and store it.
///
/// # Errors
///
/// If the fetch fails or the store is closed. The stored reading is left
/// untouched in both cases.
pub async fn refresh_current<S>(source: &S, store: &display::Sender) -> Result<(), CycleError>
where
    S: TemperatureSource + ?Sized,
{
    let current = source.fetch_current().await.map_err(CycleError::Current)?;
    store.set_current(normalize_current(current)).await?;
    Ok(())
}

/// Fetch both history windows for `now` and store them together.
///
/// Both fetches run concurrently and are awaited before anything is stored.
/// If either fails, neither window is updated.
///
/// # Errors
///
/// If either fetch fails or the store is closed.
pub async fn refresh_history<S>(
    source: &S,
    labels: &Labels,
    now: Epoch,
    store: &display::Sender,
) -> Result<(), CycleError>
where
    S: TemperatureSource + ?Sized,
{
    let hourly_window = Window::hourly(now);
    let daily_window = Window::daily(now);
    debug!("Hourly range: {hourly_window}");
    debug!("Daily range: {daily_window}");

    let (hourly, daily) = tokio::join!(
        source.fetch_history(&hourly_window),
        source.fetch_history(&daily_window)
    );

    let (hourly, daily) = match (hourly, daily) {
        (Ok(hourly), Ok(daily)) => (hourly, daily),
        (Err(err), daily) => {
            if let Err(daily_err) = daily {
                error!("Failed to fetch daily history: {daily_err}");
            }
            return Err(CycleError::History {
                granularity: Granularity::Hourly,
                source: err,
            });
        }
        (Ok(_), Err(err)) => {
            return Err(CycleError::History {
                granularity: Granularity::Daily,
                source: err,
            });
        }
    };

    let hourly = normalize(hourly, Granularity::Hourly, labels);
    let daily = normalize(daily, Granularity::Daily, labels);
    debug!(
        "Got {} hourly and {} daily readings",
        hourly.len(),
        daily.len()
    );

    store.set_history(hourly, daily).await?;
    Ok(())
}

fn log_cycle_error(err: &CycleError) {
    match err {
        CycleError::Display(_) => debug!("Discarding refresh result: {err}"),
        _ => error!("{err}"),
    }
}

fn every<F, Fut>(period: Duration, mut cycle: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            timer.tick().await;
            spawn(cycle());
        }
    })
}

/// Handle to the running refresh cycles.
///
/// Dropping the handle stops the cycles.
pub struct Scheduler {
    timers: Vec<JoinHandle<()>>,
    store: display::Sender,
}

impl Scheduler {
    /// Start both cycles. Each fires once immediately.
    ///
    /// # Errors
    ///
    /// If either interval is zero. Nothing is started in that case.
    pub fn start(
        source: Arc<dyn TemperatureSource>,
        labels: Labels,
        config: &Config,
        store: display::Sender,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            "Refreshing current temperature every {:?} and history every {:?}",
            config.current_interval, config.history_interval
        );

        let current = {
            let source = source.clone();
            let store = store.clone();
            every(config.current_interval, move || {
                let source = source.clone();
                let store = store.clone();
                async move {
                    if let Err(err) = refresh_current(source.as_ref(), &store).await {
                        log_cycle_error(&err);
                    }
                }
            })
        };

        let history = {
            let store = store.clone();
            every(config.history_interval, move || {
                let source = source.clone();
                let labels = labels.clone();
                let store = store.clone();
                async move {
                    let now = epoch_now();
                    if let Err(err) = refresh_history(source.as_ref(), &labels, now, &store).await {
                        log_cycle_error(&err);
                    }
                }
            })
        };

        Ok(Self {
            timers: vec![current, history],
            store,
        })
    }

    /// Stop both cycles.
    ///
    /// No further ticks fire. Fetches already in flight run to completion but
    /// their results are discarded. Calling this more than once is harmless.
    pub fn stop(&self) {
        if !self.store.is_closed() {
            info!("Stopping refresh cycles");
        }
        for timer in &self.timers {
            timer.abort();
        }
        self.store.close();
    }

    /// Has the scheduler been stopped?
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.store.is_closed()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
