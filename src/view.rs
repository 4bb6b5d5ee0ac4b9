//! Text rendering of the display state.
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use temperature_common::datetime::with_duration;
use temperature_common::readings::{LabelError, Labels, DEFAULT_DATE_FORMAT};
use temperature_common::NormalizedReading;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::display::{self, DisplayState};
use crate::spawn;

/// Heading shown above the current reading.
pub const CURRENT_HEADING: &str = "Current Temperature";

/// Shown while no current reading is available.
pub const LOADING: &str = "Loading...";

/// Display configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Timezone used for labels. The host's local timezone if not set.
    pub timezone: Option<Tz>,

    /// strftime format used for daily labels.
    pub date_format: String,

    /// History older than this is marked as stale.
    #[serde(with = "with_duration")]
    pub stale_after: Duration,

    /// How often the last state is rendered again when nothing changes.
    /// Zero renders on changes only.
    #[serde(with = "with_duration")]
    pub refresh: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            stale_after: Duration::from_secs(180),
            refresh: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Get the label settings.
    ///
    /// # Errors
    ///
    /// If the date format is invalid.
    pub fn labels(&self) -> Result<Labels, LabelError> {
        Labels::new(self.timezone, self.date_format.clone())
    }
}

/// One chart worth of readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel<'a> {
    /// Section heading.
    pub heading: &'static str,
    /// Chart title.
    pub title: &'static str,
    /// Shown instead of the chart while there are no readings.
    pub placeholder: &'static str,
    /// Readings in ascending order.
    pub readings: &'a [NormalizedReading],
}

/// Get the two history panels, hourly first.
#[must_use]
pub fn panels(state: &DisplayState) -> [Panel<'_>; 2] {
    [
        Panel {
            heading: "Last 24 Hours",
            title: "Hourly Temperature",
            placeholder: "Loading hourly data...",
            readings: &state.hourly,
        },
        Panel {
            heading: "Last 30 Days",
            title: "Daily Temperature",
            placeholder: "Loading daily data...",
            readings: &state.daily,
        },
    ]
}

fn render_panel(panel: &Panel<'_>, stale: bool) -> String {
    let (Some(first), Some(last)) = (panel.readings.first(), panel.readings.last()) else {
        return format!("{}: {}", panel.heading, panel.placeholder);
    };

    let mut line = format!(
        "{}: {}, {} readings from {} ({:.2}°C) to {} ({:.2}°C)",
        panel.heading,
        panel.title,
        panel.readings.len(),
        first.formatted_time,
        first.temperature,
        last.formatted_time,
        last.temperature,
    );
    if stale {
        line.push_str(" (stale)");
    }
    line
}

/// Render the state as text lines, one per section.
#[must_use]
pub fn render(state: &DisplayState, now: DateTime<Utc>, stale_after: TimeDelta) -> Vec<String> {
    let current = state.current.map_or_else(
        || format!("{CURRENT_HEADING}: {LOADING}"),
        |current| format!("{CURRENT_HEADING}: {:.2}°C", current.temperature),
    );

    let stale = state.is_history_stale(now, stale_after);

    std::iter::once(current)
        .chain(panels(state).iter().map(|panel| render_panel(panel, stale)))
        .collect()
}

/// Something that shows the display state to a user.
pub trait View: Send {
    /// Show a new snapshot.
    fn render(&mut self, state: &DisplayState);
}

/// A view that writes changed lines to the log.
pub struct LogView {
    stale_after: TimeDelta,
    last: Vec<String>,
}

impl LogView {
    /// Create a new log view.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            stale_after: TimeDelta::from_std(config.stale_after).unwrap_or(TimeDelta::MAX),
            last: Vec::new(),
        }
    }
}

impl View for LogView {
    fn render(&mut self, state: &DisplayState) {
        let lines = render(state, Utc::now(), self.stale_after);
        for (i, line) in lines.iter().enumerate() {
            if self.last.get(i) != Some(line) {
                info!("{line}");
            }
        }
        self.last = lines;
    }
}

async fn maybe_tick(timer: &mut Option<Interval>) -> Option<()> {
    if let Some(timer) = timer {
        timer.tick().await;
        Some(())
    } else {
        None
    }
}

/// Render every state change until the store goes away.
///
/// The last state is also rendered again every `refresh`, so markers that
/// depend on the time, such as staleness, appear without a new update.
pub fn run<V>(receiver: display::Receiver, mut view: V, refresh: Duration) -> JoinHandle<()>
where
    V: View + 'static,
{
    spawn(async move {
        let mut subscription = match receiver.subscribe().await {
            Ok(subscription) => subscription,
            Err(err) => {
                debug!("view: {err}");
                return;
            }
        };
        drop(receiver);

        let Ok(mut state) = subscription.recv().await else {
            debug!("view: display state closed");
            return;
        };
        view.render(&state);

        let mut timer = (!refresh.is_zero()).then(|| {
            let mut timer = interval(refresh);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        });
        // The first tick completes immediately.
        maybe_tick(&mut timer).await;

        loop {
            select! {
                next = subscription.recv() => {
                    let Ok(next) = next else { break };
                    state = next;
                    view.render(&state);
                }
                Some(()) = maybe_tick(&mut timer) => {
                    view.render(&state);
                }
            }
        }

        debug!("view: display state closed");
    })
}
