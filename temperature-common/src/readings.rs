//! Temperature readings and their display form.
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

use crate::datetime::{Epoch, Granularity};

/// Label format used for hourly readings.
pub const HOURLY_FORMAT: &str = "%H:%M";

/// Default label format used for daily readings.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A raw reading as returned by the remote service.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
pub struct Reading {
    /// Seconds since the epoch.
    pub timestamp: Epoch,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
}

/// A reading ready to be displayed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    /// Seconds since the epoch.
    pub timestamp: Epoch,
    /// Temperature in degrees Celsius, rounded to 2 decimal places.
    pub temperature: f64,
    /// Human readable label for the time axis.
    pub formatted_time: String,
}

impl From<NormalizedReading> for Reading {
    fn from(reading: NormalizedReading) -> Self {
        Self {
            timestamp: reading.timestamp,
            temperature: reading.temperature,
        }
    }
}

/// The most recent instantaneous reading.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
pub struct CurrentTemperature {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Seconds since the epoch.
    pub timestamp: Epoch,
}

/// The date format could not be used.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum LabelError {
    /// The format string contains an invalid specifier.
    #[error("Invalid date format {0:?}")]
    InvalidFormat(String),
}

/// How time labels are rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    timezone: Option<Tz>,
    date_format: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            timezone: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Labels {
    /// Render labels in `timezone`, or the host's local timezone if `None`.
    ///
    /// # Errors
    ///
    /// If `date_format` is not a valid strftime format.
    pub fn new(timezone: Option<Tz>, date_format: impl Into<String>) -> Result<Self, LabelError> {
        let date_format = date_format.into();
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            return Err(LabelError::InvalidFormat(date_format));
        }
        Ok(Self {
            timezone,
            date_format,
        })
    }

    /// Get the label for a timestamp.
    #[must_use]
    pub fn format(&self, timestamp: Epoch, granularity: Granularity) -> String {
        let Some(dt) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
            return timestamp.to_string();
        };

        let pattern = match granularity {
            Granularity::Hourly => HOURLY_FORMAT,
            Granularity::Daily => self.date_format.as_str(),
        };

        let mut label = String::new();
        let rc = match self.timezone {
            Some(tz) => write!(label, "{}", dt.with_timezone(&tz).format(pattern)),
            None => write!(label, "{}", dt.with_timezone(&Local).format(pattern)),
        };

        match rc {
            Ok(()) => label,
            Err(_) => timestamp.to_string(),
        }
    }
}

/// Round a temperature to 2 decimal places.
///
/// Halfway cases are rounded away from zero after scaling by 100, so
/// `21.005` becomes `21.01`.
#[must_use]
pub fn round_temperature(temperature: f64) -> f64 {
    (temperature * 100.0).round() / 100.0
}

/// Sort, round and label a list of readings.
///
/// The sort is stable, readings with the same timestamp keep their relative
/// order.
#[must_use]
pub fn normalize(
    mut readings: Vec<Reading>,
    granularity: Granularity,
    labels: &Labels,
) -> Vec<NormalizedReading> {
    readings.sort_by_key(|reading| reading.timestamp);

    readings
        .into_iter()
        .map(|reading| NormalizedReading {
            timestamp: reading.timestamp,
            temperature: round_temperature(reading.temperature),
            formatted_time: labels.format(reading.timestamp, granularity),
        })
        .collect()
}

/// Round the current reading for display.
#[must_use]
pub fn normalize_current(reading: CurrentTemperature) -> CurrentTemperature {
    CurrentTemperature {
        temperature: round_temperature(reading.temperature),
        timestamp: reading.timestamp,
    }
}
