//! Epoch based time windows and duration helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Seconds since the Unix epoch.
pub type Epoch = i64;

/// Number of seconds in one hour.
pub const SECONDS_PER_HOUR: Epoch = 3600;

/// Number of seconds in one day.
pub const SECONDS_PER_DAY: Epoch = 24 * SECONDS_PER_HOUR;

/// The size of the time bucket a reading or window represents.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One hour buckets, covering the last 24 hours.
    Hourly,
    /// One day buckets, covering the last 30 days.
    Daily,
}

impl Granularity {
    /// Length of one bucket in seconds.
    #[must_use]
    pub const fn bucket_seconds(self) -> Epoch {
        match self {
            Self::Hourly => SECONDS_PER_HOUR,
            Self::Daily => SECONDS_PER_DAY,
        }
    }

    /// Number of complete buckets before the current one.
    #[must_use]
    pub const fn lookback(self) -> Epoch {
        match self {
            Self::Hourly => 24,
            Self::Daily => 30,
        }
    }

    /// Name used in the remote query string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bucket aligned `[start, end)` range used to query history.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Window {
    /// First second of the window.
    pub start: Epoch,
    /// End of the window, exclusive.
    pub end: Epoch,
    /// Bucket size of the window.
    pub granularity: Granularity,
}

impl Window {
    /// Compute the window for `granularity` anchored at `now`.
    ///
    /// The window ends at the close of the bucket containing `now`, so the
    /// in-progress bucket is always included. Near the ends of the `i64`
    /// range the bounds are clamped instead of overflowing.
    #[must_use]
    pub const fn for_granularity(granularity: Granularity, now: Epoch) -> Self {
        let bucket = granularity.bucket_seconds();
        let current = now.saturating_sub(now.rem_euclid(bucket));
        Self {
            start: current.saturating_sub(granularity.lookback() * bucket),
            end: current.saturating_add(bucket),
            granularity,
        }
    }

    /// The last 24 hours, hour aligned.
    #[must_use]
    pub const fn hourly(now: Epoch) -> Self {
        Self::for_granularity(Granularity::Hourly, now)
    }

    /// The last 30 days, day aligned.
    #[must_use]
    pub const fn daily(now: Epoch) -> Self {
        Self::for_granularity(Granularity::Daily, now)
    }

    /// Length of the window in seconds.
    #[must_use]
    pub const fn span(&self) -> Epoch {
        self.end - self.start
    }

    /// Is the timestamp inside the window?
    #[must_use]
    pub const fn contains(&self, timestamp: Epoch) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

fn epoch_to_string(epoch: Epoch) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map_or_else(|| "out of range".to_string(), |dt| dt.to_rfc3339())
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} to {} ({} to {})",
            self.granularity,
            epoch_to_string(self.start),
            epoch_to_string(self.end),
            self.start,
            self.end
        )
    }
}

/// Get the current wall clock time as epoch seconds.
#[must_use]
pub fn epoch_now() -> Epoch {
    Utc::now().timestamp()
}

/// `Duration` helpers for configuration files.
pub mod duration {
    use std::time::Duration;
    use thiserror::Error;

    /// An error that can occur when parsing a `Duration`.
    #[derive(Error, Debug, Eq, PartialEq)]
    pub enum DurationParseError {
        /// Not of the form `HH:MM` or `HH:MM:SS`.
        #[error("Invalid duration {0:?}, expected HH:MM or HH:MM:SS")]
        InvalidFormat(String),

        /// Minutes or seconds were not below 60.
        #[error("Invalid duration {0:?}, field out of range")]
        OutOfRange(String),
    }

    /// Turn a string of the form `HH:MM` or `HH:MM:SS` into a `Duration`.
    ///
    /// # Errors
    ///
    /// If the string is not a valid duration.
    pub fn from_str(s: &str) -> Result<Duration, DurationParseError> {
        let invalid = || DurationParseError::InvalidFormat(s.to_string());

        let fields = s
            .split(':')
            .map(|field| field.trim().parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<u64>, _>>()?;

        let (hours, minutes, seconds) = match fields.as_slice() {
            [hours, minutes] => (*hours, *minutes, 0),
            [hours, minutes, seconds] => (*hours, *minutes, *seconds),
            _ => return Err(invalid()),
        };

        if minutes > 59 || seconds > 59 {
            return Err(DurationParseError::OutOfRange(s.to_string()));
        }

        hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60 + seconds))
            .map(Duration::from_secs)
            .ok_or_else(|| DurationParseError::OutOfRange(s.to_string()))
    }

    /// Turn a duration into a `HH:MM:SS` string. Sub-second parts are dropped.
    #[must_use]
    pub fn to_string(duration: &Duration) -> String {
        let secs = duration.as_secs();
        let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Serde serialization deserialization for a duration.
pub mod with_duration {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Deserialize a duration.
    ///
    /// # Errors
    ///
    /// If the duration is invalid.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<super::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        super::duration::from_str(&s).map_err(serde::de::Error::custom)
    }

    /// Serialize a duration.
    ///
    /// # Errors
    ///
    /// If the serializer fails.
    pub fn serialize<S>(duration: &super::Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::duration::to_string(duration))
    }
}
