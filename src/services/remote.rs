//! Client for the remote temperature service.
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use temperature_common::datetime::with_duration;
use temperature_common::{CurrentTemperature, Reading, Window};
use thiserror::Error;
use tracing::debug;

/// Remote service configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the API, without the trailing `/temperature`.
    pub base_url: String,

    /// Timeout applied to every request.
    #[serde(with = "with_duration")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// The broad category of a failed request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Network failure or a non-success status.
    Transport,
    /// The payload did not have the expected shape.
    Decode,
}

/// An error talking to the remote service.
#[derive(Error, Debug)]
pub enum Error {
    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Transport error: HTTP {status}: {message}")]
    Status {
        /// HTTP status returned.
        status: StatusCode,
        /// Error reported by the service, or the raw body.
        message: String,
    },

    /// The payload did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
}

impl Error {
    /// Get the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Status { .. } => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}

/// Something that can supply temperature readings.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Get the current instantaneous reading.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request fails, or a decode error if the
    /// response is malformed.
    async fn fetch_current(&self) -> Result<CurrentTemperature, Error>;

    /// Get the readings for a window.
    ///
    /// The order of the returned readings is whatever the source produced.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request fails, or a decode error if the
    /// response is malformed.
    async fn fetch_history(&self, window: &Window) -> Result<Vec<Reading>, Error>;
}

#[derive(Deserialize)]
struct HistoryResponse {
    data: Vec<Reading>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// A [`TemperatureSource`] backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    /// Create a new HTTP source.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    let payload = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&payload)
            .map_or(payload, |response| response.error);
        return Err(Error::Status { status, message });
    }

    let d = &mut serde_json::Deserializer::from_str(&payload);
    let value: T = serde_path_to_error::deserialize(d)?;
    Ok(value)
}

#[async_trait]
impl TemperatureSource for HttpSource {
    async fn fetch_current(&self) -> Result<CurrentTemperature, Error> {
        let response = self
            .client
            .get(self.url("temperature/current"))
            .header("accept", "application/json")
            .send()
            .await?;

        decode(response).await
    }

    async fn fetch_history(&self, window: &Window) -> Result<Vec<Reading>, Error> {
        debug!("Fetching history {window}");

        let response = self
            .client
            .get(self.url("temperature/history"))
            .header("accept", "application/json")
            .query(&[
                ("type", window.granularity.as_str().to_string()),
                ("start", window.start.to_string()),
                ("end", window.end.to_string()),
            ])
            .send()
            .await?;

        let history: HistoryResponse = decode(response).await?;
        Ok(history.data)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let config = Config {
            base_url: "http://example.com/api/".to_string(),
            ..Config::default()
        };
        let source = HttpSource::new(&config).unwrap();
        assert_eq!(
            source.url("temperature/current"),
            "http://example.com/api/temperature/current"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_yml::from_str("base_url: http://sensor:8080/api").unwrap();
        assert_eq!(config.base_url, "http://sensor:8080/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_status_error_kind() {
        let err = Error::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Database unavailable".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(
            err.to_string(),
            "Transport error: HTTP 500 Internal Server Error: Database unavailable"
        );
    }

    #[test]
    fn test_decode_error_kind() {
        let d = &mut serde_json::Deserializer::from_str(r#"{"data": [{"timestamp": "x"}]}"#);
        let err: Error = serde_path_to_error::deserialize::<_, HistoryResponse>(d)
            .map(|_| ())
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("data[0].timestamp"));
    }
}
