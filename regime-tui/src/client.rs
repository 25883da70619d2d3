//! HTTP client for the quant backend
//!
//! Two endpoints: a GET serving the indicator series and a POST that asks
//! the backend to recompute it. Endpoint addresses are configuration, not
//! behavior.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Backend endpoint configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// GET endpoint serving the indicator series
    pub data_url: String,
    /// POST endpoint triggering backend recomputation
    pub refresh_url: String,
    /// Advisory wait between an accepted refresh and its follow-up fetch.
    /// The backend exposes no completion signal; if recomputation is still
    /// running, the re-fetch simply returns the previous data.
    pub refresh_delay: Duration,
    /// Socket timeout applied to both endpoints
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            data_url: "http://127.0.0.1:5000/api/data".to_string(),
            refresh_url: "http://127.0.0.1:5000/api/refresh".to_string(),
            refresh_delay: Duration::from_secs(4),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Create a configuration with custom endpoints
    pub fn new(data_url: impl Into<String>, refresh_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
            refresh_url: refresh_url.into(),
            ..Default::default()
        }
    }

    /// Set the advisory re-fetch delay
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Set the socket timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read configuration from `REGIME_DATA_URL`, `REGIME_REFRESH_URL` and
    /// `REGIME_REFRESH_DELAY_SECS`, falling back to the defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let refresh_delay = std::env::var("REGIME_REFRESH_DELAY_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_delay);

        Self {
            data_url: std::env::var("REGIME_DATA_URL").unwrap_or(defaults.data_url),
            refresh_url: std::env::var("REGIME_REFRESH_URL").unwrap_or(defaults.refresh_url),
            refresh_delay,
            request_timeout: defaults.request_timeout,
        }
    }
}

/// Errors from the backend endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error status: {0}")]
    Status(StatusCode),

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

/// The backend API surface.
///
/// A trait so the sync controller can be exercised against a scripted
/// backend in tests, with the live implementation swapped in by the binary.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Fetch the full indicator series as raw JSON.
    async fn fetch_series(&self) -> Result<Value, ApiError>;

    /// Ask the backend to recompute. Any 2xx status is an acknowledgement;
    /// the body is ignored.
    async fn trigger_refresh(&self) -> Result<(), ApiError>;
}

/// reqwest-backed implementation of [`MarketApi`]
#[derive(Debug, Clone)]
pub struct HttpMarketApi {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpMarketApi {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl MarketApi for HttpMarketApi {
    async fn fetch_series(&self) -> Result<Value, ApiError> {
        debug!("fetching series from {}", self.config.data_url);
        let response = self
            .client
            .get(&self.config.data_url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn trigger_refresh(&self) -> Result<(), ApiError> {
        debug!("triggering refresh at {}", self.config.refresh_url);
        let response = self
            .client
            .post(&self.config.refresh_url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Status(response.status()))
        }
    }
}
