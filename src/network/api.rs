//! # Tracker API Client
//!
//! POSTs telemetry records to the tracking server.
//!
//! Request: `POST <url>` with a JSON body, `Content-Type: application/json`
//! and the shared secret in an `authorization-key` header. Only the status
//! code of the response is used; the body is ignored.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::telemetry::types::TrackerData;

/// TCP/TLS connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the full request/response exchange
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the shared secret
pub const AUTHORIZATION_HEADER: &str = "authorization-key";

/// Trait for sending telemetry to the server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Send one record and return the HTTP status code
    async fn send_data(&self, data: &TrackerData) -> Result<u16>;
}

/// HTTP implementation of [`TrackerApi`]
#[derive(Debug, Clone)]
pub struct TrackerApiService {
    client: Client,
    url: String,
    authorization_key: String,
}

impl TrackerApiService {
    /// Create a client for `url`
    ///
    /// # Errors
    ///
    /// Returns `Http` if the HTTP client cannot be initialized (e.g. TLS backend failure).
    pub fn new(url: impl Into<String>, authorization_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            authorization_key: authorization_key.into(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::new(config.url.clone(), config.authorization_key.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TrackerApi for TrackerApiService {
    async fn send_data(&self, data: &TrackerData) -> Result<u16> {
        let body = serde_json::to_vec(data)?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION_HEADER, &self.authorization_key)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!("POST {} -> {}", self.url, status);
        Ok(status)
    }
}
