//! HTTP client for the bot backend service
//!
//! This module fetches bot statistics and service status from the backend's
//! REST API. It performs no caching or retries of its own; every call is one
//! request bounded by the configured timeout.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use super::{BotStats, ServiceStatus};
use crate::config::DashboardConfig;

/// Errors that can occur when calling the backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed, timed out, or returned an undecodable body
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status} for {url}")]
    Status { url: String, status: StatusCode },
}

/// Client for the bot backend's REST API
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    api_url: String,
}

impl BackendClient {
    /// Creates a client for `config.api_url` with the configured request timeout
    pub fn new(config: &DashboardConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Creates a client with a custom HTTP client
    pub fn with_client(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Fetches bot statistics from `GET {api_url}/stats`
    pub async fn fetch_stats(&self) -> Result<BotStats, BackendError> {
        self.get_json("stats").await
    }

    /// Fetches the backend's health from `GET {api_url}/status`
    pub async fn fetch_status(&self) -> Result<ServiceStatus, BackendError> {
        self.get_json("status").await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "Calling backend");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { url, status });
        }

        Ok(response.json::<T>().await?)
    }
}
