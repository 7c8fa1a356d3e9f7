//! Cached dashboard queries
//!
//! `Dashboard` owns everything shared across requests (configuration, backend
//! client, in-flight refresh map) and answers the dashboard's cached queries
//! against whatever storage medium the caller supplies.

use std::sync::Arc;

use crate::backend::{BackendClient, BackendError, BotStats, ServiceStatus};
use crate::cache::{SingleFlight, SlotKey, TtlCacheStore};
use crate::config::DashboardConfig;
use crate::storage::SlotStorage;

/// Shared state behind the cached stats and status queries
#[derive(Debug, Clone)]
pub struct Dashboard {
    config: Arc<DashboardConfig>,
    backend: BackendClient,
    in_flight: Arc<SingleFlight>,
    stats_slot: SlotKey,
    status_slot: SlotKey,
}

impl Dashboard {
    /// Creates a dashboard talking to `config.api_url`
    pub fn new(config: DashboardConfig) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Creates a dashboard with a custom backend client
    pub fn with_backend(config: DashboardConfig, backend: BackendClient) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            in_flight: Arc::new(SingleFlight::new()),
            stats_slot: SlotKey::from_static("stats"),
            status_slot: SlotKey::from_static("status"),
        }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Builds a cache store over `storage` sharing this dashboard's in-flight map
    pub fn store<S: SlotStorage>(&self, storage: S) -> TtlCacheStore<S> {
        TtlCacheStore::new(storage, &self.config).with_single_flight(Arc::clone(&self.in_flight))
    }

    /// Bot statistics, cached for `default_ttl_ms`; zeroed when unavailable
    pub async fn stats<S: SlotStorage>(&self, storage: S) -> BotStats {
        let backend = self.backend.clone();
        self.store(storage)
            .get_or_refresh_default(
                &self.stats_slot,
                move || async move { backend.fetch_stats().await },
                BotStats::zeroed(),
            )
            .await
    }

    /// Backend status, cached for `status_ttl_ms`; `offline` when unavailable
    pub async fn status<S: SlotStorage>(&self, storage: S) -> ServiceStatus {
        let backend = self.backend.clone();
        self.store(storage)
            .get_or_refresh(
                &self.status_slot,
                self.config.status_ttl_ms,
                move || async move { backend.fetch_status().await },
                ServiceStatus::offline(),
            )
            .await
    }
}
