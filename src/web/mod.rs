//! HTTP front end for the dashboard
//!
//! Exposes the cached backend queries as JSON routes. Every cached route
//! answers `200 OK`; when the backend is down the body is the fallback value.

mod handlers;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::backend::BackendError;
use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::storage::MemoryStorage;

/// Errors that stop the web server
#[derive(Debug, Error)]
pub enum WebError {
    /// The listening socket could not be opened
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server loop exited with an error
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The backend client could not be built
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// State shared by every request
#[derive(Debug)]
pub struct AppState {
    /// Cached queries and their configuration
    pub dashboard: Dashboard,
    /// Slot storage used when `storage = memory`
    pub memory: Arc<MemoryStorage>,
}

impl AppState {
    /// Creates request state around `dashboard`
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            memory: Arc::new(MemoryStorage::new()),
        }
    }
}

/// Builds the dashboard's routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/stats", get(handlers::stats))
        .route("/api/status", get(handlers::status))
        .with_state(state)
}

/// Serves the dashboard on `config.bind_addr` until the process is stopped
pub async fn serve(config: DashboardConfig) -> Result<(), WebError> {
    let addr = config.bind_addr;
    let storage = config.storage;
    let state = Arc::new(AppState::new(Dashboard::new(config)?));

    if matches!(storage, crate::config::StorageMode::Memory) {
        spawn_purge_task(Arc::clone(&state.memory));
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| WebError::Bind { addr, source })?;

    tracing::info!(%addr, storage = ?storage, "Dashboard listening");

    axum::serve(listener, router(state))
        .await
        .map_err(WebError::Serve)
}

/// Periodically drops expired server-side slots
fn spawn_purge_task(memory: Arc<MemoryStorage>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        // Skip the first tick (immediate)
        interval.tick().await;
        loop {
            interval.tick().await;
            memory.purge_expired();
        }
    });
}
