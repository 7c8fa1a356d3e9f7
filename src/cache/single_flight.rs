//! Per-slot coalescing of concurrent refreshes
//!
//! When several requests find the same slot stale at once, only the first one
//! starts an upstream fetch; the others await that fetch's shared result.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors from a refresh attempt
///
/// This is `Clone` so that one failed fetch can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The fetcher itself failed
    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    /// The fetched value could not be converted to JSON
    #[error("fetched value is not JSON-serializable: {0}")]
    Serialize(String),
}

type SharedFetch = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

/// Map from storage key to the refresh currently running for it
#[derive(Default)]
pub struct SingleFlight {
    flights: Mutex<HashMap<String, SharedFetch>>,
}

impl SingleFlight {
    /// Creates an empty coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the fetch built by `start` for `key`, unless a fetch for `key`
    /// is already in flight
    ///
    /// If one is, `start` is never called and the caller gets the in-flight
    /// fetch's result. The marker is cleared by whichever caller observes
    /// completion first.
    pub async fn run<M, Fut>(&self, key: &str, start: M) -> Result<Value, FetchError>
    where
        M: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let shared = {
            let mut flights = self.lock();
            match flights.get(key) {
                Some(existing) => {
                    tracing::debug!(key, "Joining in-flight refresh");
                    existing.clone()
                }
                None => {
                    let shared = start().boxed().shared();
                    flights.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;

        let mut flights = self.lock();
        if flights
            .get(key)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            flights.remove(key);
        }

        result
    }

    /// Number of refreshes currently in flight
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
