//! Cache store serving stored envelopes or refreshing them through a fetcher
//!
//! Provides a `TtlCacheStore` that keeps one `{data, timestamp}` envelope per
//! slot in a `SlotStorage` medium. Fresh envelopes are returned without any
//! upstream call; stale, missing or malformed ones trigger exactly one fetch.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::envelope::CacheEnvelope;
use super::single_flight::{FetchError, SingleFlight};
use super::slot::SlotKey;
use crate::config::DashboardConfig;
use crate::storage::SlotStorage;

/// TTL cache over a storage medium
///
/// The store itself holds no cached data. Everything lives in `storage`, which
/// for the cookie medium is owned by the client and rebuilt on every request.
/// Building a store is cheap, so handlers create one per request.
///
/// A fetch failure is logged and answered with the caller's fallback; the
/// stored envelope and its timestamp are left untouched so the next request
/// retries the fetch.
#[derive(Debug)]
pub struct TtlCacheStore<S, C = SystemClock> {
    storage: S,
    clock: C,
    key_prefix: String,
    default_ttl_ms: u64,
    slot_max_age_secs: u64,
    serve_stale_on_error: bool,
    in_flight: Option<Arc<SingleFlight>>,
}

impl<S: SlotStorage> TtlCacheStore<S, SystemClock> {
    /// Creates a store over `storage` using the prefix, TTL and medium expiry
    /// from `config`
    pub fn new(storage: S, config: &DashboardConfig) -> Self {
        Self {
            storage,
            clock: SystemClock,
            key_prefix: config.slot_key_prefix.clone(),
            default_ttl_ms: config.default_ttl_ms,
            slot_max_age_secs: config.slot_max_age_secs,
            serve_stale_on_error: config.serve_stale_on_error,
            in_flight: None,
        }
    }
}

impl<S: SlotStorage, C: Clock> TtlCacheStore<S, C> {
    /// Replaces the time source
    pub fn with_clock<C2: Clock>(self, clock: C2) -> TtlCacheStore<S, C2> {
        TtlCacheStore {
            storage: self.storage,
            clock,
            key_prefix: self.key_prefix,
            default_ttl_ms: self.default_ttl_ms,
            slot_max_age_secs: self.slot_max_age_secs,
            serve_stale_on_error: self.serve_stale_on_error,
            in_flight: self.in_flight,
        }
    }

    /// Coalesces concurrent refreshes of the same slot through `flights`
    pub fn with_single_flight(mut self, flights: Arc<SingleFlight>) -> Self {
        self.in_flight = Some(flights);
        self
    }

    /// Serves the stale envelope's data instead of the fallback when a refresh
    /// fails and a stale envelope exists
    pub fn with_stale_on_error(mut self, enabled: bool) -> Self {
        self.serve_stale_on_error = enabled;
        self
    }

    /// Returns the underlying storage medium
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Physical storage key for a slot (prefix + slot name)
    pub fn storage_key(&self, slot: &SlotKey) -> String {
        format!("{}{}", self.key_prefix, slot)
    }

    /// Reads the raw envelope stored for `slot`, if any
    ///
    /// Returns `None` when the slot is empty or holds something that is not an
    /// envelope.
    pub fn read_envelope(&self, slot: &SlotKey) -> Option<CacheEnvelope> {
        self.read_key(&self.storage_key(slot))
    }

    fn read_key(&self, key: &str) -> Option<CacheEnvelope> {
        let raw = self.storage.get(key)?;
        let envelope = CacheEnvelope::parse(&raw);
        if envelope.is_none() {
            tracing::debug!(key, "Stored value is not a cache envelope");
        }
        envelope
    }

    /// `get_or_refresh` with the store's default TTL
    pub async fn get_or_refresh_default<T, F, Fut, E>(
        &self,
        slot: &SlotKey,
        fetcher: F,
        fallback: T,
    ) -> T
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.get_or_refresh(slot, self.default_ttl_ms, fetcher, fallback)
            .await
    }

    /// Returns the cached value for `slot` if it is younger than `ttl_ms`,
    /// otherwise calls `fetcher` once and stores its result
    ///
    /// # Arguments
    /// * `slot` - The slot to read and refresh
    /// * `ttl_ms` - Maximum age in milliseconds for the stored value to be served
    /// * `fetcher` - Produces fresh data; invoked at most once, never retried
    /// * `fallback` - Returned when `fetcher` fails
    ///
    /// # Behavior
    /// - Fresh envelope: returned without calling `fetcher`
    /// - Missing, malformed or stale envelope: `fetcher` is called
    /// - Fetch success: a new envelope stamped with the write time is stored,
    ///   and the fresh value is returned even if storing it fails
    /// - Fetch failure: nothing is written; `fallback` is returned
    /// - With a shared `SingleFlight`, a caller that joins a refresh already
    ///   running for the same storage key never calls its own `fetcher`
    #[tracing::instrument(skip_all, fields(slot = %slot, ttl_ms = ttl_ms))]
    pub async fn get_or_refresh<T, F, Fut, E>(
        &self,
        slot: &SlotKey,
        ttl_ms: u64,
        fetcher: F,
        fallback: T,
    ) -> T
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let key = self.storage_key(slot);
        let now = self.clock.now_ms();

        let stale = match self.read_key(&key) {
            Some(envelope) if envelope.is_fresh(now, ttl_ms) => {
                let age_ms = envelope.age_ms(now);
                match serde_json::from_value::<T>(envelope.data) {
                    Ok(data) => {
                        tracing::debug!(age_ms, "Cache hit");
                        return data;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Cached data has an unexpected shape");
                        None
                    }
                }
            }
            Some(envelope) => {
                tracing::debug!(age_ms = envelope.age_ms(now), "Cache entry stale");
                Some(envelope)
            }
            None => {
                tracing::debug!("Cache miss");
                None
            }
        };

        let start = move || {
            let pending = fetcher();
            async move {
                let value = pending
                    .await
                    .map_err(|e| FetchError::Upstream(e.to_string()))?;
                serde_json::to_value(value).map_err(|e| FetchError::Serialize(e.to_string()))
            }
        };

        let result = match &self.in_flight {
            Some(flights) => flights.run(&key, start).await,
            None => start().await,
        };

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Refresh failed");
                return self.degrade(stale, fallback);
            }
        };

        let fresh = match serde_json::from_value::<T>(data.clone()) {
            Ok(fresh) => fresh,
            Err(e) => {
                // Only reachable when callers sharing a slot disagree on its type
                tracing::warn!(error = %e, "Refreshed data does not match the requested type");
                return self.degrade(stale, fallback);
            }
        };

        self.persist(&key, data);
        fresh
    }

    /// Picks the value to serve after a failed refresh
    fn degrade<T: DeserializeOwned>(&self, stale: Option<CacheEnvelope>, fallback: T) -> T {
        if self.serve_stale_on_error {
            if let Some(envelope) = stale {
                if let Ok(data) = serde_json::from_value::<T>(envelope.data) {
                    tracing::info!("Serving stale data after failed refresh");
                    return data;
                }
            }
        }
        fallback
    }

    /// Writes a new envelope stamped with the current time
    ///
    /// Failures are logged and swallowed.
    fn persist(&self, key: &str, data: Value) {
        let envelope = CacheEnvelope::new(data, self.clock.now_ms());
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache envelope");
                return;
            }
        };

        match self.storage.set(key, &raw, self.slot_max_age_secs) {
            Ok(()) => tracing::debug!(key, timestamp = envelope.timestamp, "Stored refreshed slot"),
            Err(e) => tracing::warn!(key, error = %e, "Failed to store refreshed slot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::storage::{CookieJar, MemoryStorage};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: u64 = 15_000;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Status {
        status: String,
    }

    fn status(s: &str) -> Status {
        Status {
            status: s.to_string(),
        }
    }

    fn create_test_store() -> (TtlCacheStore<MemoryStorage, ManualClock>, ManualClock) {
        let clock = ManualClock::at(0);
        let config = DashboardConfig::default();
        let store = TtlCacheStore::new(MemoryStorage::new(), &config).with_clock(clock.clone());
        (store, clock)
    }

    fn slot() -> SlotKey {
        SlotKey::new("status").unwrap()
    }

    /// Fetcher that counts its invocations and returns `value`
    fn ok_fetcher(
        calls: &Arc<AtomicUsize>,
        value: Status,
    ) -> impl FnOnce() -> futures::future::Ready<Result<Status, String>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(value))
        }
    }

    fn failing_fetcher(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> futures::future::Ready<Result<Status, String>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Err("backend unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores_envelope() {
        let (store, _clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("down"))
            .await;

        assert_eq!(result, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let envelope = store.read_envelope(&slot()).expect("envelope should be stored");
        assert_eq!(envelope, CacheEnvelope::new(json!({"status": "ok"}), 0));
    }

    #[tokio::test]
    async fn test_scenario_hit_within_ttl_then_refetch_after() {
        let (store, clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("down"))
            .await;

        clock.set(10_000);
        let hit = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("new")), status("down"))
            .await;
        assert_eq!(hit, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "hit must not call the fetcher");

        clock.set(16_000);
        let refreshed = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("new")), status("down"))
            .await;
        assert_eq!(refreshed, status("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.read_envelope(&slot()).unwrap().timestamp, 16_000);
    }

    #[tokio::test]
    async fn test_one_past_ttl_fetches_exactly_once_more() {
        let (store, clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        clock.set(5_000);
        store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("down"))
            .await;

        clock.set(5_000 + TTL as i64 + 1);
        store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("down"))
            .await;
        store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("down"))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_hits_return_identical_data() {
        let (store, clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let written = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("down"))
            .await;
        let raw_before = store.storage().get("gb_status").unwrap();

        for t in [1, 500, 14_999] {
            clock.set(t);
            let hit = store
                .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("other")), status("down"))
                .await;
            assert_eq!(serde_json::to_string(&hit).unwrap(), serde_json::to_string(&written).unwrap());
        }

        assert_eq!(store.storage().get("gb_status").unwrap(), raw_before);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_without_cache_returns_fallback_and_writes_nothing() {
        let (store, _clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = store
            .get_or_refresh(&slot(), TTL, failing_fetcher(&calls), status("offline"))
            .await;

        assert_eq!(result, status("offline"));
        assert!(store.read_envelope(&slot()).is_none());
        assert!(store.storage().is_empty());

        // Still a miss: the next call fetches again
        let result = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("offline"))
            .await;
        assert_eq!(result, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_with_stale_entry_keeps_timestamp() {
        let (store, clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));

        clock.set(1_000);
        store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("offline"))
            .await;

        clock.set(50_000);
        let result = store
            .get_or_refresh(&slot(), TTL, failing_fetcher(&calls), status("offline"))
            .await;

        assert_eq!(result, status("offline"));
        let envelope = store.read_envelope(&slot()).unwrap();
        assert_eq!(envelope.timestamp, 1_000);
        assert_eq!(envelope.data, json!({"status": "ok"}));

        // The failed attempt did not reset the clock: next request retries
        clock.set(50_001);
        store
            .get_or_refresh(&slot(), TTL, failing_fetcher(&calls), status("offline"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stale_on_error_serves_previous_data() {
        let (store, clock) = create_test_store();
        let store = store.with_stale_on_error(true);
        let calls = Arc::new(AtomicUsize::new(0));

        store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("offline"))
            .await;
        clock.set(20_000);

        let result = store
            .get_or_refresh(&slot(), TTL, failing_fetcher(&calls), status("offline"))
            .await;
        assert_eq!(result, status("ok"));
        assert_eq!(store.read_envelope(&slot()).unwrap().timestamp, 0);
    }

    #[tokio::test]
    async fn test_malformed_value_is_replaced() {
        let (store, clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));
        store
            .storage()
            .set("gb_status", "definitely not json", 3600)
            .unwrap();
        clock.set(2_000);

        let result = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("offline"))
            .await;

        assert_eq!(result, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.read_envelope(&slot()),
            Some(CacheEnvelope::new(json!({"status": "ok"}), 2_000))
        );
    }

    #[tokio::test]
    async fn test_fresh_envelope_with_wrong_shape_is_a_miss() {
        let (store, _clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let foreign = serde_json::to_string(&CacheEnvelope::new(json!([1, 2, 3]), 0)).unwrap();
        store.storage().set("gb_status", &foreign, 3600).unwrap();

        let result = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("offline"))
            .await;

        assert_eq!(result, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_future_timestamp_forces_refresh() {
        let (store, _clock) = create_test_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let tampered =
            serde_json::to_string(&CacheEnvelope::new(json!({"status": "forged"}), i64::MAX)).unwrap();
        store.storage().set("gb_status", &tampered, 3600).unwrap();

        let result = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, status("ok")), status("offline"))
            .await;

        assert_eq!(result, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_write_failure_still_returns_fresh_data() {
        let clock = ManualClock::at(0);
        let jar = CookieJar::new();
        let store = TtlCacheStore::new(&jar, &DashboardConfig::default()).with_clock(clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let huge = status(&"x".repeat(8_000));

        let result = store
            .get_or_refresh(&slot(), TTL, ok_fetcher(&calls, huge.clone()), status("offline"))
            .await;

        assert_eq!(result, huge);
        assert!(store.read_envelope(&slot()).is_none());
        assert!(jar.set_cookie_headers().is_empty());
    }

    #[tokio::test]
    async fn test_default_ttl_comes_from_config() {
        let clock = ManualClock::at(0);
        let config = DashboardConfig {
            default_ttl_ms: 1_000,
            ..DashboardConfig::default()
        };
        let store = TtlCacheStore::new(MemoryStorage::new(), &config).with_clock(clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        store
            .get_or_refresh_default(&slot(), ok_fetcher(&calls, status("ok")), status("offline"))
            .await;
        clock.set(999);
        store
            .get_or_refresh_default(&slot(), ok_fetcher(&calls, status("ok")), status("offline"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.set(1_000);
        store
            .get_or_refresh_default(&slot(), ok_fetcher(&calls, status("ok")), status("offline"))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_flight_coalesces_concurrent_refreshes() {
        let flights = Arc::new(SingleFlight::new());
        let storage = Arc::new(MemoryStorage::new());
        let config = DashboardConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = futures::FutureExt::shared(gate);

        let make_store = || {
            TtlCacheStore::new(Arc::clone(&storage), &config)
                .with_single_flight(Arc::clone(&flights))
        };
        let (store_a, store_b) = (make_store(), make_store());

        let fetcher = || {
            let calls = Arc::clone(&calls);
            let gate = gate.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let _ = gate.await;
                    Ok::<_, String>(status("ok"))
                }
            }
        };

        let key = slot();
        let (a, b, _) = tokio::join!(
            store_a.get_or_refresh(&key, TTL, fetcher(), status("offline")),
            store_b.get_or_refresh(&key, TTL, fetcher(), status("offline")),
            async {
                tokio::task::yield_now().await;
                let _ = release.send(());
            }
        );

        assert_eq!(a, status("ok"));
        assert_eq!(b, status("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }
}
