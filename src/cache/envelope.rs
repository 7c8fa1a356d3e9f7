//! Stored wrapper pairing cached data with its write time

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cached data as it is persisted to a storage slot
///
/// `timestamp` is the time the envelope was written, in Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    /// The cached JSON value
    pub data: Value,
    /// When the data was written (Unix ms)
    pub timestamp: i64,
}

impl CacheEnvelope {
    /// Wraps `data` with its write time
    pub fn new(data: Value, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    /// Parses a stored envelope, returning `None` for anything malformed
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Age of the envelope at `now_ms`; negative if written in the future
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }

    /// Whether the envelope is still fresh at `now_ms` for the given TTL
    ///
    /// An envelope stamped in the future is never fresh: a client-held slot can
    /// be tampered with, and the clocks of two servers can disagree.
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: u64) -> bool {
        let age = self.age_ms(now_ms);
        age >= 0 && (age as u64) < ttl_ms
    }
}
