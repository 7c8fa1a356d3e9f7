//! Storage media for cache slots
//!
//! A storage medium is opaque key/value storage with a caller-supplied expiry
//! hint. The cache store never relies on the medium to enforce its TTL; the
//! expiry hint only bounds how long a slot can linger in the medium.

mod cookie;
mod file;
mod memory;

pub use cookie::{CookieJar, MAX_COOKIE_BYTES};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;
use thiserror::Error;

/// Longest expiry hint a medium honours (ten years)
pub const MAX_SLOT_AGE_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Errors that can occur when writing a slot
#[derive(Debug, Error)]
pub enum StorageError {
    /// The value does not fit in the medium
    #[error("value for '{key}' is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    /// The expiry cannot be represented by the medium's clock
    #[error("expiry of {max_age_secs}s for '{key}' is out of range")]
    ExpiryOutOfRange { key: String, max_age_secs: u64 },

    /// Reading or writing the backing file failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The medium's own wrapper could not be serialized
    #[error("failed to serialize stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key/value storage holding one string per slot
pub trait SlotStorage: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent or expired
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value
    ///
    /// `max_age_secs` is the medium's own expiry for the value.
    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError>;
}

impl<S: SlotStorage + ?Sized> SlotStorage for &S {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError> {
        (**self).set(key, value, max_age_secs)
    }
}

impl<S: SlotStorage + ?Sized> SlotStorage for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError> {
        (**self).set(key, value, max_age_secs)
    }
}

impl<S: SlotStorage + ?Sized> SlotStorage for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError> {
        (**self).set(key, value, max_age_secs)
    }
}
