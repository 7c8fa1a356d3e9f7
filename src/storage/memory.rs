//! Server-side slot storage

use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{SlotStorage, StorageError, MAX_SLOT_AGE_SECS};

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process slot storage shared by all requests
///
/// Unlike the cookie medium, values never leave the server, so clients can
/// neither read nor tamper with them. Expired entries read as absent and are
/// removed lazily on access or by `purge_expired`.
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStorage {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Purged expired slots");
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SlotStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // Re-checked under the write lock so a concurrent `set` is never dropped
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError> {
        let max_age = Duration::from_secs(max_age_secs.min(MAX_SLOT_AGE_SECS));
        let expires_at = Instant::now().checked_add(max_age).ok_or_else(|| {
            StorageError::ExpiryOutOfRange {
                key: key.to_string(),
                max_age_secs,
            }
        })?;
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.entries.len())
            .finish()
    }
}
