//! On-disk slot storage
//!
//! Stores each slot as a JSON file in an XDG-compliant cache directory so that
//! one-shot command-line queries share a cache across invocations.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{SlotStorage, StorageError, MAX_SLOT_AGE_SECS};

/// Wrapper written to disk around a slot's value
#[derive(Debug, Serialize, Deserialize)]
struct StoredSlot {
    /// The stored value
    value: String,
    /// When the medium stops returning the value
    expires_at: DateTime<Utc>,
}

/// Manages reading and writing slots to disk
///
/// Files live in `~/.cache/guildboard/` on Linux (or the platform equivalent),
/// one `<key>.json` per slot. Writes go to a temporary file first and are then
/// renamed into place, so readers never see a partially-written slot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory where slot files are stored
    cache_dir: PathBuf,
}

impl FileStorage {
    /// Creates a FileStorage using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "guildboard")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a FileStorage with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the directory slot files are written to
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the file for the given key
    fn slot_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }
}

impl SlotStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let content = fs::read_to_string(self.slot_path(key)).ok()?;
        let stored: StoredSlot = serde_json::from_str(&content).ok()?;
        if Utc::now() >= stored.expires_at {
            return None;
        }
        Some(stored.value)
    }

    fn set(&self, key: &str, value: &str, max_age_secs: u64) -> Result<(), StorageError> {
        fs::create_dir_all(&self.cache_dir)?;

        let max_age = max_age_secs.min(MAX_SLOT_AGE_SECS) as i64;
        let stored = StoredSlot {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::seconds(max_age),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        let path = self.slot_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
