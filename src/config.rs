//! Dashboard configuration
//!
//! Configuration is an explicit value passed to everything that needs it. It
//! is read from `GUILDBOARD_*` environment variables and then overridden by
//! command-line flags (see `cli`).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::cache::is_slot_char;
use crate::storage::MAX_SLOT_AGE_SECS;

/// Default TTL for the stats slot (1 minute)
pub const DEFAULT_TTL_MS: u64 = 60_000;

/// Default TTL for the status slot (15 seconds)
pub const DEFAULT_STATUS_TTL_MS: u64 = 15_000;

/// Default lifetime of a slot inside its storage medium (1 hour)
pub const DEFAULT_SLOT_MAX_AGE_SECS: u64 = 3_600;

/// Default timeout for backend requests
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Errors that can occur while building a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable or flag has a value that cannot be parsed
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    /// A TTL or timeout was zero
    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    /// A value is above the largest one the cache can honour
    #[error("{name} must be at most {max}")]
    TooLarge { name: &'static str, max: u64 },

    /// The API URL is not an http(s) URL
    #[error("API URL must start with http:// or https://, got '{0}'")]
    InvalidApiUrl(String),

    /// The slot key prefix contains characters unusable in cookie or file names
    #[error("slot key prefix '{0}' may only contain ASCII letters, digits, '_', '-' and '.'")]
    InvalidSlotPrefix(String),
}

/// Where cache slots are kept by the web server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Client-held cookies, one per slot
    #[default]
    Cookie,
    /// Server-side memory shared by all clients
    Memory,
}

impl FromStr for StorageMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cookie" | "cookies" => Ok(StorageMode::Cookie),
            "memory" | "mem" => Ok(StorageMode::Memory),
            _ => Err(ConfigError::InvalidValue {
                name: "GUILDBOARD_STORAGE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Settings for the cache, backend client and web server
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Base URL of the bot backend service
    pub api_url: String,
    /// Prepended to every slot name to form the storage key
    pub slot_key_prefix: String,
    /// TTL for slots that do not set their own (used for stats)
    pub default_ttl_ms: u64,
    /// TTL for the status slot
    pub status_ttl_ms: u64,
    /// Expiry hint given to the storage medium on every write
    pub slot_max_age_secs: u64,
    /// Timeout applied to each backend request
    pub request_timeout_ms: u64,
    /// Serve the previous value instead of the fallback when a refresh fails
    pub serve_stale_on_error: bool,
    /// Storage medium used by the web server
    pub storage: StorageMode,
    /// Address the web server listens on
    pub bind_addr: SocketAddr,
    /// Directory for one-shot query slots (XDG cache dir when unset)
    pub cache_dir: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_string(),
            slot_key_prefix: "gb_".to_string(),
            default_ttl_ms: DEFAULT_TTL_MS,
            status_ttl_ms: DEFAULT_STATUS_TTL_MS,
            slot_max_age_secs: DEFAULT_SLOT_MAX_AGE_SECS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            serve_stale_on_error: false,
            storage: StorageMode::Cookie,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cache_dir: None,
        }
    }
}

impl DashboardConfig {
    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, starting from the defaults
    ///
    /// Unset variables keep their default; set but unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("GUILDBOARD_API_URL") {
            config.api_url = url;
        }
        if let Some(prefix) = lookup("GUILDBOARD_SLOT_PREFIX") {
            config.slot_key_prefix = prefix;
        }
        if let Some(ttl) = parse_var(&lookup, "GUILDBOARD_TTL_MS")? {
            config.default_ttl_ms = ttl;
        }
        if let Some(ttl) = parse_var(&lookup, "GUILDBOARD_STATUS_TTL_MS")? {
            config.status_ttl_ms = ttl;
        }
        if let Some(age) = parse_var(&lookup, "GUILDBOARD_SLOT_MAX_AGE_SECS")? {
            config.slot_max_age_secs = age;
        }
        if let Some(timeout) = parse_var(&lookup, "GUILDBOARD_REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = timeout;
        }
        if let Some(stale) = lookup("GUILDBOARD_SERVE_STALE") {
            config.serve_stale_on_error = parse_bool("GUILDBOARD_SERVE_STALE", &stale)?;
        }
        if let Some(storage) = lookup("GUILDBOARD_STORAGE") {
            config.storage = storage.parse()?;
        }
        if let Some(addr) = parse_var(&lookup, "GUILDBOARD_BIND")? {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("GUILDBOARD_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that parsing alone cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }
        if !self.slot_key_prefix.chars().all(is_slot_char) {
            return Err(ConfigError::InvalidSlotPrefix(self.slot_key_prefix.clone()));
        }
        if self.default_ttl_ms == 0 {
            return Err(ConfigError::NonPositive("default TTL"));
        }
        if self.status_ttl_ms == 0 {
            return Err(ConfigError::NonPositive("status TTL"));
        }
        if self.slot_max_age_secs == 0 {
            return Err(ConfigError::NonPositive("slot max age"));
        }
        if self.slot_max_age_secs > MAX_SLOT_AGE_SECS {
            return Err(ConfigError::TooLarge {
                name: "slot max age",
                max: MAX_SLOT_AGE_SECS,
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::NonPositive("request timeout"));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
