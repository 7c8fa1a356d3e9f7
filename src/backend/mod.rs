//! Bot backend data models and HTTP client
//!
//! The backend service reports bot-wide statistics and a health status. Both
//! responses are proxied to the dashboard through the TTL cache.

mod client;

pub use client::{BackendClient, BackendError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bot-wide counters shown on the dashboard landing page
///
/// Missing counters deserialize as zero, and the all-zero record is what the
/// dashboard shows when the backend cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStats {
    /// Number of guilds the bot is in
    #[serde(default)]
    pub guilds: u64,
    /// Number of users across those guilds
    #[serde(default)]
    pub users: u64,
    /// Number of channels across those guilds
    #[serde(default)]
    pub channels: u64,
    /// Number of registered commands
    #[serde(default)]
    pub commands: u64,
}

impl BotStats {
    /// The zeroed record served when stats are unavailable
    pub fn zeroed() -> Self {
        Self::default()
    }
}

/// Backend health as reported by `GET /status`
///
/// Only `status` is interpreted; any other fields are passed through to the
/// dashboard unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Status string, `"ok"` when healthy
    pub status: String,
    /// Any additional fields reported by the backend
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ServiceStatus {
    /// Creates a status with no extra details
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            details: Map::new(),
        }
    }

    /// The status served when the backend cannot be reached
    pub fn offline() -> Self {
        Self::new("offline")
    }

    /// Whether the backend reported itself healthy
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bot_stats_missing_fields_default_to_zero() {
        let stats: BotStats = serde_json::from_value(json!({"guilds": 12})).unwrap();
        assert_eq!(
            stats,
            BotStats {
                guilds: 12,
                ..BotStats::zeroed()
            }
        );
    }

    #[test]
    fn test_bot_stats_zeroed_serializes_every_counter() {
        let value = serde_json::to_value(BotStats::zeroed()).unwrap();
        assert_eq!(
            value,
            json!({"guilds": 0, "users": 0, "channels": 0, "commands": 0})
        );
    }

    #[test]
    fn test_service_status_keeps_extra_fields() {
        let raw = json!({"status": "ok", "uptime": 3600, "shards": [0, 1]});
        let status: ServiceStatus = serde_json::from_value(raw.clone()).unwrap();

        assert!(status.is_ok());
        assert_eq!(status.details.get("uptime"), Some(&json!(3600)));
        assert_eq!(serde_json::to_value(&status).unwrap(), raw);
    }

    #[test]
    fn test_service_status_requires_status_field() {
        assert!(serde_json::from_value::<ServiceStatus>(json!({"uptime": 1})).is_err());
    }

    #[test]
    fn test_offline_status() {
        let status = ServiceStatus::offline();
        assert!(!status.is_ok());
        assert_eq!(serde_json::to_value(&status).unwrap(), json!({"status": "offline"}));
    }
}
