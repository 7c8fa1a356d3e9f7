//! Command-line interface parsing for guildboard
//!
//! This module handles parsing of CLI arguments using clap and layering them
//! over the environment-derived `DashboardConfig`.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{ConfigError, DashboardConfig, StorageMode};

/// guildboard - Discord bot dashboard server with cached backend stats
#[derive(Parser, Debug)]
#[command(name = "guildboard")]
#[command(about = "Discord bot dashboard server with cached backend stats")]
#[command(version)]
pub struct Cli {
    /// Base URL of the bot backend (overrides GUILDBOARD_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// TTL in milliseconds for cached stats (overrides GUILDBOARD_TTL_MS)
    #[arg(long, global = true, value_name = "MS")]
    pub ttl_ms: Option<u64>,

    /// Prefix for cache slot names (overrides GUILDBOARD_SLOT_PREFIX)
    #[arg(long, global = true, value_name = "PREFIX")]
    pub slot_prefix: Option<String>,

    /// Directory for one-shot query cache files (overrides GUILDBOARD_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to run
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the dashboard web server
    ///
    /// Examples:
    ///   guildboard serve
    ///   guildboard serve --bind 0.0.0.0:8080 --storage memory
    Serve {
        /// Address to listen on (overrides GUILDBOARD_BIND)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,

        /// Where to keep cache slots (overrides GUILDBOARD_STORAGE)
        #[arg(long, value_enum)]
        storage: Option<StorageMode>,
    },
    /// Print bot statistics as JSON, using the on-disk cache
    Stats,
    /// Print backend status as JSON, using the on-disk cache
    Status,
}

impl Cli {
    /// Applies command-line overrides to `config` and re-validates it
    ///
    /// # Arguments
    /// * `config` - Configuration read from the environment
    ///
    /// # Returns
    /// * `Ok(DashboardConfig)` with overrides applied
    /// * `Err(ConfigError)` if an override produced an invalid configuration
    pub fn apply(&self, mut config: DashboardConfig) -> Result<DashboardConfig, ConfigError> {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(ttl) = self.ttl_ms {
            config.default_ttl_ms = ttl;
        }
        if let Some(prefix) = &self.slot_prefix {
            config.slot_key_prefix = prefix.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Command::Serve { bind, storage } = &self.command {
            if let Some(bind) = bind {
                config.bind_addr = *bind;
            }
            if let Some(storage) = storage {
                config.storage = *storage;
            }
        }

        config.validate()?;
        Ok(config)
    }
}
