//! guildboard - Discord bot dashboard server
//!
//! Serves cached bot statistics and backend status over HTTP, or prints them
//! once from the command line.

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use guildboard::cli::{Cli, Command};
use guildboard::storage::{FileStorage, MemoryStorage, SlotStorage};
use guildboard::{web, Dashboard, DashboardConfig};

/// Picks the storage for one-shot queries: the configured or XDG cache directory,
/// or memory when no home directory exists
fn query_storage(config: &DashboardConfig) -> Box<dyn SlotStorage> {
    let files = match &config.cache_dir {
        Some(dir) => Some(FileStorage::with_dir(dir.clone())),
        None => FileStorage::new(),
    };
    match files {
        Some(files) => Box::new(files),
        None => {
            tracing::warn!("No cache directory available, results will not be cached");
            Box::new(MemoryStorage::new())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so query output on stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.apply(DashboardConfig::from_env()?)?;

    match cli.command {
        Command::Serve { .. } => web::serve(config).await?,
        Command::Stats => {
            let storage = query_storage(&config);
            let dashboard = Dashboard::new(config)?;
            print_json(&dashboard.stats(storage).await)?;
        }
        Command::Status => {
            let storage = query_storage(&config);
            let dashboard = Dashboard::new(config)?;
            print_json(&dashboard.status(storage).await)?;
        }
    }

    Ok(())
}
