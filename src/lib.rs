//! guildboard library
//!
//! Dashboard server for a Discord bot. Backend stats and status are proxied
//! through a TTL cache whose slots live in client cookies, server memory, or
//! files on disk.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod storage;
pub mod web;

pub use config::DashboardConfig;
pub use dashboard::Dashboard;
