//! Core configuration types and loading.

use crate::gateway::{CategoryId, ChannelId, RoleId};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Pool manager configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Pool sizing and timing knobs.
    #[serde(default)]
    pub pool: PoolConfig,
    /// The three managed category ids.
    pub categories: CategoriesConfig,
    /// Cooldown and permission roles.
    pub roles: RolesConfig,
    /// Staff notification configuration.
    pub notifications: NotificationsConfig,
    /// Claim cache database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Candidate channel names, drawn in order. Defaults to a built-in list.
    #[serde(default = "default_name_pool")]
    pub names: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Pool sizing and timing.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Target number of Available channels (default: 2).
    #[serde(default = "default_max_available")]
    pub max_available: u32,

    /// Minutes of claimant inactivity before an In-Use channel goes
    /// Dormant (default: 30).
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u64,

    /// Shorter idle window for channels whose only human messages were
    /// deleted (default: 5).
    #[serde(default = "default_deleted_idle_minutes")]
    pub deleted_idle_minutes: u64,

    /// Minutes the claim cooldown role stays on a claimant (default: 15).
    #[serde(default = "default_claim_minutes")]
    pub claim_minutes: u64,

    /// Prefix prepended to every pool channel name (default: "help-").
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Hard cap on channels managed across all three categories
    /// (default: 32).
    #[serde(default = "default_max_total_channels")]
    pub max_total_channels: usize,

    /// How many recent messages to scan when recovering a missing claimant.
    /// The upstream figure was an order of magnitude larger with no recorded
    /// rationale; this is deliberately a plain tunable (default: 100).
    #[serde(default = "default_missing_claimant_lookback")]
    pub missing_claimant_lookback: usize,
}

impl PoolConfig {
    /// Normal idle window as a duration.
    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle_minutes * 60)
    }

    /// Empty-channel idle window as a duration.
    pub fn deleted_idle_window(&self) -> Duration {
        Duration::from_secs(self.deleted_idle_minutes * 60)
    }

    /// Claim cooldown duration.
    pub fn claim_window(&self) -> Duration {
        Duration::from_secs(self.claim_minutes * 60)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_available: default_max_available(),
            idle_minutes: default_idle_minutes(),
            deleted_idle_minutes: default_deleted_idle_minutes(),
            claim_minutes: default_claim_minutes(),
            name_prefix: default_name_prefix(),
            max_total_channels: default_max_total_channels(),
            missing_claimant_lookback: default_missing_claimant_lookback(),
        }
    }
}

fn default_max_available() -> u32 {
    2
}

fn default_idle_minutes() -> u64 {
    30
}

fn default_deleted_idle_minutes() -> u64 {
    5
}

fn default_claim_minutes() -> u64 {
    15
}

fn default_name_prefix() -> String {
    "help-".to_string()
}

fn default_max_total_channels() -> usize {
    32
}

fn default_missing_claimant_lookback() -> usize {
    100
}

/// The three managed category buckets.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CategoriesConfig {
    /// Channels ready to be claimed.
    pub available: CategoryId,
    /// Channels with an active help session.
    pub in_use: CategoryId,
    /// Inactive channels kept in reserve.
    pub dormant: CategoryId,
}

/// Role configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    /// Role granted to a claimant to block further claims for a while.
    pub cooldown: RoleId,
    /// Roles allowed to close any In-Use channel (moderators, helpers).
    #[serde(default)]
    pub command_whitelist: Vec<RoleId>,
    /// Roles mentioned in staff notifications.
    #[serde(default)]
    pub notify: Vec<RoleId>,
}

/// Staff notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Channel that receives "pool degraded" pings.
    pub channel: ChannelId,
    /// Minimum minutes between two notifications (default: 30).
    #[serde(default = "default_notify_interval_minutes")]
    pub minimum_interval_minutes: u64,
}

impl NotificationsConfig {
    /// Minimum interval between notifications as a duration.
    pub fn minimum_interval(&self) -> Duration {
        Duration::from_secs(self.minimum_interval_minutes * 60)
    }
}

fn default_notify_interval_minutes() -> u64 {
    30
}

/// Claim cache database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "helppool.db".to_string()
}

/// Built-in channel name pool. Prefixed with `pool.name_prefix` at
/// allocation time.
fn default_name_pool() -> Vec<String> {
    [
        "alder", "aspen", "basil", "birch", "cedar", "cherry", "clover", "cypress", "elm",
        "fennel", "fern", "hazel", "heather", "holly", "ivy", "juniper", "larch", "laurel",
        "linden", "magnolia", "maple", "myrtle", "oak", "olive", "pine", "poplar", "rowan",
        "sage", "sequoia", "spruce", "thyme", "willow",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
