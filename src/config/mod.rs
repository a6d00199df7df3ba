//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, PoolConfig, ...)
//! - [`validation`]: Startup validation; the pool declines to run on a
//!   misconfiguration rather than starting partially initialized

mod types;
mod validation;

pub use types::{
    CategoriesConfig, Config, ConfigError, DatabaseConfig, NotificationsConfig, PoolConfig,
    RolesConfig,
};
pub use validation::{ValidationError, validate};
