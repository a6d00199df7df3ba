//! helppool - help-channel pool lifecycle manager.
//!
//! Manages a rotating pool of help channels across three category buckets
//! (Available / In-Use / Dormant): claims a channel when someone asks a
//! question in an Available channel, enforces a claim cooldown role, returns
//! idle channels to Dormant, and keeps the Available pool topped up.
//!
//! The chat platform itself is an external collaborator: the embedding bot
//! implements the [`gateway::Gateway`] trait over its platform SDK and feeds
//! [`gateway::GatewayEvent`]s into [`pool::PoolManager::run`].

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod metrics;
pub mod notify;
pub mod pool;
pub mod scheduler;

pub use config::Config;
pub use error::{GatewayError, PoolError};
pub use pool::PoolManager;
