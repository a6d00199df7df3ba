//! Unified error handling for helppool.
//!
//! Two error domains: [`GatewayError`] for failures at the chat-platform
//! boundary, and [`PoolError`] for failures of a pool transition as a whole.
//! Database errors live in `db` next to the sqlx types they wrap.

use thiserror::Error;

// ============================================================================
// Gateway Errors (platform boundary)
// ============================================================================

/// Errors surfaced by the chat-platform gateway.
///
/// Most call sites treat these as transient: the failure is logged and the
/// surrounding transition's bookkeeping proceeds. Only when the failed call
/// *is* the transition (the category move itself) do they propagate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The channel, message, member, or role no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// The bot lacks permission for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The platform rejected the call due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// Any other platform failure (network, 5xx, serialization).
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

// ============================================================================
// Pool Errors (transition failures)
// ============================================================================

/// Errors that abort a pool transition.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A gateway call that was the purpose of the transition failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Claim cache read/write failed.
    #[error("claim cache error: {0}")]
    Db(#[from] crate::db::DbError),

    /// The invoker is neither the claimant nor whitelisted.
    #[error("not permitted to close this channel")]
    NotPermitted,

    /// The rotation queue was closed while waiting for a dormant channel.
    #[error("rotation queue closed")]
    QueueClosed,

    /// Startup validation rejected the configuration.
    #[error("invalid configuration ({} problem(s))", .0.len())]
    Config(Vec<crate::config::ValidationError>),
}

impl PoolError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Gateway(e) => e.error_code(),
            Self::Db(_) => "db",
            Self::NotPermitted => "not_permitted",
            Self::QueueClosed => "queue_closed",
            Self::Config(_) => "config",
        }
    }
}

/// Result type for pool transitions.
pub type PoolResult = Result<(), PoolError>;
