//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early. A
//! failed validation means the pool declines to load at all; it never runs
//! against a half-usable configuration.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("categories.available, in_use and dormant must be three distinct categories")]
    DuplicateCategories,
    #[error("pool.max_available must be at least 1")]
    ZeroMaxAvailable,
    #[error("pool.{0} must be greater than zero")]
    ZeroWindow(&'static str),
    #[error("pool.max_total_channels ({0}) is smaller than pool.max_available ({1})")]
    TotalBelowTarget(usize, u32),
    #[error("pool.missing_claimant_lookback must be greater than zero")]
    ZeroLookback,
    #[error("names list is empty")]
    EmptyNamePool,
    #[error("names list contains duplicate entry '{0}'")]
    DuplicateName(String),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let cats = &config.categories;
    if cats.available == cats.in_use
        || cats.available == cats.dormant
        || cats.in_use == cats.dormant
    {
        errors.push(ValidationError::DuplicateCategories);
    }

    let pool = &config.pool;
    if pool.max_available == 0 {
        errors.push(ValidationError::ZeroMaxAvailable);
    }
    if pool.idle_minutes == 0 {
        errors.push(ValidationError::ZeroWindow("idle_minutes"));
    }
    if pool.deleted_idle_minutes == 0 {
        errors.push(ValidationError::ZeroWindow("deleted_idle_minutes"));
    }
    if pool.claim_minutes == 0 {
        errors.push(ValidationError::ZeroWindow("claim_minutes"));
    }
    if pool.max_total_channels < pool.max_available as usize {
        errors.push(ValidationError::TotalBelowTarget(
            pool.max_total_channels,
            pool.max_available,
        ));
    }
    if pool.missing_claimant_lookback == 0 {
        errors.push(ValidationError::ZeroLookback);
    }

    if config.names.is_empty() {
        errors.push(ValidationError::EmptyNamePool);
    } else {
        let mut seen = std::collections::HashSet::new();
        for name in &config.names {
            if !seen.insert(name.as_str()) {
                errors.push(ValidationError::DuplicateName(name.clone()));
            }
        }
    }

    let db_path = Path::new(&config.database.path);
    if config.database.path != ":memory:"
        && let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(
            config.database.path.clone(),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
