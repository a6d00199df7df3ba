//! Channel name allocation.
//!
//! Channel names come from a fixed ordered pool. A name used by any channel
//! in the three managed categories must not be reassigned to a new channel,
//! so allocation builds a queue of the remaining unused names.

use crate::config::Config;
use std::collections::{HashSet, VecDeque};
use tracing::warn;

/// Cap most platforms impose on channels within a single category.
const PLATFORM_CATEGORY_LIMIT: usize = 50;

/// Build the queue of claimable channel names.
///
/// Takes every candidate from the configured pool (with prefix applied,
/// capped at `max_total_channels`), removes the names in `used`, and returns
/// the remainder in pool order. Never fails: running low on names is handled
/// by the caller, not here.
pub fn build_name_queue<'a, I>(config: &Config, used: I) -> VecDeque<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let used: HashSet<&str> = used.into_iter().collect();

    if used.len() >= PLATFORM_CATEGORY_LIMIT {
        warn!(
            used = used.len(),
            limit = PLATFORM_CATEGORY_LIMIT,
            "Used channel names at or above the platform category limit"
        );
    }

    config
        .names
        .iter()
        .take(config.pool.max_total_channels)
        .map(|name| format!("{}{}", config.pool.name_prefix, name))
        .filter(|name| !used.contains(name.as_str()))
        .collect()
}
