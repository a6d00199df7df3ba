//! Advisory keyed mutexes.
//!
//! Claim and unclaim are multi-step sequences full of suspension points;
//! two near-simultaneous triggers for the same channel (manual close plus
//! idle timeout) must not interleave. Rather than a cross-cutting decorator,
//! this is an explicit map from key to mutex with scoped acquisition: the
//! guard releases on every exit path, including errors.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Scoped lock held for the duration of a critical section.
pub type KeyedGuard = OwnedMutexGuard<()>;

/// A map of advisory mutexes keyed by channel id or claimant id.
#[derive(Debug, Default)]
pub struct KeyedLocks<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty lock map.
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub async fn lock(&self, key: K) -> KeyedGuard {
        let mutex = self.locks.entry(key).or_default().value().clone();
        mutex.lock_owned().await
    }

    /// Drop mutexes nobody is holding or waiting on. Called opportunistically
    /// after transitions so the map tracks the working set, not history.
    pub fn prune(&self) {
        self.locks
            .retain(|_, mutex| Arc::strong_count(mutex) > 1 || mutex.try_lock().is_err());
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
