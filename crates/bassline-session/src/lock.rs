//! Per-resource async locks.

use std::sync::Arc;
use std::time::Duration;

use bassline_core::{BasslineError, BasslineResult};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::ResourceKey;

/// Default time to wait for a resource lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Default `Retry-After` seconds when a lock cannot be taken.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

type Locks = DashMap<ResourceKey, Arc<Mutex<()>>>;

/// A table of mutexes keyed by resource.
///
/// Requests for the same key serialize; different keys never contend. An
/// entry lives only while a guard or a waiter refers to it.
#[derive(Debug)]
pub struct LockTable {
    locks: Arc<Locks>,
    timeout: Duration,
    retry_after_secs: u64,
}

/// Exclusive access to one resource, released on drop.
#[derive(Debug)]
pub struct LockGuard {
    key: ResourceKey,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Locks>,
}

impl LockGuard {
    /// The locked resource.
    #[must_use]
    pub const fn key(&self) -> ResourceKey {
        self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        release(&self.locks, self.key);
    }
}

/// Removes the entry for `key` once the table holds the only reference.
fn release(locks: &Locks, key: ResourceKey) {
    locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
}

impl LockTable {
    /// Creates a table with the given acquire timeout and retry hint.
    #[must_use]
    pub fn new(timeout: Duration, retry_after_secs: u64) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
            retry_after_secs,
        }
    }

    /// Waits for the lock on `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BasslineError::StorageUnavailable`] if the lock is not
    /// acquired within the timeout.
    pub async fn acquire(&self, key: ResourceKey) -> BasslineResult<LockGuard> {
        let lock = Arc::clone(&self.locks.entry(key).or_default());

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(LockGuard {
                key,
                guard: Some(guard),
                locks: Arc::clone(&self.locks),
            }),
            Err(_) => {
                release(&self.locks, key);
                warn!(resource = %key, timeout_ms = self.timeout.as_millis() as u64, "resource lock timed out");
                Err(BasslineError::storage_unavailable(
                    format!("{key} is busy"),
                    self.retry_after_secs,
                ))
            }
        }
    }

    /// Number of resources currently locked or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` when no resource is locked or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Returns the acquire timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT, DEFAULT_RETRY_AFTER_SECS)
    }
}
