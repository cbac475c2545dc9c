use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Per-key async mutexes, created on demand and dropped once nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct KeyLocks {
    inner: Arc<LockMap>,
}

/// Exclusive hold on one key; released on drop.
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds `key`, then take it.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        // The map shard lock is released before awaiting the key mutex.
        let cell = self.inner.entry(key.to_string()).or_default().clone();
        let guard = cell.lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.inner),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: no holder, no waiter.
        self.locks.remove_if(&self.key, |_, cell| Arc::strong_count(cell) == 1);
    }
}
