//! Async locks created per key and dropped once nobody uses them

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// One async mutex per key.
///
/// A key's mutex lives only while someone holds or waits for it, so the
/// map stays as large as the set of keys currently in use.
pub(crate) struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, KeyLock>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Wait for exclusive use of `key`
    pub(crate) async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
        let lock = self.locks.lock().entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyedGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Whether `key` is held or awaited
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.locks.lock().contains_key(key)
    }

    /// Number of keys held or awaited
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Exclusive use of one key; dropping it releases the key
pub(crate) struct KeyedGuard<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.locks.lock();
        // waiters hold their own clone of the mutex
        let unused = locks
            .get(&self.key)
            .map_or(false, |lock| Arc::strong_count(lock) == 1);
        if unused {
            locks.remove(&self.key);
        }
    }
}
