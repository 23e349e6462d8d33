//! Process-wide query cache

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{QueryKey, QueryOptions, QueryStatus, RefetchTrigger};
use crate::error::Mail3Result;
use crate::locks::KeyedLocks;

type Data = Arc<dyn Any + Send + Sync>;

/// One cached query
#[derive(Clone, Default)]
struct CacheEntry {
    /// Last successfully fetched or patched value
    data: Option<Data>,
    /// Query status
    status: QueryStatus,
    /// Message of the last failure
    error: Option<String>,
    /// When `data` last came from the backend
    updated_at: Option<Instant>,
    /// Marked by a mutation; the next read refetches
    invalidated: bool,
    /// Views or lists currently showing this entry
    observers: usize,
    /// Last write or release, for garbage collection
    touched_at: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self, options: &QueryOptions) -> bool {
        !self.invalidated
            && self
                .updated_at
                .map(|at| at.elapsed() < options.stale_time)
                .unwrap_or(false)
    }

    fn is_expired(&self, cache_time: Duration) -> bool {
        self.observers == 0 && self.touched_at.map_or(true, |at| at.elapsed() >= cache_time)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached keys
    pub entries: usize,
    /// Keys with a fetch running or queued
    pub in_flight: usize,
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that went to the backend
    pub misses: u64,
    /// Backend calls, retries included
    pub fetches: u64,
    /// Entries dropped by garbage collection
    pub evictions: u64,
}

/// Shared store of query results.
///
/// Locks are only held for synchronous sections. In-flight fetches are
/// serialized per key by an async mutex, so a caller that arrives while
/// the same key is loading waits and reuses that result.
///
/// Entries nobody [observes](Self::observe) are dropped once they have
/// not been written for the query's cache time.
#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    in_flight: KeyedLocks<QueryKey>,
    stats: Mutex<CacheStats>,
}

impl QueryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `key` through the cache, calling `fetcher` only when needed.
    ///
    /// Cached data is reused when it is fresh, or when `trigger` does not
    /// refetch under `options` and the key was not invalidated. A failed
    /// fetch keeps the previous data and records the error.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        trigger: RefetchTrigger,
        mut fetcher: F,
    ) -> Mail3Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Mail3Result<T>>,
    {
        self.collect_garbage(options.cache_time);

        let requested_at = Instant::now();
        if let Some(data) = self.reusable::<T>(key, options, trigger, None) {
            debug!("Cache hit: {}", key);
            return Ok(data);
        }

        let _guard = self.in_flight.lock(key).await;

        // whoever held the lock may have just loaded this key
        if let Some(data) = self.reusable::<T>(key, options, trigger, Some(requested_at)) {
            debug!("Cache hit after waiting: {}", key);
            return Ok(data);
        }

        debug!("Cache miss: {} ({:?})", key, trigger);
        self.stats.lock().misses += 1;
        self.entries.write().entry(key.clone()).or_default().status = QueryStatus::Loading;

        let mut attempt = 0;
        let result = loop {
            self.stats.lock().fetches += 1;
            match fetcher().await {
                Ok(value) => break Ok(value),
                Err(e) if attempt < options.retry && !e.is_validation_error() => {
                    attempt += 1;
                    debug!("Retrying {} after error ({}/{}): {}", key, attempt, options.retry, e);
                }
                Err(e) => break Err(e),
            }
        };

        let mut entries = self.entries.write();
        let entry = entries.entry(key.clone()).or_default();
        let now = Instant::now();
        entry.touched_at = Some(now);
        match result {
            Ok(value) => {
                let value = Arc::new(value);
                entry.data = Some(value.clone() as Data);
                entry.status = QueryStatus::Success;
                entry.error = None;
                entry.updated_at = Some(now);
                entry.invalidated = false;
                Ok(value)
            }
            Err(e) => {
                warn!("Query {} failed: {}", key, e);
                entry.status = QueryStatus::Error;
                entry.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn reusable<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        trigger: RefetchTrigger,
        requested_at: Option<Instant>,
    ) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        let data = entry.data.clone()?;

        let loaded_meanwhile = match (requested_at, entry.updated_at) {
            (Some(requested), Some(updated)) => updated >= requested,
            _ => false,
        };
        let reuse = loaded_meanwhile
            || entry.is_fresh(options)
            || (!entry.invalidated && !options.refetches_on(trigger));
        if !reuse {
            return None;
        }
        drop(entries);

        match data.downcast::<T>() {
            Ok(data) => {
                self.stats.lock().hits += 1;
                Some(data)
            }
            Err(_) => {
                warn!("Cached value for {} has an unexpected type", key);
                None
            }
        }
    }

    /// Cached value of `key`, regardless of freshness
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let data = self.entries.read().get(key)?.data.clone()?;
        data.downcast::<T>().ok()
    }

    /// Store `value` under `key` as freshly loaded
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let mut entries = self.entries.write();
        let entry = entries.entry(key.clone()).or_default();
        let now = Instant::now();
        entry.data = Some(Arc::new(value) as Data);
        entry.status = QueryStatus::Success;
        entry.error = None;
        entry.updated_at = Some(now);
        entry.touched_at = Some(now);
        entry.invalidated = false;
    }

    /// Replace the cached value of `key` with `update(old)`.
    ///
    /// Freshness is left alone. Returns false when nothing of type `T` is
    /// cached under `key`.
    pub fn update_query_data<T, F>(&self, key: &QueryKey, update: F) -> bool
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let Some(current) = entry.data.as_ref().and_then(|d| d.downcast_ref::<T>()) else {
            return false;
        };
        entry.data = Some(Arc::new(update(current)) as Data);
        entry.touched_at = Some(Instant::now());
        true
    }

    /// Mark `key` so the next read refetches
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.entries.write().get_mut(key) {
            debug!("Invalidating {}", key);
            entry.invalidated = true;
        }
    }

    /// Invalidate `prefix` and every key extending it
    pub fn invalidate_prefix(&self, prefix: &QueryKey) {
        for (key, entry) in self.entries.write().iter_mut() {
            if key.starts_with(prefix) {
                debug!("Invalidating {}", key);
                entry.invalidated = true;
            }
        }
    }

    /// Drop `key` entirely
    pub fn remove(&self, key: &QueryKey) {
        self.entries.write().remove(key);
    }

    /// Keep `key` cached until a matching [`release`](Self::release)
    pub fn observe(&self, key: &QueryKey) {
        self.entries.write().entry(key.clone()).or_default().observers += 1;
    }

    /// Undo one [`observe`](Self::observe) of `key`.
    ///
    /// Returns how many observers are left. An unobserved entry stays until
    /// garbage collection or [`remove_unobserved`](Self::remove_unobserved).
    pub fn release(&self, key: &QueryKey) -> usize {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(key) else {
            return 0;
        };
        entry.observers = entry.observers.saturating_sub(1);
        if entry.observers == 0 {
            entry.touched_at = Some(Instant::now());
        }
        entry.observers
    }

    /// Drop `key` now unless something still observes it
    pub fn remove_unobserved(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries.write();
        if entries.get(key).map_or(false, |e| e.observers == 0) {
            debug!("Discarding {}", key);
            entries.remove(key);
            true
        } else {
            false
        }
    }

    /// Drop entries nobody observes that were last written more than
    /// `cache_time` ago. Keys being fetched are kept. Returns how many
    /// entries were dropped.
    pub fn collect_garbage(&self, cache_time: Duration) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, entry| !entry.is_expired(cache_time) || self.in_flight.contains(key));
        let evicted = before - entries.len();
        drop(entries);

        if evicted > 0 {
            debug!("Evicted {} unused cache entries", evicted);
            self.stats.lock().evictions += evicted as u64;
        }
        evicted
    }

    /// Cached keys of one operation, sorted
    pub fn keys_for_operation(&self, operation: &str) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .entries
            .read()
            .keys()
            .filter(|k| k.operation() == operation)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Status of `key`
    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.entries
            .read()
            .get(key)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    /// Message of the last failed fetch of `key`
    pub fn error(&self, key: &QueryKey) -> Option<String> {
        self.entries.read().get(key)?.error.clone()
    }

    /// Whether `key` would be refetched on mount under `options`
    pub fn is_stale(&self, key: &QueryKey, options: &QueryOptions) -> bool {
        self.entries
            .read()
            .get(key)
            .map(|e| !e.is_fresh(options))
            .unwrap_or(true)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        stats.entries = self.entries.read().len();
        stats.in_flight = self.in_flight.len();
        stats
    }
}
