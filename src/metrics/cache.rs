//! Shared TTL cache of aggregator snapshots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;

use super::row::MetricRow;

/// Default maximum number of cached snapshots.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_024;

/// A cached snapshot and its expiry deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub snapshot: Arc<Vec<MetricRow>>,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Per-entry expiry: every entry lives until its own `expires_at`.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

/// Memory-only snapshot cache shared by all collection tasks.
///
/// Cloning is cheap and every clone sees the same entries. Keys are expected to
/// be scoped by task, see [`MetricFamilies::cache_key`](super::MetricFamilies::cache_key).
#[derive(Clone)]
pub struct MetricsCache {
    inner: Cache<String, CacheEntry>,
}

impl MetricsCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
        }
    }

    /// Fetch a non-expired snapshot.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<MetricRow>>> {
        let entry = self.inner.get(key)?;
        if entry.is_expired(Instant::now()) {
            self.inner.invalidate(key);
            return None;
        }
        Some(entry.snapshot)
    }

    /// Store a snapshot that expires `ttl` from now. A zero ttl stores nothing.
    pub fn insert(&self, key: impl Into<String>, snapshot: Vec<MetricRow>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            snapshot: Arc::new(snapshot),
            expires_at: Instant::now() + ttl,
        };
        self.inner.insert(key, entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.invalidate(key);
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for MetricsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCache")
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}
