//! Membership result cache.
//!
//! This module provides a concurrent cache for range-membership results
//! with:
//! - A fixed capacity backed by `quick_cache` (sharded, recency-aware eviction)
//! - A TTL that bounds every entry's lifetime regardless of access frequency
//! - Early refresh: inside the last `early_refresh` of an entry's life, one
//!   caller recomputes while everybody else keeps reading the old value
//! - Single-flight computation on misses and expiry
//! - Negative results cached exactly like positive ones

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use parking_lot::Mutex;
use quick_cache::sync::{Cache, GuardResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::Context;

/// Default cache capacity (number of entries).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Default early-refresh window before expiry.
pub const DEFAULT_EARLY_REFRESH: Duration = Duration::from_secs(60);

/// Configuration for the membership cache.
///
/// Durations are (de)serialized as whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub capacity: usize,
    /// Hard upper bound on an entry's lifetime.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// How long before expiry an entry becomes eligible for refresh.
    #[serde(with = "duration_secs")]
    pub early_refresh: Duration,
    /// Whether to enable caching.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_TTL,
            early_refresh: DEFAULT_EARLY_REFRESH,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Create a configuration with caching disabled.
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the early-refresh window.
    pub fn early_refresh(mut self, window: Duration) -> Self {
        self.early_refresh = window;
        self
    }

    /// Age after which an entry is refreshed early.
    fn refresh_after(&self) -> Duration {
        self.ttl.saturating_sub(self.early_refresh)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: bool,
    stored_at: Instant,
    /// Distinguishes this entry from its replacement.
    seq: u64,
    /// Held by whoever recomputes this entry.
    refresh: Arc<Mutex<()>>,
}

/// TTL cache of membership results keyed by normalized address.
///
/// # Example
///
/// ```
/// use rangeguard::cache::{CacheConfig, MembershipCache};
/// use rangeguard::Context;
///
/// let cache = MembershipCache::new(CacheConfig::default());
/// let ctx = Context::background();
///
/// assert!(cache.get_or_fetch(&ctx, "10.0.0.1", || true));
/// // Served from cache, the closure is not called.
/// assert!(cache.get_or_fetch(&ctx, "10.0.0.1", || unreachable!()));
/// ```
pub struct MembershipCache {
    entries: Option<Cache<String, CacheEntry>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
}

impl MembershipCache {
    /// Create a cache driven by the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache driven by `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = if config.enabled && config.capacity > 0 {
            Some(Cache::new(config.capacity))
        } else {
            None
        };

        if config.early_refresh >= config.ttl {
            log::warn!(
                "Early refresh window {:?} is not shorter than TTL {:?}; every hit will refresh",
                config.early_refresh,
                config.ttl
            );
        }

        Self {
            entries,
            config,
            clock,
            seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
        }
    }

    fn new_entry(&self, value: bool) -> CacheEntry {
        CacheEntry {
            value,
            stored_at: self.clock.now(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            refresh: Arc::new(Mutex::new(())),
        }
    }

    fn age(&self, entry: &CacheEntry) -> Duration {
        self.clock.now().saturating_duration_since(entry.stored_at)
    }

    /// Return the cached result for `key`, computing it with `compute` when
    /// the key is missing, expired, or due for early refresh.
    ///
    /// Only one caller computes a given key at a time. Callers that arrive
    /// while a miss or an expiry is being computed wait for that result;
    /// callers that arrive during an early refresh get the previous value.
    /// An early refresh is skipped when `ctx` is done.
    pub fn get_or_fetch<F>(&self, ctx: &Context, key: &str, compute: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let cache = match self.entries {
            Some(ref cache) => cache,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return compute();
            }
        };

        match cache.get_value_or_guard(key, None) {
            GuardResult::Value(entry) => self.serve(ctx, cache, key, entry, compute),
            GuardResult::Guard(guard) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let value = compute();
                let _ = guard.insert(self.new_entry(value));
                value
            }
            GuardResult::Timeout => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                compute()
            }
        }
    }

    fn serve<F>(
        &self,
        ctx: &Context,
        cache: &Cache<String, CacheEntry>,
        key: &str,
        entry: CacheEntry,
        compute: F,
    ) -> bool
    where
        F: FnOnce() -> bool,
    {
        let age = self.age(&entry);

        if age < self.config.refresh_after() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry.value;
        }

        if age < self.config.ttl {
            // Early refresh is advisory; the current value is still valid.
            if ctx.is_done() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return entry.value;
            }
            let _claim = match entry.refresh.try_lock() {
                Some(claim) => claim,
                None => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return entry.value;
                }
            };
            if let Some(current) = self.replacement(cache, key, &entry) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return current.value;
            }

            self.refreshes.fetch_add(1, Ordering::Relaxed);
            let value = compute();
            cache.insert(key.to_string(), self.new_entry(value));
            log::trace!("Refreshed cache entry {} early", key);
            return value;
        }

        // Expired: never served. Wait for, or perform, the recomputation.
        let _claim = entry.refresh.lock();
        if let Some(current) = self.replacement(cache, key, &entry) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return current.value;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        cache.insert(key.to_string(), self.new_entry(value));
        value
    }

    /// A live entry that replaced `stale` since it was read, if any.
    fn replacement(
        &self,
        cache: &Cache<String, CacheEntry>,
        key: &str,
        stale: &CacheEntry,
    ) -> Option<CacheEntry> {
        cache
            .get(key)
            .filter(|current| current.seq != stale.seq && self.age(current) < self.config.ttl)
    }

    /// The cached value for `key` if present and not expired. Never computes.
    pub fn get(&self, key: &str) -> Option<bool> {
        let entry = self.entries.as_ref()?.get(key)?;
        if self.age(&entry) < self.config.ttl {
            Some(entry.value)
        } else {
            None
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(ref cache) = self.entries {
            cache.clear();
        }
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |cache| cache.len())
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: if self.entries.is_some() {
                self.config.capacity
            } else {
                0
            },
            len: self.len(),
            enabled: self.entries.is_some(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MembershipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to compute (misses and expired entries).
    pub misses: u64,
    /// Early refreshes performed.
    pub refreshes: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.refreshes;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
