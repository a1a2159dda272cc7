//! Catalog payload cache
//!
//! Read-through cache for the KPI catalog response. There is exactly one
//! cached payload (a fixed key), refreshed when its TTL expires. Hit/miss
//! counters feed the metrics endpoint.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached payload stays fresh (default: 60 seconds)
    pub ttl: Duration,
    /// Disable to compute on every request
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            enabled: true,
        }
    }
}

struct Entry {
    payload: Value,
    created_at: Instant,
}

impl Entry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Counters exposed on the metrics endpoint
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Served from cache
    pub hits: AtomicU64,
    /// Computed fresh (cold, expired, or disabled)
    pub misses: AtomicU64,
}

/// Single-entry TTL cache for the catalog payload
pub struct CatalogCache {
    config: CacheConfig,
    entry: RwLock<Option<Entry>>,
    stats: CacheStats,
}

impl CatalogCache {
    /// Create a cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entry: RwLock::new(None),
            stats: CacheStats::default(),
        }
    }

    /// Read-through access: return the cached payload or compute and store
    pub fn get_or_insert_with<F>(&self, compute: F) -> Value
    where
        F: FnOnce() -> Value,
    {
        if self.config.enabled {
            let guard = self.entry.read();
            if let Some(entry) = guard.as_ref() {
                if !entry.is_expired(self.config.ttl) {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return entry.payload.clone();
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let payload = compute();

        if self.config.enabled {
            *self.entry.write() = Some(Entry {
                payload: payload.clone(),
                created_at: Instant::now(),
            });
        }
        payload
    }

    /// Drop the cached payload
    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }

    /// Hit counter
    pub fn hits(&self) -> u64 {
        self.stats.hits.load(Ordering::Relaxed)
    }

    /// Miss counter
    pub fn misses(&self) -> u64 {
        self.stats.misses.load(Ordering::Relaxed)
    }
}
