//! Cache seams and statistics.

use marquee_core::Timestamp;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time.
///
/// The gateway reads the clock for classification and insertion
/// timestamps, so tests can drive TTL expiry without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Resolutions served from a fresh entry.
    pub hits: u64,
    /// Resolutions that started an origin call and stored its result.
    pub misses: u64,
    /// Resolutions that joined an origin call already in flight.
    pub joins: u64,
    /// Resolutions under `NoStore` that started an origin call.
    pub bypasses: u64,
    /// Origin calls actually executed.
    pub origin_calls: u64,
    /// Origin calls that failed.
    pub origin_failures: u64,
    /// Entries removed through the invalidation controller.
    pub invalidated: u64,
    /// Entries removed by the size bound.
    pub evictions: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Keys with an origin call currently in flight.
    pub in_flight: u64,
}

impl CacheStats {
    /// Fraction of resolutions that did not wait on the origin (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joins + self.bypasses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub joins: AtomicU64,
    pub bypasses: AtomicU64,
    pub origin_calls: AtomicU64,
    pub origin_failures: AtomicU64,
    pub invalidated: AtomicU64,
}

impl CacheCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            origin_calls: self.origin_calls.load(Ordering::Relaxed),
            origin_failures: self.origin_failures.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}
