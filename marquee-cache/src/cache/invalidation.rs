//! Administrative invalidation.
//!
//! The controller mutates the store directly and does not coordinate with
//! in-flight resolutions. A resolution racing an invalidation either serves
//! the entry once more or finds the slot empty and refetches; the tag index
//! stays consistent either way.

use std::sync::Arc;

use marquee_core::{CacheKey, Tag, Timestamp};
use serde::Serialize;

use super::store::CacheStore;
use super::traits::{CacheCounters, Clock};

/// What an invalidation targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum InvalidationScope {
    Tag { tag: Tag },
    Key { key: CacheKey },
    All,
}

/// Acknowledgement returned to the administrative caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    #[serde(flatten)]
    pub scope: InvalidationScope,
    /// Number of entries removed. Zero is a successful no-op.
    pub removed: usize,
    pub invalidated_at: Timestamp,
}

/// Tag-scoped and full purges against a [`CacheStore`].
pub struct InvalidationController<V> {
    store: Arc<CacheStore<V>>,
    clock: Arc<dyn Clock>,
    counters: Arc<CacheCounters>,
}

impl<V> Clone for InvalidationController<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V> InvalidationController<V> {
    pub(crate) fn new(
        store: Arc<CacheStore<V>>,
        clock: Arc<dyn Clock>,
        counters: Arc<CacheCounters>,
    ) -> Self {
        Self {
            store,
            clock,
            counters,
        }
    }

    /// Remove every entry tagged `tag`.
    pub fn invalidate_tag(&self, tag: impl Into<Tag>) -> InvalidationReport {
        let tag = tag.into();
        let removed = self.store.delete_by_tag(&tag);
        tracing::info!(tag = %tag, removed, "Invalidated tag");
        self.report(InvalidationScope::Tag { tag }, removed)
    }

    /// Remove a single key.
    pub fn invalidate_key(&self, key: impl Into<CacheKey>) -> InvalidationReport {
        let key = key.into();
        let removed = usize::from(self.store.delete_key(&key));
        tracing::info!(key = %key, removed, "Invalidated key");
        self.report(InvalidationScope::Key { key }, removed)
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) -> InvalidationReport {
        let removed = self.store.delete_all();
        tracing::info!(removed, "Invalidated entire cache");
        self.report(InvalidationScope::All, removed)
    }

    fn report(&self, scope: InvalidationScope, removed: usize) -> InvalidationReport {
        CacheCounters::add(&self.counters.invalidated, removed as u64);
        InvalidationReport {
            scope,
            removed,
            invalidated_at: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::entry::CacheEntry;
    use chrono::Utc;
    use marquee_core::{tag_set, FreshnessPolicy};

    fn controller() -> (Arc<CacheStore<u32>>, InvalidationController<u32>) {
        let store = Arc::new(CacheStore::new(64));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let controller =
            InvalidationController::new(Arc::clone(&store), clock, Arc::new(CacheCounters::default()));
        (store, controller)
    }

    fn put(store: &CacheStore<u32>, key: &str, tags: &[&str]) {
        store.put(CacheEntry::new(
            CacheKey::new(key),
            1,
            FreshnessPolicy::Immutable,
            tag_set(tags.iter().copied()),
            Utc::now(),
        ));
    }

    #[test]
    fn test_invalidate_tag_is_scoped() {
        let (store, controller) = controller();
        put(&store, "/api/v1/movies/1", &["movies", "movie-1"]);
        put(&store, "/api/v1/cinemas", &["cinemas"]);

        let report = controller.invalidate_tag("movies");
        assert_eq!(report.removed, 1);
        assert_eq!(
            report.scope,
            InvalidationScope::Tag {
                tag: Tag::new("movies")
            }
        );
        assert!(store.contains(&CacheKey::new("/api/v1/cinemas")));
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_invalidate_unknown_tag_is_noop() {
        let (store, controller) = controller();
        put(&store, "a", &["x"]);
        let report = controller.invalidate_tag("nothing-here");
        assert_eq!(report.removed, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalidate_all_and_counters() {
        let (store, controller) = controller();
        put(&store, "a", &["x"]);
        put(&store, "b", &[]);

        let report = controller.invalidate_all();
        assert_eq!(report.removed, 2);
        assert!(store.is_empty());
        assert_eq!(controller.counters.snapshot().invalidated, 2);
    }

    #[test]
    fn test_invalidate_key() {
        let (store, controller) = controller();
        put(&store, "a", &["x"]);
        assert_eq!(controller.invalidate_key("a").removed, 1);
        assert_eq!(controller.invalidate_key("a").removed, 0);
        assert_eq!(store.tag_count(), 0);
    }

    #[test]
    fn test_report_serializes_flat() {
        let (_, controller) = controller();
        let json = serde_json::to_value(controller.invalidate_tag("movies")).unwrap();
        assert_eq!(json["scope"], "tag");
        assert_eq!(json["tag"], "movies");
        assert_eq!(json["removed"], 0);
    }
}
