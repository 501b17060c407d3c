//! Immutable cache entry record.

use chrono::TimeDelta;
use marquee_core::{CacheKey, FreshnessPolicy, Tag, TagSet, Timestamp};

/// A value fetched from the origin, together with the policy and tags it was
/// stored under.
///
/// Entries are never mutated once built. A refresh produces a new entry that
/// replaces the old one in the store.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    key: CacheKey,
    value: V,
    policy: FreshnessPolicy,
    tags: TagSet,
    inserted_at: Timestamp,
}

impl<V> CacheEntry<V> {
    pub fn new(
        key: CacheKey,
        value: V,
        policy: FreshnessPolicy,
        tags: TagSet,
        inserted_at: Timestamp,
    ) -> Self {
        Self {
            key,
            value,
            policy,
            tags,
            inserted_at,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn inserted_at(&self) -> Timestamp {
        self.inserted_at
    }

    /// Time elapsed since insertion. Negative if `now` is before insertion.
    pub fn age(&self, now: Timestamp) -> TimeDelta {
        now.signed_duration_since(self.inserted_at)
    }
}
