//! Key→entry table with a reverse tag index.
//!
//! The table and the tag index live behind a single `RwLock`, so every
//! mutation updates both atomically. Readers clone an `Arc` to the entry;
//! they observe either the old or the new entry, never a partial write.
//!
//! The table is an [`LruCache`] bounded by `max_entries`. When an insert
//! pushes out the least recently used key, its tag associations are removed
//! in the same critical section. [`CacheStore::get`] promotes the key and so
//! takes the write lock; the other read paths peek under the read lock.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;
use marquee_core::{CacheKey, Tag};
use thiserror::Error;

use super::entry::CacheEntry;

/// Broken store invariant. Indicates a defect, never a runtime condition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("Tag {tag} references missing key {key}")]
    DanglingTagReference { tag: Tag, key: CacheKey },

    #[error("Key {key} carries tag {tag} but is missing from its bucket")]
    MissingTagReference { tag: Tag, key: CacheKey },

    #[error("Tag {tag} has an empty bucket")]
    EmptyTagBucket { tag: Tag },

    #[error("Entry stored under {slot} reports key {key}")]
    KeyMismatch { slot: CacheKey, key: CacheKey },

    #[error("Store holds {len} entries, bound is {max}")]
    OverCapacity { len: usize, max: usize },
}

struct StoreInner<V> {
    entries: LruCache<CacheKey, Arc<CacheEntry<V>>>,
    tag_index: HashMap<Tag, HashSet<CacheKey>>,
}

impl<V> StoreInner<V> {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            tag_index: HashMap::new(),
        }
    }

    /// Remove a key and every tag association it has.
    fn unlink(&mut self, key: &CacheKey) -> Option<Arc<CacheEntry<V>>> {
        let entry = self.entries.pop(key)?;
        self.forget_tags(key, &entry);
        Some(entry)
    }

    fn forget_tags(&mut self, key: &CacheKey, entry: &CacheEntry<V>) {
        for tag in entry.tags() {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
    }
}

/// Thread-safe table of [`CacheEntry`] values plus the tag→keys index.
///
/// All operations are total: deleting a missing key or tag is a no-op.
pub struct CacheStore<V> {
    inner: RwLock<StoreInner<V>>,
    max_entries: usize,
    evictions: AtomicU64,
}

impl<V> CacheStore<V> {
    /// Create a store holding at most `max_entries` entries.
    ///
    /// A bound of zero is treated as one; [`super::CacheConfig::validate`]
    /// rejects it earlier.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(StoreInner::new(capacity)),
            max_entries: capacity.get(),
            evictions: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner<V>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Cache store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner<V>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Cache store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Look up the entry for `key`, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<V>>> {
        self.write().entries.get(key).cloned()
    }

    /// Look up the entry for `key` without touching its recency.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry<V>>> {
        self.read().entries.peek(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.read().entries.contains(key)
    }

    /// Insert or replace the entry for `entry.key()`.
    ///
    /// Tag associations of the replaced entry are dropped before the new
    /// ones are added. Returns the replaced entry, if any.
    pub fn put(&self, entry: CacheEntry<V>) -> Option<Arc<CacheEntry<V>>> {
        let key = entry.key().clone();
        let entry = Arc::new(entry);

        let (previous, evicted) = {
            let mut inner = self.write();
            let previous = inner.unlink(&key);

            for tag in entry.tags() {
                inner
                    .tag_index
                    .entry(tag.clone())
                    .or_default()
                    .insert(key.clone());
            }

            // `key` was just popped, so anything pushed out is an eviction.
            let evicted = inner.entries.push(key, entry);
            if let Some((victim_key, victim)) = &evicted {
                inner.forget_tags(victim_key, victim);
            }
            (previous, evicted)
        };

        if let Some((victim_key, _)) = evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %victim_key, "Evicted least recently used entry");
        }
        previous
    }

    /// Remove the entry for `key` and all of its tag associations.
    pub fn delete_key(&self, key: &CacheKey) -> bool {
        let removed = self.write().unlink(key);
        removed.is_some()
    }

    /// Remove every entry carrying `tag`, including their other tags.
    ///
    /// Returns the number of entries removed.
    pub fn delete_by_tag(&self, tag: &Tag) -> usize {
        let removed: Vec<_> = {
            let mut inner = self.write();
            let Some(keys) = inner.tag_index.remove(tag) else {
                return 0;
            };
            keys.iter().filter_map(|key| inner.unlink(key)).collect()
        };
        removed.len()
    }

    /// Clear the table and the tag index. Returns the number of entries removed.
    pub fn delete_all(&self) -> usize {
        let mut inner = self.write();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.tag_index.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Entries evicted by the size bound since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.read().entries.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Keys currently associated with `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> Vec<CacheKey> {
        self.read()
            .tag_index
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tag_count(&self) -> usize {
        self.read().tag_index.len()
    }

    /// Verify that the table and the tag index agree.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let inner = self.read();

        if inner.entries.len() > self.max_entries {
            return Err(InvariantViolation::OverCapacity {
                len: inner.entries.len(),
                max: self.max_entries,
            });
        }

        for (tag, keys) in &inner.tag_index {
            if keys.is_empty() {
                return Err(InvariantViolation::EmptyTagBucket { tag: tag.clone() });
            }
            for key in keys {
                match inner.entries.peek(key) {
                    Some(entry) if entry.has_tag(tag) => {}
                    _ => {
                        return Err(InvariantViolation::DanglingTagReference {
                            tag: tag.clone(),
                            key: key.clone(),
                        })
                    }
                }
            }
        }

        for (slot_key, entry) in inner.entries.iter() {
            if entry.key() != slot_key {
                return Err(InvariantViolation::KeyMismatch {
                    slot: slot_key.clone(),
                    key: entry.key().clone(),
                });
            }
            for tag in entry.tags() {
                let indexed = inner
                    .tag_index
                    .get(tag)
                    .is_some_and(|keys| keys.contains(slot_key));
                if !indexed {
                    return Err(InvariantViolation::MissingTagReference {
                        tag: tag.clone(),
                        key: slot_key.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
