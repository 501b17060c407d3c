//! MARQUEE Cache - fetch cache engine
//!
//! Resolves keyed resources through an in-process cache governed by
//! per-call freshness policies, with request coalescing and tag-based
//! invalidation. The HTTP surface lives in marquee-api.

pub mod cache;

pub use cache::{
    classify, CacheConfig, CacheEntry, CacheGateway, CacheRead, CacheStats, CacheStore, Clock,
    Coalescer, Freshness, InvalidationController, InvalidationReport, InvalidationScope,
    InvariantViolation, ManualClock, Outcome, Role, SystemClock, Waiter,
};

// Re-exported so callers only need one import for the common types.
pub use marquee_core::{
    tag_set, CacheKey, FreshnessPolicy, MarqueeError, MarqueeResult, OriginError, Tag, TagSet,
    Timestamp,
};
