//! MARQUEE Core - Shared Types
//!
//! Keys, tags, freshness policies and errors used by the fetch cache and the
//! services that embed it. This crate contains ONLY data types - no caching
//! logic.

pub mod error;
pub mod identity;
pub mod policy;

pub use error::{ConfigError, MarqueeError, MarqueeResult, OriginError, PolicyError};
pub use identity::{tag_set, CacheKey, Tag, TagSet, Timestamp};
pub use policy::FreshnessPolicy;
