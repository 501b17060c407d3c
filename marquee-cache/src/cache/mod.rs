//! Fetch cache with explicit freshness policies.
//!
//! Every resolution names a [`FreshnessPolicy`](marquee_core::FreshnessPolicy)
//! and a set of tags. The gateway serves fresh entries from the store, funnels
//! concurrent misses for one key into a single origin call and writes the
//! result back unless the policy is `NoStore`. Tags allow administrative
//! invalidation of whole groups of entries.
//!
//! # Example
//!
//! ```ignore
//! let gateway = CacheGateway::new(CacheConfig::from_env()?)?;
//!
//! let read = gateway
//!     .resolve_read(
//!         "/api/v1/movies?rating=top",
//!         FreshnessPolicy::Ttl(30),
//!         tag_set(["top-movies"]),
//!         || fetch_top_movies(),
//!     )
//!     .await?;
//!
//! if !read.was_cache_hit() {
//!     tracing::info!(outcome = %read.outcome(), "Fetched top movies");
//! }
//! ```

pub mod clock;
pub mod coalescer;
pub mod config;
pub mod entry;
pub mod freshness;
pub mod gateway;
pub mod invalidation;
pub mod store;
pub mod traits;

pub use clock::{ManualClock, SystemClock};
pub use coalescer::{Coalescer, Role, Waiter};
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use freshness::{classify, CacheRead, Freshness, Outcome};
pub use gateway::CacheGateway;
pub use invalidation::{InvalidationController, InvalidationReport, InvalidationScope};
pub use store::{CacheStore, InvariantViolation};
pub use traits::{CacheStats, Clock};
