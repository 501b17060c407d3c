//! The gateway: the single entry point for cached resolutions.
//!
//! A resolution reads the slot, classifies it against the caller's policy
//! and either returns the stored value or runs (or joins) one origin call
//! through the [`Coalescer`]. The origin task re-checks the slot before
//! calling the origin, so a caller that read the slot just before another
//! leader finished does not start a second call for the same episode.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use marquee_core::{
    CacheKey, FreshnessPolicy, MarqueeError, MarqueeResult, OriginError, TagSet, Timestamp,
};

use super::clock::SystemClock;
use super::coalescer::{Coalescer, Role};
use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::freshness::{classify, CacheRead, Freshness, Outcome};
use super::invalidation::InvalidationController;
use super::store::CacheStore;
use super::traits::{CacheCounters, CacheStats, Clock};

/// Output of an origin task, shared by every waiter of the episode.
#[derive(Clone)]
struct Resolved<V> {
    value: V,
    fetched_at: Timestamp,
    from_origin: bool,
}

/// Fetch cache with freshness policies, coalescing and tag invalidation.
///
/// Construct one per process and share it by `Arc`.
///
/// # Example
///
/// ```ignore
/// let gateway = Arc::new(CacheGateway::new(CacheConfig::default())?);
///
/// let cinemas = gateway
///     .resolve(
///         "/api/v1/cinemas",
///         FreshnessPolicy::Immutable,
///         tag_set(["cinemas"]),
///         move || async move { upstream.get_json("/api/v1/cinemas").await },
///     )
///     .await?;
///
/// gateway.invalidation().invalidate_tag("cinemas");
/// ```
pub struct CacheGateway<V> {
    store: Arc<CacheStore<V>>,
    coalescer: Coalescer<Resolved<V>>,
    clock: Arc<dyn Clock>,
    counters: Arc<CacheCounters>,
    config: CacheConfig,
}

impl<V> CacheGateway<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a gateway reading the wall clock.
    pub fn new(config: CacheConfig) -> MarqueeResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a gateway with default configuration.
    pub fn with_defaults() -> Self {
        Self::build(CacheConfig::default(), Arc::new(SystemClock))
    }

    /// Create a gateway reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> MarqueeResult<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(CacheStore::new(config.max_entries)),
            coalescer: Coalescer::new(),
            clock,
            counters: Arc::new(CacheCounters::default()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore<V> {
        &self.store
    }

    /// Handle for administrative invalidation against this gateway's store.
    pub fn invalidation(&self) -> InvalidationController<V> {
        InvalidationController::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.counters),
        )
    }

    /// Resolve `key` under `policy`, calling `origin` only when needed.
    ///
    /// Origin failures are returned as [`MarqueeError::OriginFailure`] to
    /// every caller of the episode and nothing is stored.
    pub async fn resolve<F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        policy: FreshnessPolicy,
        tags: TagSet,
        origin: F,
    ) -> MarqueeResult<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, OriginError>> + Send + 'static,
    {
        self.resolve_read(key, policy, tags, origin)
            .await
            .map(CacheRead::into_value)
    }

    /// Like [`resolve`](Self::resolve), but reports where the value came from.
    pub async fn resolve_read<F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        policy: FreshnessPolicy,
        tags: TagSet,
        origin: F,
    ) -> MarqueeResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, OriginError>> + Send + 'static,
    {
        policy.validate()?;
        let key = key.into();
        let started = Instant::now();

        let current = self.store.get(&key);
        let freshness = classify(current.as_deref(), policy, self.clock.now());
        if let (Freshness::Fresh, Some(entry)) = (freshness, current.as_ref()) {
            CacheCounters::bump(&self.counters.hits);
            tracing::debug!(
                key = %key,
                outcome = %Outcome::Hit,
                elapsed_us = started.elapsed().as_micros() as u64,
                "Resolved"
            );
            return Ok(CacheRead::new(
                entry.value().clone(),
                entry.inserted_at(),
                Outcome::Hit,
            ));
        }
        drop(current);

        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let counters = Arc::clone(&self.counters);
        let task_key = key.clone();
        let waiter = self.coalescer.join(key.clone(), move || async move {
            if let Some(entry) = store.get(&task_key) {
                if classify(Some(entry.as_ref()), policy, clock.now()).is_fresh() {
                    return Ok(Resolved {
                        value: entry.value().clone(),
                        fetched_at: entry.inserted_at(),
                        from_origin: false,
                    });
                }
            }

            CacheCounters::bump(&counters.origin_calls);
            match origin().await {
                Ok(value) => {
                    let fetched_at = clock.now();
                    if policy.is_cacheable() {
                        store.put(CacheEntry::new(
                            task_key,
                            value.clone(),
                            policy,
                            tags,
                            fetched_at,
                        ));
                    }
                    Ok(Resolved {
                        value,
                        fetched_at,
                        from_origin: true,
                    })
                }
                Err(err) => {
                    CacheCounters::bump(&counters.origin_failures);
                    tracing::warn!(key = %task_key, error = %err, "Origin call failed");
                    Err(err)
                }
            }
        });

        let role = waiter.role();
        let resolved = waiter
            .await
            .map_err(|source| MarqueeError::origin(key.clone(), source))?;

        let outcome = match role {
            Role::Follower => Outcome::Joined,
            Role::Leader if !resolved.from_origin => Outcome::Hit,
            Role::Leader if policy.is_cacheable() => Outcome::Miss,
            Role::Leader => Outcome::Bypass,
        };
        let counter = match outcome {
            Outcome::Hit => &self.counters.hits,
            Outcome::Miss => &self.counters.misses,
            Outcome::Joined => &self.counters.joins,
            Outcome::Bypass | Outcome::Stale => &self.counters.bypasses,
        };
        CacheCounters::bump(counter);

        tracing::debug!(
            key = %key,
            policy = %policy,
            was = %freshness,
            outcome = %outcome,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Resolved"
        );
        Ok(CacheRead::new(resolved.value, resolved.fetched_at, outcome))
    }

    /// Resolve, falling back to the last stored value if the origin fails.
    ///
    /// Only origin failures fall back; policy errors are returned as is.
    pub async fn resolve_or_stale<F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        policy: FreshnessPolicy,
        tags: TagSet,
        origin: F,
    ) -> MarqueeResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, OriginError>> + Send + 'static,
    {
        let key = key.into();
        match self.resolve_read(key.clone(), policy, tags, origin).await {
            Err(err @ MarqueeError::OriginFailure { .. }) => match self.last_known(&key) {
                Some(read) => {
                    tracing::warn!(key = %key, error = %err, "Serving stale value after origin failure");
                    Ok(read)
                }
                None => Err(err),
            },
            other => other,
        }
    }

    /// The stored value for `key` regardless of freshness.
    pub fn last_known(&self, key: &CacheKey) -> Option<CacheRead<V>> {
        self.store
            .get(key)
            .map(|entry| CacheRead::new(entry.value().clone(), entry.inserted_at(), Outcome::Stale))
    }

    /// The stored entry for `key`, if any.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry<V>>> {
        self.store.peek(key)
    }

    /// Classify `key` under `policy` without resolving it.
    pub fn classify(&self, key: &CacheKey, policy: FreshnessPolicy) -> Freshness {
        let current = self.store.peek(key);
        classify(current.as_deref(), policy, self.clock.now())
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.coalescer.is_in_flight(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            evictions: self.store.evictions(),
            entry_count: self.store.len() as u64,
            in_flight: self.coalescer.in_flight() as u64,
            ..self.counters.snapshot()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use marquee_core::tag_set;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn gateway(clock: Arc<ManualClock>) -> CacheGateway<String> {
        CacheGateway::with_clock(CacheConfig::default(), clock).unwrap()
    }

    async fn fetch(
        gateway: &CacheGateway<String>,
        policy: FreshnessPolicy,
        calls: &Arc<AtomicUsize>,
    ) -> MarqueeResult<CacheRead<String>> {
        let calls = Arc::clone(calls);
        gateway
            .resolve_read("/api/v1/metrics", policy, tag_set(["metrics"]), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("v{}", n))
            })
            .await
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let clock = Arc::new(ManualClock::starting_now());
        let gateway = gateway(Arc::clone(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = fetch(&gateway, FreshnessPolicy::Immutable, &calls).await.unwrap();
        assert_eq!(first.outcome(), Outcome::Miss);
        let second = fetch(&gateway, FreshnessPolicy::Immutable, &calls).await.unwrap();
        assert_eq!(second.outcome(), Outcome::Hit);
        assert_eq!(second.into_value(), "v1");

        let stats = gateway.stats();
        assert_eq!((stats.hits, stats.misses, stats.origin_calls), (1, 1, 1));
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_no_store_writes_nothing() {
        let clock = Arc::new(ManualClock::starting_now());
        let gateway = gateway(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let read = fetch(&gateway, FreshnessPolicy::NoStore, &calls).await.unwrap();
        assert_eq!(read.outcome(), Outcome::Bypass);
        assert!(gateway.store().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_policy_never_reaches_origin() {
        let clock = Arc::new(ManualClock::starting_now());
        let gateway = gateway(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = fetch(&gateway, FreshnessPolicy::Ttl(-1), &calls).await.unwrap_err();
        assert!(matches!(err, MarqueeError::InvalidPolicy(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.stats().origin_calls, 0);
    }

    #[tokio::test]
    async fn test_stale_entry_survives_failed_refresh() {
        let clock = Arc::new(ManualClock::starting_now());
        let gateway = gateway(Arc::clone(&clock));
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = FreshnessPolicy::Ttl(5);

        fetch(&gateway, policy, &calls).await.unwrap();
        clock.advance(Duration::from_secs(6));

        let key = CacheKey::new("/api/v1/metrics");
        assert_eq!(gateway.classify(&key, policy), Freshness::Stale);

        let read = gateway
            .resolve_or_stale(key.clone(), policy, tag_set(["metrics"]), || async {
                Err(OriginError::Unavailable {
                    reason: "connection refused".to_string(),
                })
            })
            .await
            .unwrap();
        assert_eq!(read.outcome(), Outcome::Stale);
        assert_eq!(read.into_value(), "v1");
        assert_eq!(gateway.peek(&key).map(|e| e.value().clone()), Some("v1".to_string()));
        assert_eq!(gateway.stats().origin_failures, 1);
    }

    #[tokio::test]
    async fn test_resolve_or_stale_without_entry_propagates() {
        let clock = Arc::new(ManualClock::starting_now());
        let gateway = gateway(clock);

        let err = gateway
            .resolve_or_stale("k", FreshnessPolicy::Ttl(5), TagSet::new(), || async {
                Err(OriginError::other("boom"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.as_origin(), Some(&OriginError::other("boom")));
    }

    #[test]
    fn test_zero_capacity_config_is_rejected() {
        let result = CacheGateway::<String>::new(CacheConfig::new().with_max_entries(0));
        assert!(matches!(result, Err(MarqueeError::Config(_))));
    }
}
