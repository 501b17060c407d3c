//! MARQUEE Test Utilities
//!
//! Shared test infrastructure for the MARQUEE workspace:
//! - Proptest generators for keys, tags, policies and store operations
//! - A scripted origin that counts its calls
//! - Fixtures with the cinema catalog's payload shapes
//! - Assertions for cache-specific checks

pub use marquee_cache::{
    CacheConfig, CacheEntry, CacheGateway, CacheRead, CacheStats, CacheStore, ManualClock,
    Outcome,
};
pub use marquee_core::{
    tag_set, CacheKey, FreshnessPolicy, MarqueeError, MarqueeResult, OriginError, Tag, TagSet,
    Timestamp,
};

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// COUNTING ORIGIN
// ============================================================================

/// Origin double that counts calls and replays a script.
///
/// Each call pops the next scripted response. Once the script is exhausted
/// the origin answers with `"{prefix}-{n}"`, where `n` is the 1-based call
/// number, so successive fetches are distinguishable.
#[derive(Clone)]
pub struct CountingOrigin {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Result<serde_json::Value, OriginError>>>>,
    prefix: String,
    delay: Duration,
}

impl Default for CountingOrigin {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingOrigin {
    pub fn new() -> Self {
        Self::with_prefix("v")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            prefix: prefix.into(),
            delay: Duration::ZERO,
        }
    }

    /// Sleep for `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a successful response.
    pub fn then_ok(self, value: serde_json::Value) -> Self {
        self.push(Ok(value));
        self
    }

    /// Queue a failing response.
    pub fn then_err(self, error: OriginError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, response: Result<serde_json::Value, OriginError>) {
        self.lock_script().push_back(response);
    }

    fn lock_script(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<serde_json::Value, OriginError>>> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of times the origin has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Build an origin closure suitable for `CacheGateway::resolve`.
    pub fn origin(
        &self,
    ) -> impl FnOnce() -> std::pin::Pin<
        Box<dyn Future<Output = Result<serde_json::Value, OriginError>> + Send>,
    > + Send
           + 'static {
        let this = self.clone();
        move || {
            Box::pin(async move {
                let n = this.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if !this.delay.is_zero() {
                    tokio::time::sleep(this.delay).await;
                }
                let scripted = this.lock_script().pop_front();
                scripted.unwrap_or_else(|| {
                    Ok(serde_json::Value::String(format!("{}-{}", this.prefix, n)))
                })
            })
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache inputs.

    use super::*;
    use proptest::prelude::*;

    /// Generate a valid freshness policy.
    pub fn arb_policy() -> impl Strategy<Value = FreshnessPolicy> {
        prop_oneof![
            Just(FreshnessPolicy::Immutable),
            Just(FreshnessPolicy::NoStore),
            (0i64..86_400).prop_map(FreshnessPolicy::Ttl),
        ]
    }

    /// Generate a key from a small space so collisions are common.
    pub fn arb_key() -> impl Strategy<Value = CacheKey> {
        prop_oneof![
            Just(CacheKey::new("/api/v1/cinemas")),
            Just(CacheKey::new("/api/v1/movies?rating=top")),
            Just(CacheKey::new("/api/v1/metrics")),
            (1u8..6).prop_map(|id| CacheKey::new(format!("/api/v1/movies/{}", id))),
            (1u8..4).prop_map(|id| CacheKey::new(format!("/api/v1/cinemas/{}/movies", id))),
        ]
    }

    /// Generate a tag drawn from the catalog's vocabulary.
    pub fn arb_tag() -> impl Strategy<Value = Tag> {
        prop_oneof![
            Just(Tag::new("cinemas")),
            Just(Tag::new("movies")),
            Just(Tag::new("top-movies")),
            Just(Tag::new("sessions")),
            Just(Tag::new("metrics")),
            (1u8..6).prop_map(|id| Tag::new(format!("movie-{}", id))),
        ]
    }

    /// Generate a (possibly empty) tag set.
    pub fn arb_tags() -> impl Strategy<Value = TagSet> {
        prop::collection::btree_set(arb_tag(), 0..4)
    }

    /// A single mutation or read against a store.
    #[derive(Debug, Clone)]
    pub enum StoreOp {
        Put { key: CacheKey, tags: TagSet },
        Get(CacheKey),
        DeleteKey(CacheKey),
        DeleteTag(Tag),
        DeleteAll,
    }

    impl StoreOp {
        /// Apply this operation to `store`, writing `value` on puts.
        pub fn apply<V>(&self, store: &CacheStore<V>, value: V, now: Timestamp) {
            match self {
                StoreOp::Put { key, tags } => {
                    store.put(CacheEntry::new(
                        key.clone(),
                        value,
                        FreshnessPolicy::Immutable,
                        tags.clone(),
                        now,
                    ));
                }
                StoreOp::Get(key) => {
                    store.get(key);
                }
                StoreOp::DeleteKey(key) => {
                    store.delete_key(key);
                }
                StoreOp::DeleteTag(tag) => {
                    store.delete_by_tag(tag);
                }
                StoreOp::DeleteAll => {
                    store.delete_all();
                }
            }
        }
    }

    /// Generate a sequence of store operations, weighted towards puts.
    pub fn arb_store_ops(max_len: usize) -> impl Strategy<Value = Vec<StoreOp>> {
        let op = prop_oneof![
            6 => (arb_key(), arb_tags()).prop_map(|(key, tags)| StoreOp::Put { key, tags }),
            3 => arb_key().prop_map(StoreOp::Get),
            2 => arb_key().prop_map(StoreOp::DeleteKey),
            2 => arb_tag().prop_map(StoreOp::DeleteTag),
            1 => Just(StoreOp::DeleteAll),
        ];
        prop::collection::vec(op, 1..max_len.max(2))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Payloads shaped like the cinema catalog's upstream responses.

    use serde_json::{json, Value};

    pub fn cinemas() -> Value {
        json!([
            { "id": 1, "name": "Cine Callao", "city": "Madrid" },
            { "id": 2, "name": "Cines Verdi", "city": "Barcelona" }
        ])
    }

    pub fn movie(id: u64) -> Value {
        json!({
            "id": id,
            "title": format!("Movie {}", id),
            "rating": 4.5,
            "poster": "/film-poster.jpg"
        })
    }

    /// Sessions for a cinema, each with its own showtimes.
    pub fn sessions(movie_ids: &[u64]) -> Value {
        Value::Array(
            movie_ids
                .iter()
                .map(|id| {
                    json!({
                        "id": id,
                        "showtimes": ["18:00", "21:30"],
                        "format": "2D"
                    })
                })
                .collect(),
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache-specific validation.

    use super::*;

    /// Assert that the store's tag index agrees with its entries.
    #[track_caller]
    pub fn assert_store_consistent<V>(store: &CacheStore<V>) {
        if let Err(violation) = store.check_invariants() {
            panic!("Store invariant violated: {}", violation);
        }
    }

    /// Assert that a resolution failed because of the origin.
    #[track_caller]
    pub fn assert_origin_failure<T: std::fmt::Debug>(result: &MarqueeResult<T>) {
        match result {
            Err(MarqueeError::OriginFailure { .. }) => {}
            other => panic!("Expected OriginFailure, got: {:?}", other),
        }
    }

    /// Assert that a resolution was rejected for its policy.
    #[track_caller]
    pub fn assert_invalid_policy<T: std::fmt::Debug>(result: &MarqueeResult<T>) {
        match result {
            Err(MarqueeError::InvalidPolicy(_)) => {}
            other => panic!("Expected InvalidPolicy, got: {:?}", other),
        }
    }

    /// Assert the outcome of a cache read.
    #[track_caller]
    pub fn assert_outcome<T>(read: &CacheRead<T>, expected: Outcome) {
        assert_eq!(read.outcome(), expected, "Unexpected resolution outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_counting_origin_replays_script_then_numbers() {
        let origin = CountingOrigin::new()
            .then_ok(serde_json::json!("scripted"))
            .then_err(OriginError::other("down"));

        assert_eq!((origin.origin())().await.unwrap(), "scripted");
        assert_eq!((origin.origin())().await.unwrap_err(), OriginError::other("down"));
        assert_eq!((origin.origin())().await.unwrap(), "v-3");
        assert_eq!(origin.calls(), 3);
    }

    #[test]
    fn test_fixture_sessions_shape() {
        let sessions = fixtures::sessions(&[1, 2]);
        assert_eq!(sessions.as_array().map(Vec::len), Some(2));
        assert_eq!(sessions[0]["id"], 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_policies_validate(policy in arb_policy()) {
            prop_assert!(policy.validate().is_ok());
        }

        #[test]
        fn prop_store_ops_keep_index_consistent(
            ops in arb_store_ops(40),
            capacity in 1usize..6,
        ) {
            let store = CacheStore::new(capacity);
            let now = chrono::Utc::now();
            for (i, op) in ops.iter().enumerate() {
                op.apply(&store, i, now);
                assert_store_consistent(&store);
            }
        }
    }
}
