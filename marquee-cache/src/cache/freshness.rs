//! Freshness classification and cache read results.
//!
//! [`classify`] is the pure decision function the gateway consults before
//! touching the origin. [`CacheRead`] tells the caller where the value it
//! got came from.

use marquee_core::{FreshnessPolicy, Timestamp};
use serde::Serialize;
use std::fmt;

use super::entry::CacheEntry;

/// State of a cache slot with respect to a freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// The stored value may be served as is.
    Fresh,
    /// A value is stored but must be refetched.
    Stale,
    /// Nothing is stored for the key.
    Absent,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("fresh"),
            Self::Stale => f.write_str("stale"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

/// Classify a slot under `policy` at time `now`.
///
/// Deterministic and side-effect free. The caller's policy wins over the
/// policy the entry was stored with.
pub fn classify<V>(
    entry: Option<&CacheEntry<V>>,
    policy: FreshnessPolicy,
    now: Timestamp,
) -> Freshness {
    let Some(entry) = entry else {
        return Freshness::Absent;
    };

    match policy {
        FreshnessPolicy::NoStore => Freshness::Stale,
        FreshnessPolicy::Immutable => Freshness::Fresh,
        FreshnessPolicy::Ttl(_) => match policy.max_age() {
            Some(max_age) if entry.age(now) < max_age => Freshness::Fresh,
            _ => Freshness::Stale,
        },
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Served from a fresh entry.
    Hit,
    /// This caller ran the origin call and stored its result.
    Miss,
    /// This caller waited on an origin call started by another caller.
    Joined,
    /// Origin call under `NoStore`; nothing was stored.
    Bypass,
    /// Previous or fallback value served after a failed refresh.
    Stale,
}

impl Outcome {
    /// Upper-case label used in logs and response headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Joined => "JOINED",
            Self::Bypass => "BYPASS",
            Self::Stale => "STALE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a resolution, carrying provenance metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the value was obtained from the origin.
    fetched_at: Timestamp,
    outcome: Outcome,
}

impl<T> CacheRead<T> {
    pub fn new(value: T, fetched_at: Timestamp, outcome: Outcome) -> Self {
        Self {
            value,
            fetched_at,
            outcome,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// True if no origin call was needed on behalf of this caller.
    pub fn was_cache_hit(&self) -> bool {
        self.outcome == Outcome::Hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            outcome: self.outcome,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use marquee_core::{CacheKey, TagSet};

    fn entry_at(at: Timestamp) -> CacheEntry<&'static str> {
        CacheEntry::new(
            CacheKey::new("/api/v1/cinemas"),
            "madrid",
            FreshnessPolicy::Immutable,
            TagSet::new(),
            at,
        )
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Hit.as_str(), "HIT");
        assert_eq!(Outcome::Joined.to_string(), "JOINED");
        assert_eq!(Outcome::Stale.to_string(), Outcome::Stale.as_str());
    }

    #[test]
    fn test_absent_without_entry() {
        let now = Utc::now();
        for policy in [
            FreshnessPolicy::Immutable,
            FreshnessPolicy::Ttl(5),
            FreshnessPolicy::NoStore,
        ] {
            assert_eq!(
                classify::<&str>(None, policy, now),
                Freshness::Absent
            );
        }
    }

    #[test]
    fn test_no_store_is_always_stale() {
        let now = Utc::now();
        let entry = entry_at(now);
        assert_eq!(
            classify(Some(&entry), FreshnessPolicy::NoStore, now),
            Freshness::Stale
        );
    }

    #[test]
    fn test_immutable_never_expires() {
        let t0 = Utc::now();
        let entry = entry_at(t0);
        let much_later = t0 + TimeDelta::days(365);
        assert_eq!(
            classify(Some(&entry), FreshnessPolicy::Immutable, much_later),
            Freshness::Fresh
        );
    }

    #[test]
    fn test_ttl_boundary_is_exclusive() {
        let t0 = Utc::now();
        let entry = entry_at(t0);
        let policy = FreshnessPolicy::Ttl(5);

        assert_eq!(classify(Some(&entry), policy, t0), Freshness::Fresh);
        assert_eq!(
            classify(Some(&entry), policy, t0 + TimeDelta::seconds(4)),
            Freshness::Fresh
        );
        assert_eq!(
            classify(Some(&entry), policy, t0 + TimeDelta::seconds(5)),
            Freshness::Stale
        );
        assert_eq!(
            classify(Some(&entry), policy, t0 + TimeDelta::seconds(6)),
            Freshness::Stale
        );
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        let t0 = Utc::now();
        let entry = entry_at(t0);
        assert_eq!(
            classify(Some(&entry), FreshnessPolicy::Ttl(0), t0),
            Freshness::Stale
        );
    }

    #[test]
    fn test_cache_read_map_keeps_metadata() {
        let at = Utc::now();
        let read = CacheRead::new(42i32, at, Outcome::Joined);
        let mapped = read.map(|v| v.to_string());
        assert_eq!(mapped.outcome(), Outcome::Joined);
        assert_eq!(mapped.fetched_at(), at);
        assert!(!mapped.was_cache_hit());
        assert_eq!(mapped.into_value(), "42");
    }

    #[test]
    fn test_outcome_display_matches_log_labels() {
        assert_eq!(Outcome::Hit.to_string(), "HIT");
        assert_eq!(Outcome::Miss.to_string(), "MISS");
    }
}
