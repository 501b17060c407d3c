//! Freshness policies attached to each resolution.

use crate::error::PolicyError;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How long a fetched value may be reused before it must be refetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "snake_case")]
pub enum FreshnessPolicy {
    /// Reused until explicitly invalidated.
    Immutable,
    /// Reused for the given number of seconds after insertion.
    Ttl(i64),
    /// Never stored; every resolution reaches the origin.
    NoStore,
}

impl FreshnessPolicy {
    /// TTL policy from a std duration, truncated to whole seconds.
    pub fn ttl(duration: Duration) -> Self {
        Self::Ttl(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }

    /// Reject policies the evaluator cannot apply.
    pub fn validate(&self) -> Result<(), PolicyError> {
        match self {
            Self::Ttl(seconds) if *seconds < 0 => {
                Err(PolicyError::NegativeTtl { seconds: *seconds })
            }
            Self::Ttl(seconds) if TimeDelta::try_seconds(*seconds).is_none() => {
                Err(PolicyError::TtlOutOfRange { seconds: *seconds })
            }
            _ => Ok(()),
        }
    }

    /// Lifetime of a value under this policy, if it is time-bounded.
    pub fn max_age(&self) -> Option<TimeDelta> {
        match self {
            Self::Ttl(seconds) => TimeDelta::try_seconds(*seconds),
            Self::Immutable | Self::NoStore => None,
        }
    }

    /// Whether values resolved under this policy are written to the store.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::NoStore)
    }
}

impl fmt::Display for FreshnessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immutable => f.write_str("immutable"),
            Self::Ttl(seconds) => write!(f, "ttl:{}", seconds),
            Self::NoStore => f.write_str("no-store"),
        }
    }
}

impl FromStr for FreshnessPolicy {
    type Err = PolicyError;

    /// Parses `immutable`, `no-store` and `ttl:<seconds>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let policy = match normalized.as_str() {
            "immutable" | "force-cache" => Self::Immutable,
            "no-store" | "no_store" => Self::NoStore,
            other => {
                let seconds = other
                    .strip_prefix("ttl:")
                    .and_then(|n| n.trim().parse::<i64>().ok())
                    .ok_or_else(|| PolicyError::Unrecognized {
                        value: s.to_string(),
                    })?;
                Self::Ttl(seconds)
            }
        };
        policy.validate()?;
        Ok(policy)
    }
}
