//! Identity types for cached resources

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Logical identifier for one cacheable resource.
///
/// Two resolutions with equal keys are requests for the same resource and
/// share one cache slot. Keys are usually a resource path plus its query
/// parameters, see [`CacheKey::from_parts`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key from a resource path and query parameters.
    ///
    /// Parameters are sorted by name so that `?b=2&a=1` and `?a=1&b=2`
    /// address the same slot.
    pub fn from_parts<K, V>(path: &str, params: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if params.is_empty() {
            return Self(path.to_string());
        }

        let mut pairs: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();
        pairs.sort();

        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        Self(format!("{}?{}", path, query))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque label used to invalidate groups of entries at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Set of tags attached to one entry.
pub type TagSet = BTreeSet<Tag>;

/// Collect anything tag-like into a [`TagSet`].
pub fn tag_set<I, T>(tags: I) -> TagSet
where
    I: IntoIterator<Item = T>,
    T: Into<Tag>,
{
    tags.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_parts_sorts_params() {
        let a = CacheKey::from_parts("/api/v1/movies", &[("rating", "top"), ("limit", "3")]);
        let b = CacheKey::from_parts("/api/v1/movies", &[("limit", "3"), ("rating", "top")]);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/api/v1/movies?limit=3&rating=top");
    }

    #[test]
    fn test_key_from_parts_without_params() {
        let empty: &[(&str, &str)] = &[];
        let key = CacheKey::from_parts("/api/v1/cinemas", empty);
        assert_eq!(key.as_str(), "/api/v1/cinemas");
    }

    #[test]
    fn test_tag_set_dedupes() {
        let tags = tag_set(["movies", "movie-4", "movies"]);
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("movie-4"));
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let key = CacheKey::new("/api/v1/metrics");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"/api/v1/metrics\"");
    }
}
