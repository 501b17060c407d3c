//! Engine configuration.

use marquee_core::ConfigError;

/// Configuration for the fetch cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries kept before least recently used ones are
    /// evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MARQUEE_CACHE_MAX_ENTRIES`: entry bound (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("MARQUEE_CACHE_MAX_ENTRIES") {
            config.max_entries = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "MARQUEE_CACHE_MAX_ENTRIES".to_string(),
                value: raw.clone(),
                reason: "must be a non-negative integer".to_string(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_entries".to_string(),
                value: "0".to_string(),
                reason: "cache must hold at least one entry".to_string(),
            });
        }
        Ok(())
    }
}
