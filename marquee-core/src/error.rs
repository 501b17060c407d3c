//! Error types for MARQUEE operations

use crate::CacheKey;
use std::time::Duration;
use thiserror::Error;

/// Freshness policy errors, raised before any cache or origin work.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("TTL must not be negative, got {seconds}s")]
    NegativeTtl { seconds: i64 },

    #[error("TTL of {seconds}s is out of range")]
    TtlOutOfRange { seconds: i64 },

    #[error("Unrecognized freshness policy: {value}")]
    Unrecognized { value: String },
}

/// Failure reported by an origin call.
///
/// Cloneable because one failed origin call is delivered to every waiter
/// that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OriginError {
    #[error("Upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Upstream unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Upstream timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Invalid upstream payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("{message}")]
    Other { message: String },
}

impl OriginError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OriginError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload {
            reason: err.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all MARQUEE errors.
#[derive(Debug, Clone, Error)]
pub enum MarqueeError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("Origin failure for {key}: {source}")]
    OriginFailure {
        key: CacheKey,
        #[source]
        source: OriginError,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl MarqueeError {
    pub fn origin(key: CacheKey, source: OriginError) -> Self {
        Self::OriginFailure { key, source }
    }

    /// The origin error, if this is an origin failure.
    pub fn as_origin(&self) -> Option<&OriginError> {
        match self {
            Self::OriginFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for MARQUEE operations.
pub type MarqueeResult<T> = Result<T, MarqueeError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_display_negative_ttl() {
        let err = PolicyError::NegativeTtl { seconds: -3 };
        let msg = format!("{}", err);
        assert!(msg.contains("negative"));
        assert!(msg.contains("-3"));
    }

    #[test]
    fn test_origin_error_display_status() {
        let err = OriginError::Status {
            status: 503,
            message: "maintenance".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("503"));
        assert!(msg.contains("maintenance"));
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_origin_failure_carries_key() {
        let err = MarqueeError::origin(
            CacheKey::new("/api/v1/cinemas"),
            OriginError::other("boom"),
        );
        let msg = format!("{}", err);
        assert!(msg.contains("/api/v1/cinemas"));
        assert!(msg.contains("boom"));
        assert_eq!(err.as_origin(), Some(&OriginError::other("boom")));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "max_entries".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("max_entries"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_marquee_error_from_variants() {
        let policy = MarqueeError::from(PolicyError::NegativeTtl { seconds: -1 });
        assert!(matches!(policy, MarqueeError::InvalidPolicy(_)));
        assert!(policy.as_origin().is_none());

        let config = MarqueeError::from(ConfigError::InvalidValue {
            field: "max_entries".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
        assert!(matches!(config, MarqueeError::Config(_)));
    }

    #[test]
    fn test_json_error_becomes_invalid_payload() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = OriginError::from(json_err);
        assert!(matches!(err, OriginError::InvalidPayload { .. }));
    }
}
