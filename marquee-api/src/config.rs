//! API Configuration Module
//!
//! Server settings loaded from environment variables with defaults suitable
//! for local development against the mock cinema API.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use marquee_cache::CacheConfig;
use marquee_core::ConfigError;

/// Default upstream: the mock cinema API the catalog was written against.
pub const DEFAULT_UPSTREAM_URL: &str = "https://mock.apidog.com/m1/1172760-1166489-default";

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// Base URL of the cinema API every catalog path is appended to.
    pub upstream_url: String,

    /// Per-request timeout for upstream calls.
    pub upstream_timeout: Duration,

    /// Bearer token required on the revalidation routes.
    /// `None` leaves them open (dev mode).
    pub admin_token: Option<String>,

    /// Engine settings.
    pub cache: CacheConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_timeout: Duration::from_secs(10),
            admin_token: None,
            cache: CacheConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MARQUEE_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `MARQUEE_API_PORT`: Listen port (default: 3000)
    /// - `MARQUEE_UPSTREAM_URL`: Cinema API base URL (default: the mock API)
    /// - `MARQUEE_UPSTREAM_TIMEOUT_SECS`: Upstream timeout (default: 10)
    /// - `MARQUEE_ADMIN_TOKEN`: Bearer token for revalidation routes (default: unset)
    /// - `MARQUEE_CACHE_MAX_ENTRIES`: Cache entry bound (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_host = lookup("MARQUEE_API_BIND").unwrap_or(defaults.bind_host);

        let port = match lookup("PORT").or_else(|| lookup("MARQUEE_API_PORT")) {
            Some(raw) => parse_field("PORT", &raw, "must be a port number")?,
            None => defaults.port,
        };

        let upstream_url = lookup("MARQUEE_UPSTREAM_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.upstream_url);
        if !(upstream_url.starts_with("http://") || upstream_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "MARQUEE_UPSTREAM_URL".to_string(),
                value: upstream_url,
                reason: "must be an http(s) URL".to_string(),
            });
        }

        let upstream_timeout = match lookup("MARQUEE_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_field(
                "MARQUEE_UPSTREAM_TIMEOUT_SECS",
                &raw,
                "must be a whole number of seconds",
            )?),
            None => defaults.upstream_timeout,
        };

        let admin_token = lookup("MARQUEE_ADMIN_TOKEN").filter(|token| !token.trim().is_empty());

        let mut cache = defaults.cache;
        if let Some(raw) = lookup("MARQUEE_CACHE_MAX_ENTRIES") {
            cache = cache.with_max_entries(parse_field(
                "MARQUEE_CACHE_MAX_ENTRIES",
                &raw,
                "must be a non-negative integer",
            )?);
        }
        cache.validate()?;

        Ok(Self {
            bind_host,
            port,
            upstream_url,
            upstream_timeout,
            admin_token,
            cache,
        })
    }

    /// Socket address to listen on.
    ///
    /// Accepts IPv4 and IPv6 literals (bracketed or bare) and `localhost`.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = self.bind_host.trim();
        let literal = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        let ip = if literal.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            literal.parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
                field: "MARQUEE_API_BIND".to_string(),
                value: self.bind_host.clone(),
                reason: "must be an IP address or localhost".to_string(),
            })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, raw: &str, reason: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.upstream_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert!(config.admin_token.is_none());
        assert_eq!(config.cache.max_entries, 10_000);
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = config_from(&[("PORT", "8080"), ("MARQUEE_API_PORT", "9090")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_bind_addr_accepts_ipv6_and_localhost() {
        let addr = |host: &str| {
            config_from(&[("MARQUEE_API_BIND", host), ("PORT", "3000")])
                .unwrap()
                .bind_addr()
        };

        assert_eq!(addr("::").unwrap(), "[::]:3000".parse().unwrap());
        assert_eq!(addr("[::1]").unwrap(), "[::1]:3000".parse().unwrap());
        assert_eq!(addr("localhost").unwrap(), "127.0.0.1:3000".parse().unwrap());
        assert_eq!(addr("0.0.0.0").unwrap(), "0.0.0.0:3000".parse().unwrap());
        assert!(matches!(
            addr("cinema.example"),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "MARQUEE_API_BIND"
        ));
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = config_from(&[("MARQUEE_API_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref value, .. } if value == "eighty"));
    }

    #[test]
    fn test_upstream_url_is_normalized() {
        let config = config_from(&[("MARQUEE_UPSTREAM_URL", "http://localhost:4000/")]).unwrap();
        assert_eq!(config.upstream_url, "http://localhost:4000");

        assert!(config_from(&[("MARQUEE_UPSTREAM_URL", "ftp://nope")]).is_err());
    }

    #[test]
    fn test_blank_admin_token_is_ignored() {
        let config = config_from(&[("MARQUEE_ADMIN_TOKEN", "  ")]).unwrap();
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_zero_cache_bound_is_rejected() {
        assert!(config_from(&[("MARQUEE_CACHE_MAX_ENTRIES", "0")]).is_err());
    }
}
