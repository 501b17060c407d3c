//! Prometheus Metrics Definitions
//!
//! HTTP metrics are recorded per request by the observability middleware.
//! Cache metrics are synchronized from the gateway's statistics when
//! `/metrics` is scraped.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use marquee_cache::CacheStats;
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<MarqueeMetrics>> = Lazy::new(MarqueeMetrics::new);

/// Container for all MARQUEE metrics.
#[derive(Clone)]
pub struct MarqueeMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: IntCounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache events - labels: event (hit, miss, join, bypass, origin_call,
    /// origin_failure, invalidated, eviction)
    pub cache_events_total: IntCounterVec,

    /// Entries currently stored
    pub cache_entries: IntGauge,

    /// Keys with an origin call in flight
    pub cache_in_flight: IntGauge,

    /// Held while cache counters are brought up to date.
    cache_sync: Arc<Mutex<()>>,
}

impl MarqueeMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_int_counter_vec!(
                "marquee_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "marquee_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cache_events_total: register_int_counter_vec!(
                "marquee_cache_events_total",
                "Cache events by kind",
                &["event"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_events_total: {}", e)))?,

            cache_entries: register_int_gauge!(
                "marquee_cache_entries",
                "Current number of cached entries"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_entries: {}", e)))?,

            cache_in_flight: register_int_gauge!(
                "marquee_cache_in_flight",
                "Current number of keys with an origin call in flight"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_in_flight: {}", e)))?,

            cache_sync: Arc::new(Mutex::new(())),
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Bring the cache series up to date with a stats snapshot.
    ///
    /// Counters only move forward, by the difference to the last sync.
    /// Concurrent scrapes are serialized so a delta is never added twice.
    pub fn sync_cache_stats(&self, stats: &CacheStats) {
        let _sync = match self.cache_sync.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let events = [
            ("hit", stats.hits),
            ("miss", stats.misses),
            ("join", stats.joins),
            ("bypass", stats.bypasses),
            ("origin_call", stats.origin_calls),
            ("origin_failure", stats.origin_failures),
            ("invalidated", stats.invalidated),
            ("eviction", stats.evictions),
        ];
        for (event, total) in events {
            let counter = self.cache_events_total.with_label_values(&[event]);
            let seen = counter.get();
            if total > seen {
                counter.inc_by(total - seen);
            }
        }
        self.cache_entries.set(stats.entry_count as i64);
        self.cache_in_flight.set(stats.in_flight as i64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.sync_cache_stats(&state.gateway.stats());
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Result<&'static MarqueeMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = metrics()?;
        let before = metrics
            .http_requests_total
            .with_label_values(&["GET", "/api/v1/cinemas", "200"])
            .get();
        metrics.record_http_request("GET", "/api/v1/cinemas", 200, 0.015);
        let after = metrics
            .http_requests_total
            .with_label_values(&["GET", "/api/v1/cinemas", "200"])
            .get();
        assert_eq!(after, before + 1);
        Ok(())
    }

    #[test]
    fn test_cache_sync_never_moves_backwards() -> Result<(), String> {
        let metrics = metrics()?;
        let stats = CacheStats {
            evictions: 1_000_000,
            entry_count: 3,
            ..Default::default()
        };
        metrics.sync_cache_stats(&stats);
        let evictions = metrics.cache_events_total.with_label_values(&["eviction"]);
        assert!(evictions.get() >= 1_000_000);

        let lower = CacheStats {
            evictions: 5,
            ..Default::default()
        };
        metrics.sync_cache_stats(&lower);
        assert!(evictions.get() >= 1_000_000);
        Ok(())
    }

    #[test]
    fn test_concurrent_syncs_add_delta_once() -> Result<(), String> {
        let metrics = metrics()?;
        let joins = metrics.cache_events_total.with_label_values(&["join"]);
        let target = joins.get() + 100;
        let stats = CacheStats {
            joins: target,
            ..Default::default()
        };

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        metrics.sync_cache_stats(&stats);
                    }
                });
            }
        });

        assert_eq!(joins.get(), target);
        Ok(())
    }
}
