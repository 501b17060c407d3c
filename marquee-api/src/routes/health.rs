//! Health endpoints, open to everyone.
//!
//! - GET /health/ping - plain-text pong
//! - GET /health/live - uptime plus a snapshot of the cache

use axum::{extract::State, routing::get, Json, Router};
use marquee_cache::CacheStats;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Body of `/health/live`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveReport {
    pub alive: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub cache: CacheSummary,
}

/// Cache occupancy at the time of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub entries: u64,
    pub capacity: usize,
    pub in_flight: u64,
    pub hit_rate: f64,
}

impl CacheSummary {
    fn new(stats: &CacheStats, capacity: usize) -> Self {
        Self {
            entries: stats.entry_count,
            capacity,
            in_flight: stats.in_flight,
            hit_rate: stats.hit_rate(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping
pub async fn ping() -> &'static str {
    "pong"
}

/// GET /health/live
pub async fn live(State(state): State<AppState>) -> Json<LiveReport> {
    let stats = state.gateway.stats();
    Json(LiveReport {
        alive: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cache: CacheSummary::new(&stats, state.gateway.config().max_entries),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

/// Health router. Mounted under `/health`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(live))
}
