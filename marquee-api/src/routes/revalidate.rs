//! Revalidation and cache inspection endpoints.
//!
//! - POST /api/revalidate/tag/{tag} - purge every entry carrying `tag`
//! - POST /api/revalidate/all       - purge the whole cache
//! - GET  /api/cache/stats          - counters and entry count

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use marquee_cache::{CacheStats, InvalidationReport, InvalidationScope};
use marquee_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Longest tag accepted for revalidation.
pub const MAX_TAG_LEN: usize = 256;

// ============================================================================
// TYPES
// ============================================================================

/// Acknowledgement of a revalidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevalidateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub removed: usize,
    pub timestamp: Timestamp,
}

impl From<InvalidationReport> for RevalidateResponse {
    fn from(report: InvalidationReport) -> Self {
        let tag = match report.scope {
            InvalidationScope::Tag { tag } => Some(tag.as_str().to_string()),
            InvalidationScope::Key { .. } | InvalidationScope::All => None,
        };
        Self {
            success: true,
            tag,
            removed: report.removed,
            timestamp: report.invalidated_at,
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/revalidate/tag/{tag}
pub async fn revalidate_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<Json<RevalidateResponse>> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ApiError::invalid_input("Tag must not be empty"));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(ApiError::invalid_input(format!(
            "Tag must be at most {} characters",
            MAX_TAG_LEN
        )));
    }

    let report = state.gateway.invalidation().invalidate_tag(tag);
    Ok(Json(report.into()))
}

/// POST /api/revalidate/all
pub async fn revalidate_all(State(state): State<AppState>) -> Json<RevalidateResponse> {
    Json(state.gateway.invalidation().invalidate_all().into())
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.gateway.stats();
    Json(CacheStatsResponse {
        hit_rate: stats.hit_rate(),
        max_entries: state.gateway.config().max_entries,
        stats,
    })
}

/// Statistics plus derived figures.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub max_entries: usize,
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the revalidation router. Mounted under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/revalidate/tag/:tag", post(revalidate_tag))
        .route("/revalidate/all", post(revalidate_all))
        .route("/cache/stats", get(cache_stats))
}
