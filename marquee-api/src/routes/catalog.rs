//! Read-through catalog endpoints.
//!
//! Responses carry `x-marquee-cache` with the resolution outcome
//! (HIT, MISS, JOINED, BYPASS, STALE).

use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use marquee_cache::CacheRead;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::is_valid_id;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const CACHE_HEADER: HeaderName = HeaderName::from_static("x-marquee-cache");

fn cached_json(read: CacheRead<Value>) -> Response {
    let outcome = HeaderValue::from_static(read.outcome().as_str());
    ([(CACHE_HEADER, outcome)], Json(read.into_value())).into_response()
}

fn checked_id(id: &str) -> ApiResult<&str> {
    if is_valid_id(id) {
        Ok(id)
    } else {
        Err(ApiError::invalid_input(format!("Invalid id: {}", id)))
    }
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/v1/cinemas
pub async fn list_cinemas(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(cached_json(state.catalog.cinemas().await?))
}

/// GET /api/v1/movies/top
pub async fn top_movies(State(state): State<AppState>) -> Response {
    cached_json(state.catalog.top_movies().await)
}

/// GET /api/v1/movies/{id}
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = checked_id(&id)?;
    match state.catalog.movie(id).await? {
        Some(read) => Ok(cached_json(read)),
        None => Err(ApiError::not_found(format!("Movie {} not found", id))),
    }
}

/// GET /api/v1/cinemas/{id}/movies
pub async fn cinema_movies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    let id = checked_id(&id)?;
    Ok(Json(state.catalog.cinema_movies_with_details(id).await?))
}

/// GET /api/v1/metrics
pub async fn box_office_metrics(State(state): State<AppState>) -> Response {
    cached_json(state.catalog.metrics().await)
}

/// POST /api/v1/sessions
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    if request.username.trim().is_empty() {
        return Err(ApiError::invalid_input("Username must not be empty"));
    }
    Ok(Json(
        state
            .catalog
            .login(&request.username, &request.password)
            .await?,
    ))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the catalog router. Mounted under `/api/v1`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/cinemas", get(list_cinemas))
        .route("/cinemas/:id/movies", get(cinema_movies))
        .route("/movies/top", get(top_movies))
        .route("/movies/:id", get(get_movie))
        .route("/metrics", get(box_office_metrics))
        .route("/sessions", post(login))
}
