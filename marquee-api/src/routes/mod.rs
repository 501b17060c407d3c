//! REST API Routes Module
//!
//! Includes:
//! - Health check endpoints
//! - Read-through catalog endpoints
//! - Revalidation and cache statistics (admin token when configured)
//! - Prometheus scrape endpoint

pub mod catalog;
pub mod health;
pub mod revalidate;

use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::admin_auth_middleware;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use catalog::create_router as catalog_router;
pub use health::create_router as health_router;
pub use revalidate::create_router as revalidate_router;

/// Assemble the full application router.
pub fn create_api_router(state: AppState) -> Router {
    let admin = revalidate_router().route_layer(from_fn_with_state(
        state.clone(),
        admin_auth_middleware,
    ));

    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1", catalog_router())
        .nest("/api", admin)
        .route("/metrics", get(metrics_handler))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
