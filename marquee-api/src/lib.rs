//! MARQUEE API - HTTP surface for the fetch cache
//!
//! Serves the cinema catalog through the cache gateway and exposes
//! tag-scoped and full revalidation, cache statistics, health checks and
//! Prometheus metrics.

pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod upstream;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::{ApiGateway, AppState};
pub use upstream::{HttpUpstream, Upstream};
