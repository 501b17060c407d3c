//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use marquee_cache::CacheGateway;
use serde_json::Value;

use crate::catalog::Catalog;
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::upstream::{HttpUpstream, Upstream};

/// Gateway type used by the API: upstream JSON documents.
pub type ApiGateway = CacheGateway<Value>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The one cache gateway for this process.
    pub gateway: Arc<ApiGateway>,
    /// Catalog resolving cinema resources through `gateway`.
    pub catalog: Catalog,
    /// Bearer token required on revalidation routes, if any.
    pub admin_token: Option<Arc<str>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(gateway: Arc<ApiGateway>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&gateway), upstream),
            gateway,
            admin_token: None,
            start_time: Instant::now(),
        }
    }

    /// Require `token` on the revalidation routes.
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }

    /// Build the gateway and the HTTP upstream from configuration.
    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        let gateway = Arc::new(CacheGateway::new(config.cache.clone())?);
        let upstream = HttpUpstream::new(config.upstream_url.clone(), config.upstream_timeout)?;
        Ok(Self::new(gateway, Arc::new(upstream)).with_admin_token(config.admin_token.clone()))
    }
}
