use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use marquee_api::{create_api_router, AppState};
use marquee_cache::{CacheConfig, CacheGateway};
use serde_json::Value;
use tower::ServiceExt;

use super::upstream::MemoryUpstream;

pub fn test_app(upstream: &MemoryUpstream, admin_token: Option<&str>) -> (Router, AppState) {
    let gateway = Arc::new(CacheGateway::new(CacheConfig::default()).unwrap());
    let state = AppState::new(gateway, Arc::new(upstream.clone()))
        .with_admin_token(admin_token.map(str::to_string));
    (create_api_router(state.clone()), state)
}

pub async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn cache_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("x-marquee-cache")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
