use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use marquee_api::Upstream;
use marquee_core::OriginError;
use serde_json::{json, Value};

/// In-memory upstream keyed by path, with per-path hit counters.
///
/// Unknown paths answer 404. Responses can be replaced mid-test to
/// observe refetches.
#[derive(Clone, Default)]
pub struct MemoryUpstream {
    routes: Arc<Mutex<HashMap<String, Result<Value, OriginError>>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    delay: Duration,
    total: Arc<AtomicUsize>,
}

impl MemoryUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, path: &str, response: Result<Value, OriginError>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    #[allow(dead_code)]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn record(&self, path: &str) {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.hits.lock().unwrap().entry(path.to_string()).or_insert(0) += 1;
    }

    fn respond(&self, path: &str) -> Result<Value, OriginError> {
        self.routes
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(Err(OriginError::Status {
                status: 404,
                message: "Not Found".to_string(),
            }))
    }
}

#[async_trait]
impl Upstream for MemoryUpstream {
    async fn get_json(&self, path: &str) -> Result<Value, OriginError> {
        self.record(path);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.respond(path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, OriginError> {
        self.record(path);
        if body["password"] == "popcorn" {
            Ok(json!({ "token": "session-token", "username": body["username"] }))
        } else {
            Err(OriginError::Status {
                status: 401,
                message: "Unauthorized".to_string(),
            })
        }
    }
}
