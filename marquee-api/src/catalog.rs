//! Cinema catalog: every upstream resource with its freshness policy and tags.
//!
//! | resource        | key                            | policy    | tags                              |
//! |-----------------|--------------------------------|-----------|-----------------------------------|
//! | cinemas         | `/api/v1/cinemas`              | immutable | `cinemas`                         |
//! | top movies      | `/api/v1/movies?rating=top`    | ttl:30    | `top-movies`                      |
//! | movie detail    | `/api/v1/movies/{id}`          | ttl:10    | `movies`, `movie-{id}`            |
//! | cinema sessions | `/api/v1/cinemas/{id}/movies`  | ttl:15    | `sessions`, `cinema-{id}-sessions` |
//! | metrics         | `/api/v1/metrics`              | ttl:60    | `metrics`                         |
//! | login           | `/api/v1/sessions`             | no-store  |                                   |

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::try_join_all;
use marquee_cache::{CacheGateway, CacheRead, Outcome};
use marquee_core::{
    tag_set, CacheKey, FreshnessPolicy, MarqueeError, MarqueeResult, OriginError, TagSet,
};
use serde_json::{json, Value};

use crate::upstream::Upstream;

pub const CINEMAS_PATH: &str = "/api/v1/cinemas";
pub const MOVIES_PATH: &str = "/api/v1/movies";
pub const METRICS_PATH: &str = "/api/v1/metrics";
pub const SESSIONS_PATH: &str = "/api/v1/sessions";

const TOP_MOVIES_TTL: i64 = 30;
const MOVIE_TTL: i64 = 10;
const SESSIONS_TTL: i64 = 15;
const METRICS_TTL: i64 = 60;

/// Whether `id` can be used as a path segment.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Read-through access to the cinema API.
#[derive(Clone)]
pub struct Catalog {
    gateway: Arc<CacheGateway<Value>>,
    upstream: Arc<dyn Upstream>,
    login_attempts: Arc<AtomicU64>,
}

impl Catalog {
    pub fn new(gateway: Arc<CacheGateway<Value>>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            gateway,
            upstream,
            login_attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn gateway(&self) -> &Arc<CacheGateway<Value>> {
        &self.gateway
    }

    async fn fetch(
        &self,
        key: CacheKey,
        policy: FreshnessPolicy,
        tags: TagSet,
    ) -> MarqueeResult<CacheRead<Value>> {
        let upstream = Arc::clone(&self.upstream);
        let path = key.as_str().to_string();
        let read = self
            .gateway
            .resolve_read(key.clone(), policy, tags, move || async move {
                upstream.get_json(&path).await
            })
            .await?;
        tracing::info!(key = %key, outcome = %read.outcome(), "GET");
        Ok(read)
    }

    async fn fetch_with_fallback(
        &self,
        key: CacheKey,
        policy: FreshnessPolicy,
        tags: TagSet,
        fallback: fn() -> Value,
    ) -> CacheRead<Value> {
        let upstream = Arc::clone(&self.upstream);
        let path = key.as_str().to_string();
        let result = self
            .gateway
            .resolve_or_stale(key.clone(), policy, tags, move || async move {
                upstream.get_json(&path).await
            })
            .await;

        match result {
            Ok(read) => {
                tracing::info!(key = %key, outcome = %read.outcome(), "GET");
                read
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Serving built-in fallback");
                CacheRead::new(fallback(), Utc::now(), Outcome::Stale)
            }
        }
    }

    /// All cinemas. Never refetched until invalidated.
    pub async fn cinemas(&self) -> MarqueeResult<CacheRead<Value>> {
        self.fetch(
            CacheKey::new(CINEMAS_PATH),
            FreshnessPolicy::Immutable,
            tag_set(["cinemas"]),
        )
        .await
    }

    /// Top rated movies, falling back to a built-in list if the upstream fails.
    pub async fn top_movies(&self) -> CacheRead<Value> {
        self.fetch_with_fallback(
            CacheKey::from_parts(MOVIES_PATH, &[("rating", "top")]),
            FreshnessPolicy::Ttl(TOP_MOVIES_TTL),
            tag_set(["top-movies"]),
            fallback_top_movies,
        )
        .await
    }

    /// A single movie, or `None` if the upstream does not know it.
    pub async fn movie(&self, id: &str) -> MarqueeResult<Option<CacheRead<Value>>> {
        let result = self
            .fetch(
                CacheKey::new(format!("{}/{}", MOVIES_PATH, id)),
                FreshnessPolicy::Ttl(MOVIE_TTL),
                tag_set(["movies".to_string(), format!("movie-{}", id)]),
            )
            .await;

        match result {
            Ok(read) => Ok(Some(read)),
            Err(err) if err.as_origin().and_then(OriginError::status) == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Sessions (movie id, showtimes, format) for one cinema.
    pub async fn cinema_sessions(&self, cinema_id: &str) -> MarqueeResult<CacheRead<Value>> {
        self.fetch(
            sessions_key(cinema_id),
            FreshnessPolicy::Ttl(SESSIONS_TTL),
            tag_set(["sessions".to_string(), format!("cinema-{}-sessions", cinema_id)]),
        )
        .await
    }

    /// Sessions for one cinema, each merged into its movie's details.
    ///
    /// Distinct movies are resolved in parallel. Sessions whose movie is
    /// unknown upstream are dropped.
    pub async fn cinema_movies_with_details(&self, cinema_id: &str) -> MarqueeResult<Vec<Value>> {
        let sessions = self.cinema_sessions(cinema_id).await?.into_value();
        let rows = sessions.as_array().ok_or_else(|| {
            MarqueeError::origin(
                sessions_key(cinema_id),
                OriginError::InvalidPayload {
                    reason: "sessions response is not an array".to_string(),
                },
            )
        })?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = rows
            .iter()
            .filter_map(movie_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if ids.len() < rows.len() {
            tracing::debug!(
                cinema_id,
                sessions = rows.len(),
                movies = ids.len(),
                "Sessions share movies"
            );
        }

        let details = try_join_all(ids.iter().map(|id| self.movie(id))).await?;
        let by_id: HashMap<&str, Value> = ids
            .iter()
            .map(String::as_str)
            .zip(details)
            .filter_map(|(id, read)| read.map(|read| (id, read.into_value())))
            .collect();

        Ok(rows
            .iter()
            .filter_map(|session| {
                let id = movie_id(session)?;
                let mut movie = by_id.get(id.as_str())?.clone();
                if let Value::Object(fields) = &mut movie {
                    for field in ["showtimes", "format"] {
                        match session.get(field) {
                            Some(value) => fields.insert(field.to_string(), value.clone()),
                            None => fields.remove(field),
                        };
                    }
                }
                Some(movie)
            })
            .collect())
    }

    /// Box office metrics, falling back to static figures if the upstream fails.
    pub async fn metrics(&self) -> CacheRead<Value> {
        self.fetch_with_fallback(
            CacheKey::new(METRICS_PATH),
            FreshnessPolicy::Ttl(METRICS_TTL),
            tag_set(["metrics"]),
            fallback_metrics,
        )
        .await
    }

    /// Log a user in. Never cached, and never joined with another attempt.
    pub async fn login(&self, username: &str, password: &str) -> MarqueeResult<Value> {
        let attempt = self.login_attempts.fetch_add(1, Ordering::Relaxed).to_string();
        let key = CacheKey::from_parts(SESSIONS_PATH, &[("attempt", attempt.as_str())]);
        let upstream = Arc::clone(&self.upstream);
        let body = json!({ "username": username, "password": password });

        self.gateway
            .resolve(key, FreshnessPolicy::NoStore, TagSet::new(), move || async move {
                upstream.post_json(SESSIONS_PATH, &body).await
            })
            .await
    }
}

fn sessions_key(cinema_id: &str) -> CacheKey {
    CacheKey::new(format!("{}/{}/movies", CINEMAS_PATH, cinema_id))
}

/// The movie id of a session row, if it is usable as a path segment.
fn movie_id(session: &Value) -> Option<String> {
    let id = match session.get("id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    is_valid_id(&id).then_some(id)
}

fn fallback_top_movies() -> Value {
    json!([
        {
            "id": 1,
            "title": "Interstellar",
            "genre": "Ciencia Ficción",
            "duration": "169 min",
            "rating": 4.9,
            "poster": "/film-poster.jpg"
        },
        {
            "id": 2,
            "title": "El Padrino",
            "genre": "Drama",
            "duration": "175 min",
            "rating": 4.8,
            "poster": "/film-poster.jpg"
        },
        {
            "id": 3,
            "title": "Pulp Fiction",
            "genre": "Crimen",
            "duration": "154 min",
            "rating": 4.7,
            "poster": "/film-poster.jpg"
        }
    ])
}

fn fallback_metrics() -> Value {
    json!({
        "ticketsSoldToday": 150000,
        "ticketsSoldMonth": 38542,
        "minutesWatchedYear": 125400000,
        "averageRating": 4.3,
        "activeScreenings": 24,
        "totalCustomers": 892341
    })
}
