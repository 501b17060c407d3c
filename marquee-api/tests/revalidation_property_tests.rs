//! Property-Based Tests for Tag Revalidation over HTTP
//!
//! For any set of cached movie details and any movie tag, revalidating the
//! tag removes exactly the entry carrying it. Every other movie is still
//! served from the cache afterwards.

use std::collections::BTreeSet;

use axum::http::{Method, StatusCode};
use marquee_test_utils::fixtures;
use proptest::prelude::*;
use tokio::runtime::Runtime;

#[path = "support/upstream.rs"]
mod upstream;
#[path = "support/app.rs"]
mod app;

use app::{body_json, cache_header, send, test_app};
use upstream::MemoryUpstream;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

/// Movie ids cached before revalidation.
fn cached_ids_strategy() -> impl Strategy<Value = BTreeSet<u64>> {
    prop::collection::btree_set(1u64..20, 0..8)
}

/// Movie id whose tag is revalidated. May or may not be cached.
fn target_id_strategy() -> impl Strategy<Value = u64> {
    1u64..20
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_revalidate_movie_tag_is_exact(
        cached in cached_ids_strategy(),
        target in target_id_strategy(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let upstream = MemoryUpstream::new();
            for id in 1u64..20 {
                upstream.set(&format!("/api/v1/movies/{}", id), Ok(fixtures::movie(id)));
            }
            let (app, state) = test_app(&upstream, None);

            for id in &cached {
                let response = send(&app, Method::GET, &format!("/api/v1/movies/{}", id), None).await;
                prop_assert_eq!(response.status(), StatusCode::OK);
            }
            prop_assert_eq!(state.gateway.store().len(), cached.len());

            let uri = format!("/api/revalidate/tag/movie-{}", target);
            let body = body_json(send(&app, Method::POST, &uri, None).await).await;
            let expected = usize::from(cached.contains(&target));
            prop_assert_eq!(&body["success"], &serde_json::json!(true));
            prop_assert_eq!(body["removed"].as_u64(), Some(expected as u64));
            prop_assert_eq!(state.gateway.store().len(), cached.len() - expected);

            for id in cached.iter().filter(|id| **id != target) {
                let response = send(&app, Method::GET, &format!("/api/v1/movies/{}", id), None).await;
                let header = cache_header(&response);
                prop_assert_eq!(header.as_deref(), Some("HIT"));
                prop_assert_eq!(upstream.hits(&format!("/api/v1/movies/{}", id)), 1);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_revalidate_shared_tag_empties_movies_only(
        cached in cached_ids_strategy(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let upstream = MemoryUpstream::new();
            upstream.set("/api/v1/cinemas", Ok(fixtures::cinemas()));
            for id in &cached {
                upstream.set(&format!("/api/v1/movies/{}", id), Ok(fixtures::movie(*id)));
            }
            let (app, state) = test_app(&upstream, None);

            send(&app, Method::GET, "/api/v1/cinemas", None).await;
            for id in &cached {
                send(&app, Method::GET, &format!("/api/v1/movies/{}", id), None).await;
            }

            let body = body_json(send(&app, Method::POST, "/api/revalidate/tag/movies", None).await).await;
            prop_assert_eq!(body["removed"].as_u64(), Some(cached.len() as u64));
            prop_assert_eq!(state.gateway.store().len(), 1);

            let cinemas = send(&app, Method::GET, "/api/v1/cinemas", None).await;
            let header = cache_header(&cinemas);
            prop_assert_eq!(header.as_deref(), Some("HIT"));
            Ok(())
        })?;
    }
}
