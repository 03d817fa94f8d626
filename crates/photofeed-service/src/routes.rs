//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, photos, tasks, timeline, users};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent task callbacks.
///
/// Each new-photo task fans out to every follower, so these are the expensive requests.
const TASK_MAX_CONCURRENT_REQUESTS: usize = 32;

/// Maximum concurrent requests for user-facing endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Tasks (task key auth)
/// - `POST /tasks/new-photo` - Fan a new photo out to followers
/// - `POST /tasks/new-follow` - Record a follow and backfill
/// - `POST /photopush/:object_name` - Upload notice; schedules `new-photo` for originals
///
/// ## Users (verified user header)
/// - `POST /v1/users` - Register the viewer
/// - `GET /v1/users/:user_id` - Look up a user
/// - `GET /v1/stats` - Follower and following counts
/// - `PUT /v1/following/:user_id` - Follow by ID
/// - `PUT /v1/follow-email/:email` - Follow by email
/// - `GET /v1/following` - Followed users
///
/// ## Feed (verified user header)
/// - `GET /v1/timeline/:cursor` - Timeline page
/// - `GET /v1/profile/:user_id` - A user's own photos
///
/// ## Photos (verified user header)
/// - `PUT|DELETE /v1/photos/:photo_id/like`
/// - `POST /v1/photos/:photo_id/flag`
/// - `POST|GET /v1/photos/:photo_id/comments`
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let task_routes = Router::new()
        .route("/new-photo", post(tasks::new_photo))
        .route("/new-follow", post(tasks::new_follow))
        .layer(ConcurrencyLimitLayer::new(TASK_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Users
        .route("/users", post(users::register))
        .route("/users/:user_id", get(users::get_person))
        .route("/stats", get(users::get_stats))
        .route("/following", get(users::get_following))
        .route("/following/:user_id", put(users::follow))
        .route("/follow-email/:email", put(users::follow_by_email))
        // Feed
        .route("/timeline/:cursor", get(timeline::get_timeline))
        .route("/profile/:user_id", get(timeline::get_profile))
        // Photos
        .route(
            "/photos/:photo_id/like",
            put(photos::like).delete(photos::unlike),
        )
        .route("/photos/:photo_id/flag", post(photos::flag))
        .route(
            "/photos/:photo_id/comments",
            post(photos::add_comment).get(photos::list_comments),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/tasks", task_routes)
        .route("/photopush/:object_name", post(photos::photo_push))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
