//! reado backend: a social reading-progress tracker.
//!
//! Comment submission runs a synchronous toxicity screen and a detached LLM
//! spoiler classification; every request passes through the metrics,
//! admission and timeout middleware assembled in [`build_router`].

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use middleware::{admission::AdmissionController, timeout::RequestDeadline};
use routes::comments::AppState;

/// Assemble the full application: routes, shared state and the request
/// lifecycle middleware.
///
/// Layer order matters. `Router::layer` wraps the stack built so far, so the
/// layers below are added innermost-first: timeout closest to the handlers,
/// admission outside it, metrics outside both. Each request therefore runs
/// metrics-start → admission-check → timeout-arm → handler →
/// (timeout-disarm | timeout-fire) → metrics-finalize → admission-release.
pub fn build_router(
    state: AppState,
    admission: Arc<AdmissionController>,
    deadline: RequestDeadline,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let metrics = Arc::clone(&state.metrics);

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route(
            "/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route("/comments/{id}", delete(routes::comments::delete_comment))
        .route("/comments/{id}/like", patch(routes::comments::like_comment))
        .route(
            "/comments/{id}/dislike",
            patch(routes::comments::dislike_comment),
        )
        .route(
            "/comments/{id}/vote-status",
            get(routes::comments::vote_status),
        )
        .route(
            "/users/auth/google",
            get(routes::auth::auth_google).post(routes::users::google_auth),
        )
        .route(
            "/users/auth/google/callback",
            get(routes::auth::auth_google_callback),
        )
        .route("/users/batch", post(routes::users::batch_users))
        .route("/users/{user_id}", get(routes::users::get_user))
        .route(
            "/users/{user_id}/bookmarks",
            get(routes::users::list_bookmarks).post(routes::users::add_bookmark),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            deadline,
            middleware::timeout::enforce,
        ))
        .layer(axum::middleware::from_fn_with_state(
            admission,
            middleware::admission::admit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::metrics::track,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
