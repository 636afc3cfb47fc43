//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Users, activation, password reset and social login
//! - Profiles and the follow graph
//! - Articles, tags, reactions, bookmarks, reports and comments
//! - Notifications
//! - Schema and health

pub mod articles;
pub mod auth;
pub mod bookmarks;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod notifications;
pub mod profiles;
pub mod reactions;
pub mod reports;
pub mod responses;
pub mod system;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};

/// Build the `/api` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Routes that need a valid bearer token
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(profiles::protected_router())
        .merge(articles::protected_router())
        .merge(reactions::protected_router())
        .merge(bookmarks::protected_router())
        .merge(reports::protected_router())
        .merge(comments::protected_router())
        .merge(notifications::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; a valid token still personalises the response
    let public_routes = Router::new()
        .merge(profiles::public_router())
        .merge(articles::public_router())
        .merge(comments::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    Router::new()
        .merge(auth::public_router())
        .merge(system::router())
        .merge(public_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin),
    }

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
