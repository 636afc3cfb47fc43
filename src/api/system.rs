//! Service endpoints
//!
//! - GET /api/schema - Self-describing route listing
//! - GET /api/health - Database liveness

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::db::DatabasePool;

/// One documented route
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: bool,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub routes: Vec<RouteInfo>,
    /// Query parameters accepted by GET /api/articles
    pub article_filters: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

pub const ARTICLE_FILTERS: [&str; 6] = ["author", "title", "tag", "search", "page", "page_size"];

const ROUTES: &[(&str, &str, bool)] = &[
    ("POST", "/api/users/signup", false),
    ("POST", "/api/users/login", false),
    ("GET", "/api/users/activate/{token}", false),
    ("POST", "/api/users/password/forgot", false),
    ("POST", "/api/users/password/reset", false),
    ("POST", "/api/users/social", false),
    ("GET", "/api/user", true),
    ("PUT", "/api/user", true),
    ("GET", "/api/profiles", true),
    ("GET", "/api/profiles/{username}", false),
    ("POST", "/api/profiles/{username}/follow", true),
    ("DELETE", "/api/profiles/{username}/follow", true),
    ("GET", "/api/profiles/{username}/followers", false),
    ("GET", "/api/profiles/{username}/following", false),
    ("GET", "/api/articles", false),
    ("POST", "/api/articles", true),
    ("GET", "/api/articles/{slug}", false),
    ("PUT", "/api/articles/{slug}", true),
    ("DELETE", "/api/articles/{slug}", true),
    ("GET", "/api/tags", false),
    ("POST", "/api/articles/{slug}/likes", true),
    ("POST", "/api/articles/{slug}/rate", true),
    ("POST", "/api/articles/{slug}/favourite", true),
    ("POST", "/api/articles/{slug}/bookmark", true),
    ("GET", "/api/bookmarks", true),
    ("DELETE", "/api/bookmarks", true),
    ("DELETE", "/api/bookmarks/{id}", true),
    ("GET", "/api/articles/{slug}/report", true),
    ("POST", "/api/articles/{slug}/report", true),
    ("GET", "/api/articles/{slug}/report/{id}", true),
    ("PUT", "/api/articles/{slug}/report/{id}", true),
    ("DELETE", "/api/articles/{slug}/report/{id}", true),
    ("GET", "/api/articles/{slug}/comments", false),
    ("POST", "/api/articles/{slug}/comments", true),
    ("GET", "/api/articles/{slug}/comments/{id}", false),
    ("POST", "/api/articles/{slug}/comments/{id}", true),
    ("PUT", "/api/articles/{slug}/comments/{id}", true),
    ("DELETE", "/api/articles/{slug}/comments/{id}", true),
    ("GET", "/api/articles/{slug}/comments/{id}/replies", false),
    ("GET", "/api/notifications", true),
    ("PUT", "/api/notifications", true),
    ("PUT", "/api/notifications/switch_app", true),
    ("PUT", "/api/notifications/switch_email", true),
    ("GET", "/api/notifications/{id}", true),
    ("PUT", "/api/notifications/{id}", true),
    ("DELETE", "/api/notifications/{id}", true),
    ("GET", "/api/schema", false),
    ("GET", "/api/health", false),
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schema", get(schema))
        .route("/health", get(health))
}

/// GET /api/schema
async fn schema() -> Json<SchemaResponse> {
    Json(SchemaResponse {
        name: "Authors Haven API",
        version: env!("CARGO_PKG_VERSION"),
        routes: ROUTES
            .iter()
            .map(|&(method, path, auth)| RouteInfo { method, path, auth })
            .collect(),
        article_filters: ARTICLE_FILTERS.to_vec(),
    })
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "up",
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "down",
                }),
            )
        }
    }
}
