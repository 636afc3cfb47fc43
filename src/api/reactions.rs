//! Reaction API endpoints (auth)
//!
//! - POST /api/articles/{slug}/likes - `{ like: bool }`
//! - POST /api/articles/{slug}/rate - `{ rating: 1..=5 }`
//! - POST /api/articles/{slug}/favourite - Toggle favourite

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::reaction::{FavouriteOutcome, LikeOutcome, RatingOutcome};

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles/{slug}/likes", post(like_article))
        .route("/articles/{slug}/rate", post(rate_article))
        .route("/articles/{slug}/favourite", post(favourite_article))
}

// Bodies are taken as raw JSON so a wrongly typed value reaches the service
// as "missing" and gets its validation message instead of a 422.

/// POST /api/articles/{slug}/likes
async fn like_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<LikeOutcome>), ApiError> {
    let like = body.get("like").and_then(Value::as_bool);
    let outcome = state.reaction_service.like(&user.0, &slug, like).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/articles/{slug}/rate
async fn rate_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<RatingOutcome>), ApiError> {
    let rating = body.get("rating").and_then(Value::as_i64);
    let outcome = state.reaction_service.rate(&user.0, &slug, rating).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/articles/{slug}/favourite
async fn favourite_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<FavouriteOutcome>, ApiError> {
    Ok(Json(state.reaction_service.favourite(&user.0, &slug).await?))
}
