//! Bookmark API endpoints (auth)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::Bookmark;

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub id: i64,
    /// Article slug
    pub article: String,
    pub title: String,
    pub created_at: String,
}

impl From<Bookmark> for BookmarkResponse {
    fn from(bookmark: Bookmark) -> Self {
        Self {
            id: bookmark.id,
            article: bookmark.article_slug,
            title: bookmark.article_title,
            created_at: bookmark.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookmarkListResponse {
    pub bookmarks: Vec<BookmarkResponse>,
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles/{slug}/bookmark", post(create_bookmark))
        .route("/bookmarks", get(list_bookmarks).delete(clear_bookmarks))
        .route("/bookmarks/{id}", delete(delete_bookmark))
}

/// POST /api/articles/{slug}/bookmark
async fn create_bookmark(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<(StatusCode, Json<BookmarkResponse>), ApiError> {
    let bookmark = state.bookmark_service.create(&user.0, &slug).await?;
    Ok((StatusCode::CREATED, Json(bookmark.into())))
}

/// GET /api/bookmarks
async fn list_bookmarks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BookmarkListResponse>, ApiError> {
    let bookmarks = state.bookmark_service.list(&user.0).await?;
    Ok(Json(BookmarkListResponse {
        bookmarks: bookmarks.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /api/bookmarks/{id}
async fn delete_bookmark(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.bookmark_service.delete(&user.0, id).await?;
    Ok(Json(MessageResponse::new("Bookmark deleted successfully")))
}

/// DELETE /api/bookmarks
async fn clear_bookmarks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.bookmark_service.clear(&user.0).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} bookmark(s) deleted",
        removed
    ))))
}
