//! Comment API endpoints
//!
//! Reading is public; writing needs a token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::Comment;

#[derive(Debug, Default, Deserialize)]
pub struct CommentRequest {
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/articles/{slug}/comments", get(list_comments))
        .route("/articles/{slug}/comments/{id}", get(get_comment))
        .route("/articles/{slug}/comments/{id}/replies", get(list_replies))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles/{slug}/comments", post(create_comment))
        .route(
            "/articles/{slug}/comments/{id}",
            post(reply_to_comment)
                .put(update_comment)
                .delete(delete_comment),
        )
}

/// GET /api/articles/{slug}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = state.comment_service.list(&slug).await?;
    Ok(Json(CommentListResponse { comments }))
}

/// GET /api/articles/{slug}/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state.comment_service.get(&slug, id).await?;
    Ok(Json(CommentResponse { comment }))
}

/// GET /api/articles/{slug}/comments/{id}/replies
async fn list_replies(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = state.comment_service.replies(&slug, id).await?;
    Ok(Json(CommentListResponse { comments }))
}

/// POST /api/articles/{slug}/comments
async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = state
        .comment_service
        .create(&user.0, &slug, None, body.body)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// POST /api/articles/{slug}/comments/{id}
async fn reply_to_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = state
        .comment_service
        .create(&user.0, &slug, Some(id), body.body)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// PUT /api/articles/{slug}/comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state
        .comment_service
        .update(&user.0, &slug, id, body.body)
        .await?;
    Ok(Json(CommentResponse { comment }))
}

/// DELETE /api/articles/{slug}/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.comment_service.delete(&user.0, &slug, id).await?;
    Ok(Json(MessageResponse::new(message)))
}
