//! Article API endpoints
//!
//! - GET /api/articles - Filtered, paginated listing
//! - GET /api/articles/{slug} - Article detail
//! - POST /api/articles - Create (auth)
//! - PUT /api/articles/{slug} - Update (owner)
//! - DELETE /api/articles/{slug} - Delete (owner)
//! - GET /api/tags - All tags

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::common::ArticleListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{MessageResponse, PageResponse};
use crate::services::article::{ArticleChanges, ArticleView, NewArticleInput};

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub article: ArticleView,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/{slug}", get(get_article))
        .route("/tags", get(list_tags))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles", axum::routing::post(create_article))
        .route(
            "/articles/{slug}",
            axum::routing::put(update_article).delete(delete_article),
        )
}

/// GET /api/articles
async fn list_articles(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<ArticleListQuery>,
) -> Result<Json<PageResponse<ArticleView>>, ApiError> {
    let page = state
        .article_service
        .list(&query.filter(), &query.params(), viewer.user())
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/articles/{slug}
async fn get_article(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.get(&slug, viewer.user()).await?;
    Ok(Json(ArticleResponse { article }))
}

/// POST /api/articles
async fn create_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<NewArticleInput>,
) -> Result<(StatusCode, Json<ArticleResponse>), ApiError> {
    let article = state.article_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(ArticleResponse { article })))
}

/// PUT /api/articles/{slug}
async fn update_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<ArticleChanges>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state.article_service.update(&user.0, &slug, body).await?;
    Ok(Json(ArticleResponse { article }))
}

/// DELETE /api/articles/{slug}
async fn delete_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.article_service.delete(&user.0, &slug).await?;
    Ok(Json(MessageResponse::new(message)))
}

/// GET /api/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.article_service.tags().await?;
    Ok(Json(TagListResponse {
        tags: tags.into_iter().map(|t| t.tag).collect(),
    }))
}
