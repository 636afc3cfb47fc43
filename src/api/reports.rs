//! Article report API endpoints (auth)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::ArticleReport;

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportCreatedResponse {
    pub message: String,
    pub report: ArticleReport,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: ArticleReport,
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<ArticleReport>,
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route(
            "/articles/{slug}/report",
            get(list_reports).post(create_report),
        )
        .route(
            "/articles/{slug}/report/{id}",
            get(get_report).put(update_report).delete(delete_report),
        )
}

/// POST /api/articles/{slug}/report
async fn create_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportCreatedResponse>), ApiError> {
    let (message, report) = state
        .report_service
        .create(&user.0, &slug, body.text)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReportCreatedResponse { message, report }),
    ))
}

/// GET /api/articles/{slug}/report
async fn list_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Json<ReportListResponse>, ApiError> {
    let reports = state.report_service.list(&user.0, &slug).await?;
    Ok(Json(ReportListResponse { reports }))
}

/// GET /api/articles/{slug}/report/{id}
async fn get_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = state.report_service.get(&user.0, &slug, id).await?;
    Ok(Json(ReportResponse { report }))
}

/// PUT /api/articles/{slug}/report/{id}
async fn update_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = state
        .report_service
        .update(&user.0, &slug, id, body.text)
        .await?;
    Ok(Json(ReportResponse { report }))
}

/// DELETE /api/articles/{slug}/report/{id}
async fn delete_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((slug, id)): Path<(String, i64)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.report_service.delete(&user.0, &slug, id).await?;
    Ok(Json(MessageResponse::new(message)))
}
