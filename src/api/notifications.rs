//! Notification API endpoints (auth)
//!
//! - GET /api/notifications - The requester's notifications, newest first
//! - PUT /api/notifications - Mark all read
//! - GET/PUT/DELETE /api/notifications/{id} - Read, mark read, remove
//! - PUT /api/notifications/switch_app - Toggle in-app notifications
//! - PUT /api/notifications/switch_email - Toggle email notifications

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::services::notification::NotificationView;

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification: NotificationView,
}

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub message: String,
    pub enabled: bool,
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications).put(mark_all_read))
        .route("/notifications/switch_app", put(switch_app))
        .route("/notifications/switch_email", put(switch_email))
        .route(
            "/notifications/{id}",
            get(get_notification)
                .put(mark_read)
                .delete(remove_notification),
        )
}

/// GET /api/notifications
async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let notifications = state.notification_service.list(&user.0).await?;
    Ok(Json(NotificationListResponse { notifications }))
}

/// PUT /api/notifications
async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let marked = state.notification_service.mark_all_read(&user.0).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} notification(s) marked as read",
        marked
    ))))
}

/// GET /api/notifications/{id}
async fn get_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notification = state.notification_service.get(&user.0, id).await?;
    Ok(Json(NotificationResponse { notification }))
}

/// PUT /api/notifications/{id}
async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let notification = state.notification_service.mark_read(&user.0, id).await?;
    Ok(Json(NotificationResponse { notification }))
}

/// DELETE /api/notifications/{id}
async fn remove_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.notification_service.remove(&user.0, id).await?;
    Ok(Json(MessageResponse::new("Notification deleted successfully")))
}

/// PUT /api/notifications/switch_app
async fn switch_app(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SwitchResponse>, ApiError> {
    let enabled = state.notification_service.switch_app(&user.0).await?;
    Ok(Json(switch_response("In-app", enabled)))
}

/// PUT /api/notifications/switch_email
async fn switch_email(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SwitchResponse>, ApiError> {
    let enabled = state.notification_service.switch_email(&user.0).await?;
    Ok(Json(switch_response("Email", enabled)))
}

fn switch_response(channel: &str, enabled: bool) -> SwitchResponse {
    let state = if enabled { "activated" } else { "deactivated" };
    SwitchResponse {
        message: format!("{} notifications have been {}", channel, state),
        enabled,
    }
}
