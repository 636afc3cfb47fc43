//! Authentication API endpoints
//!
//! - POST /api/users/signup - Registration
//! - POST /api/users/login - Login
//! - GET /api/users/activate/{token} - Account activation link
//! - POST /api/users/password/forgot - Start a password reset
//! - POST /api/users/password/reset - Complete a password reset
//! - POST /api/users/social - Sign in with a provider access token
//! - GET/PUT /api/user - Current user

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::{Profile, User};
use crate::services::profile::ProfileView;
use crate::services::user::{
    AuthResponse, LoginInput, RegisterInput, ResetPasswordInput, UpdateCurrentUserInput,
};
use crate::services::SocialLoginInput;

/// `{ "user": ... }` envelope used by signup and the current user endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope<T> {
    pub user: T,
}

/// Request body for starting a password reset
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Current user with nested profile
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub profile: ProfileView,
}

/// Routes that need no token
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/activate/{token}", get(activate))
        .route("/users/password/forgot", post(forgot_password))
        .route("/users/password/reset", post(reset_password))
        .route("/users/social", post(social_login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/user", get(current_user).put(update_current_user))
}

/// POST /api/users/signup
async fn signup(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<(StatusCode, Json<UserEnvelope<AuthResponse>>), ApiError> {
    let user = state.user_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}

/// POST /api/users/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<Json<AuthResponse>, ApiError> {
    Ok(Json(state.user_service.login(body).await?))
}

/// GET /api/users/activate/{token}
async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.user_service.activate(&token).await?;
    tracing::info!(user_id = user.id, "Account activated");
    Ok(Json(MessageResponse::new(format!(
        "{}, your account has been activated.",
        user.username
    ))))
}

/// POST /api/users/password/forgot
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = state.user_service.forgot_password(body.email).await?;
    Ok(Json(MessageResponse::new(message)))
}

/// POST /api/users/password/reset
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordInput>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.reset_password(body).await?;
    Ok(Json(MessageResponse::new(
        "Your password has been reset successfully.",
    )))
}

/// POST /api/users/social
async fn social_login(
    State(state): State<AppState>,
    Json(body): Json<SocialLoginInput>,
) -> Result<Json<AuthResponse>, ApiError> {
    Ok(Json(state.social_service.login(body).await?))
}

/// GET /api/user
async fn current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserEnvelope<CurrentUserResponse>>, ApiError> {
    let (user, profile) = state.user_service.current(&user.0).await?;
    render_current(&state, user, profile).await
}

/// PUT /api/user
async fn update_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UserEnvelope<UpdateCurrentUserInput>>,
) -> Result<Json<UserEnvelope<CurrentUserResponse>>, ApiError> {
    let (user, profile) = state.user_service.update_current(&user.0, body.user).await?;
    render_current(&state, user, profile).await
}

async fn render_current(
    state: &AppState,
    user: User,
    profile: Profile,
) -> Result<Json<UserEnvelope<CurrentUserResponse>>, ApiError> {
    let profile = state.profile_service.view(profile, Some(&user)).await?;
    Ok(Json(UserEnvelope {
        user: CurrentUserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            is_staff: user.is_staff,
            profile,
        },
    }))
}
