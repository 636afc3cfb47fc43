//! Profile API endpoints
//!
//! - GET /api/profiles - All profiles (auth)
//! - GET /api/profiles/{username} - One profile
//! - POST/DELETE /api/profiles/{username}/follow - Follow or unfollow (auth)
//! - GET /api/profiles/{username}/followers
//! - GET /api/profiles/{username}/following

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::services::profile::ProfileView;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<ProfileView>,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/profiles/{username}", get(get_profile))
        .route("/profiles/{username}/followers", get(followers))
        .route("/profiles/{username}/following", get(following))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/{username}/follow", post(follow).delete(unfollow))
}

/// GET /api/profiles
async fn list_profiles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ProfileListResponse>, ApiError> {
    let profiles = state.profile_service.list(&user.0).await?;
    Ok(Json(ProfileListResponse { profiles }))
}

/// GET /api/profiles/{username}
async fn get_profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.profile_service.get(&username, viewer.user()).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// POST /api/profiles/{username}/follow
async fn follow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.profile_service.follow(&user.0, &username).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// DELETE /api/profiles/{username}/follow
async fn unfollow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.profile_service.unfollow(&user.0, &username).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// GET /api/profiles/{username}/followers
async fn followers(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileListResponse>, ApiError> {
    let profiles = state
        .profile_service
        .followers(&username, viewer.user())
        .await?;
    Ok(Json(ProfileListResponse { profiles }))
}

/// GET /api/profiles/{username}/following
async fn following(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileListResponse>, ApiError> {
    let profiles = state
        .profile_service
        .following(&username, viewer.user())
        .await?;
    Ok(Json(ProfileListResponse { profiles }))
}
