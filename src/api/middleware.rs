//! API middleware
//!
//! Contains:
//! - The shared application state
//! - The JSON error type and its mapping from service errors
//! - Bearer token authentication (required and optional)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    CommentRepositoryImpl, SqlxArticleRepository, SqlxBookmarkRepository,
    SqlxNotificationRepository, SqlxProfileRepository, SqlxReactionRepository,
    SqlxReportRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::social::IdentityClient;
use crate::services::{
    ArticleService, ArticleServiceError, BookmarkService, BookmarkServiceError, CommentService,
    CommentServiceError, JwtManager, LoginRateLimiter, Mailer, NotificationService,
    NotificationServiceError, ProfileService, ProfileServiceError, ReactionService,
    ReactionServiceError, ReportService, ReportServiceError, ResetTokenGenerator,
    SocialAuthService, SocialLoginError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub social_service: Arc<SocialAuthService>,
    pub profile_service: Arc<ProfileService>,
    pub article_service: Arc<ArticleService>,
    pub reaction_service: Arc<ReactionService>,
    pub bookmark_service: Arc<BookmarkService>,
    pub report_service: Arc<ReportService>,
    pub comment_service: Arc<CommentService>,
    pub notification_service: Arc<NotificationService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(
        pool: DynDatabasePool,
        config: &Config,
        mailer: Arc<dyn Mailer>,
        identity_client: Arc<dyn IdentityClient>,
    ) -> Self {
        let cache = create_cache(&config.cache);
        let rate_limiter = Arc::new(LoginRateLimiter::new());

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let notification_repo = SqlxNotificationRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            profile_repo.clone(),
            Arc::new(JwtManager::new(
                &config.auth.jwt_secret,
                config.auth.token_ttl_seconds,
            )),
            ResetTokenGenerator::new(
                &config.auth.jwt_secret,
                config.auth.password_reset_timeout_days,
            ),
            mailer,
            rate_limiter.clone(),
            config.auth.require_activation,
            config.mail.site_url.clone(),
        ));
        let social_service = Arc::new(SocialAuthService::new(
            user_repo.clone(),
            profile_repo.clone(),
            user_service.clone(),
            identity_client,
        ));

        let notification_service = Arc::new(NotificationService::new(
            notification_repo,
            profile_repo.clone(),
        ));
        let article_service = Arc::new(ArticleService::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            SqlxReactionRepository::boxed(pool.clone()),
            user_repo,
            profile_repo.clone(),
            cache,
            notification_service.clone(),
        ));

        Self {
            user_service,
            social_service,
            profile_service: Arc::new(ProfileService::new(profile_repo)),
            reaction_service: Arc::new(ReactionService::new(
                SqlxReactionRepository::boxed(pool.clone()),
                article_service.clone(),
            )),
            bookmark_service: Arc::new(BookmarkService::new(
                SqlxBookmarkRepository::boxed(pool.clone()),
                article_service.clone(),
            )),
            report_service: Arc::new(ReportService::new(
                SqlxReportRepository::boxed(pool.clone()),
                article_service.clone(),
            )),
            comment_service: Arc::new(CommentService::new(
                Arc::new(CommentRepositoryImpl::new(pool.clone())),
                article_service.clone(),
            )),
            article_service,
            notification_service,
            rate_limiter,
            pool,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The requester, when a valid token was sent
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TOO_MANY_REQUESTS", message)
    }

    /// Logs the cause; clients only see a generic message
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "TOO_MANY_REQUESTS" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::Unauthorized(msg) => Self::unauthorized(msg),
            UserServiceError::TooManyAttempts => Self::too_many_requests(err.to_string()),
            UserServiceError::NotFound(msg) => Self::not_found(msg),
            UserServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<SocialLoginError> for ApiError {
    fn from(err: SocialLoginError) -> Self {
        match err {
            SocialLoginError::InternalError(e) => Self::internal_error(e),
            other => Self::validation_error(other.to_string()),
        }
    }
}

impl From<ProfileServiceError> for ApiError {
    fn from(err: ProfileServiceError) -> Self {
        match err {
            ProfileServiceError::NotFound(msg) => Self::not_found(msg),
            ProfileServiceError::ValidationError(msg) => Self::validation_error(msg),
            ProfileServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(err: ArticleServiceError) -> Self {
        match err {
            ArticleServiceError::NotFound(msg) => Self::not_found(msg),
            ArticleServiceError::Forbidden(msg) => Self::forbidden(msg),
            ArticleServiceError::ValidationError(msg) => Self::validation_error(msg),
            ArticleServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<ReactionServiceError> for ApiError {
    fn from(err: ReactionServiceError) -> Self {
        match err {
            ReactionServiceError::NotFound(msg) => Self::not_found(msg),
            ReactionServiceError::Forbidden(msg) => Self::forbidden(msg),
            ReactionServiceError::ValidationError(msg) => Self::validation_error(msg),
            ReactionServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<BookmarkServiceError> for ApiError {
    fn from(err: BookmarkServiceError) -> Self {
        match err {
            BookmarkServiceError::NotFound(msg) => Self::not_found(msg),
            BookmarkServiceError::Forbidden(msg) => Self::forbidden(msg),
            BookmarkServiceError::AlreadyBookmarked => Self::conflict(err.to_string()),
            BookmarkServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<ReportServiceError> for ApiError {
    fn from(err: ReportServiceError) -> Self {
        match err {
            ReportServiceError::NotFound(msg) => Self::not_found(msg),
            ReportServiceError::Forbidden(msg) => Self::forbidden(msg),
            ReportServiceError::ValidationError(msg) => Self::validation_error(msg),
            ReportServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(msg) => Self::not_found(msg),
            CommentServiceError::Forbidden(msg) => Self::forbidden(msg),
            CommentServiceError::ValidationError(msg) => Self::validation_error(msg),
            CommentServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<NotificationServiceError> for ApiError {
    fn from(err: NotificationServiceError) -> Self {
        match err {
            NotificationServiceError::NotFound(msg) => Self::not_found(msg),
            NotificationServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

    let user = state.user_service.authenticate(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// A missing or bad token leaves the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(&request) {
        if let Ok(user) = state.user_service.authenticate(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|au| au.0.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request {
        Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let request = request_with_auth("Bearer test-token-123");
        assert_eq!(extract_bearer_token(&request), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_missing_or_wrong_scheme() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert!(extract_bearer_token(&request).is_none());
        assert!(extract_bearer_token(&request_with_auth("Basic abc")).is_none());
        assert!(extract_bearer_token(&request_with_auth("Bearer ")).is_none());
    }

    #[test]
    fn test_api_error_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::too_many_requests("x").status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::new("SOMETHING_ELSE", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::validation_error("Please fill in the email");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["message"], "Please fill in the email");
        assert!(json["error"].get("details").is_none());

        let error = ApiError::with_details("CONFLICT", "taken", serde_json::json!({"field": "username"}));
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["details"]["field"], "username");
    }

    #[test]
    fn test_service_error_conversions() {
        let err: ApiError = UserServiceError::TooManyAttempts.into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let err: ApiError = BookmarkServiceError::AlreadyBookmarked.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.error.message, "You have already bookmarked this article");

        let err: ApiError = SocialLoginError::UnsupportedProvider.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error.message, "Provider not supported");

        let err: ApiError = ArticleServiceError::InternalError(anyhow::anyhow!("db down")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error.message, "Internal server error");
    }
}
