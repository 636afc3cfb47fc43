//! User service
//!
//! Account lifecycle and authentication:
//! - Registration with activation email
//! - Activation through a signed link
//! - Login (rate limited per email) returning a JWT
//! - Bearer token authentication for the API middleware
//! - Current user read/update
//! - Forgotten password and single-use reset tokens

use crate::db::repositories::{ProfileRepository, UserRepository};
use crate::models::{Profile, UpdateProfileInput, User};
use crate::services::mailer::{activation_email, password_reset_email, Mailer};
use crate::services::password::{hash_password, validate_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::token::{JwtManager, ResetTokenGenerator, TokenPurpose};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Matches the `users.username` column width
pub const USERNAME_MAX_LEN: usize = 50;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid input or failed credential check
    #[error("{0}")]
    ValidationError(String),

    /// Missing, invalid or expired bearer token
    #[error("{0}")]
    Unauthorized(String),

    /// Too many failed logins for this email
    #[error("Too many failed login attempts. Please try again later.")]
    TooManyAttempts,

    #[error("{0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Returned by signup, login and social login
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub email: String,
    pub username: String,
    pub token: String,
}

/// Input for user registration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

/// Input for updating the current user and their profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCurrentUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub profile: Option<UpdateProfileInput>,
}

/// Input for completing a password reset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordInput {
    pub email: Option<String>,
    pub token: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    jwt: Arc<JwtManager>,
    reset_tokens: ResetTokenGenerator,
    mailer: Arc<dyn Mailer>,
    rate_limiter: Arc<LoginRateLimiter>,
    require_activation: bool,
    site_url: String,
}

impl UserService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        jwt: Arc<JwtManager>,
        reset_tokens: ResetTokenGenerator,
        mailer: Arc<dyn Mailer>,
        rate_limiter: Arc<LoginRateLimiter>,
        require_activation: bool,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            user_repo,
            profile_repo,
            jwt,
            reset_tokens,
            mailer,
            rate_limiter,
            require_activation,
            site_url: site_url.into(),
        }
    }

    /// Register a new user
    ///
    /// Creates the account and its profile. When activation is required the
    /// account starts inactive and an activation link is mailed out; a mail
    /// failure is logged and does not fail the registration.
    pub async fn register(&self, input: RegisterInput) -> Result<AuthResponse, UserServiceError> {
        let email = required(input.email, "email")?;
        let username = required(input.username, "username")?;
        let password = required_password(input.password, "password")?;

        validate_email(&email)?;
        validate_username(&username)?;
        validate_password(&password).map_err(UserServiceError::ValidationError)?;
        self.ensure_username_free(&username, None).await?;
        self.ensure_email_free(&email, None).await?;

        let password_hash = hash_password(&password).context("Failed to hash password")?;
        let mut user = User::new(username, email, password_hash);
        if !self.require_activation {
            user = user.activated();
        }

        let user = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;
        self.profile_repo
            .create_for_user(user.id)
            .await
            .context("Failed to create profile")?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        if self.require_activation {
            let token = self.jwt.issue_activation(&user).map_err(anyhow::Error::from)?;
            let (subject, body) = activation_email(&self.site_url, &user.username, &token);
            if let Err(e) = self.mailer.send(&user.email, &subject, &body).await {
                tracing::warn!("Failed to send activation email to {}: {}", user.email, e);
            }
        }

        self.auth_response(&user)
    }

    /// Activate the account named by an activation token
    pub async fn activate(&self, token: &str) -> Result<User, UserServiceError> {
        let claims = self
            .jwt
            .verify(token, TokenPurpose::Activation)
            .map_err(|e| UserServiceError::ValidationError(e.to_string()))?;

        let user_id = claims
            .user_id()
            .ok_or_else(|| UserServiceError::ValidationError("Invalid token".to_string()))?;
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::ValidationError("Invalid token".to_string()))?;

        if !user.is_active {
            self.user_repo
                .set_active(user.id, true)
                .await
                .context("Failed to activate user")?;
            tracing::info!(user_id = user.id, "User activated");
        }

        Ok(User {
            is_active: true,
            ..user
        })
    }

    /// Login with email and password
    pub async fn login(&self, input: LoginInput) -> Result<AuthResponse, UserServiceError> {
        let email = input
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                UserServiceError::ValidationError("An email address is required to log in.".to_string())
            })?;
        let password = input.password.filter(|p| !p.is_empty()).ok_or_else(|| {
            UserServiceError::ValidationError("A password is required to log in.".to_string())
        })?;

        if self.rate_limiter.is_limited(&email).await {
            tracing::warn!("Login refused for {}: too many failed attempts", email);
            return Err(UserServiceError::TooManyAttempts);
        }

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?;

        let user = match user {
            Some(user) => verify_password(&password, &user.password_hash)
                .context("Failed to verify password")?
                .then_some(user),
            None => None,
        };
        let Some(user) = user else {
            self.rate_limiter.record_failed_attempt(&email).await;
            return Err(UserServiceError::ValidationError(
                "A user with this email and password was not found.".to_string(),
            ));
        };

        if !user.is_active {
            return Err(UserServiceError::ValidationError(
                "This user has been deactivated.".to_string(),
            ));
        }

        self.rate_limiter.clear(&email).await;
        self.auth_response(&user)
    }

    /// Resolve a bearer token to an active user
    pub async fn authenticate(&self, token: &str) -> Result<User, UserServiceError> {
        let claims = self
            .jwt
            .verify(token, TokenPurpose::Access)
            .map_err(|e| UserServiceError::Unauthorized(e.to_string()))?;

        let user_id = claims
            .user_id()
            .ok_or_else(|| UserServiceError::Unauthorized("Invalid token".to_string()))?;
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| {
                UserServiceError::Unauthorized("User matching this token was not found.".to_string())
            })?;

        if !user.is_active {
            return Err(UserServiceError::Unauthorized(
                "This user has been deactivated.".to_string(),
            ));
        }
        Ok(user)
    }

    /// The current user with their profile
    pub async fn current(&self, user: &User) -> Result<(User, Profile), UserServiceError> {
        let profile = self.profile_for(user.id).await?;
        Ok((user.clone(), profile))
    }

    /// Update the current user's account fields and nested profile
    pub async fn update_current(
        &self,
        user: &User,
        input: UpdateCurrentUserInput,
    ) -> Result<(User, Profile), UserServiceError> {
        let mut updated = user.clone();

        if let Some(username) = input.username {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(UserServiceError::ValidationError("Please fill in the username".to_string()));
            }
            validate_username(&username)?;
            if username != user.username {
                self.ensure_username_free(&username, Some(user.id)).await?;
            }
            updated.username = username;
        }

        if let Some(email) = input.email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            if !email.eq_ignore_ascii_case(&user.email) {
                self.ensure_email_free(&email, Some(user.id)).await?;
            }
            updated.email = email;
        }

        if let Some(password) = input.password {
            validate_password(&password).map_err(UserServiceError::ValidationError)?;
            updated.password_hash = hash_password(&password).context("Failed to hash password")?;
        }

        let updated = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user")?;

        let mut profile = self.profile_for(user.id).await?;
        if let Some(changes) = input.profile.filter(|p| p.has_changes()) {
            changes.apply_to(&mut profile);
            profile = self
                .profile_repo
                .update(&profile)
                .await
                .context("Failed to update profile")?;
        }

        Ok((updated, profile))
    }

    /// Start a password reset by mailing a single-use link
    pub async fn forgot_password(&self, email: Option<String>) -> Result<String, UserServiceError> {
        let not_found =
            || UserServiceError::ValidationError("The email you entered does not exist".to_string());

        let email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(not_found)?;
        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(not_found)?;

        let token = self.reset_tokens.make_token(&user).map_err(anyhow::Error::from)?;
        self.user_repo
            .create_reset_token(user.id, &token)
            .await
            .context("Failed to store reset token")?;

        let (subject, body) = password_reset_email(&self.site_url, &user.username, &user.email, &token);
        self.mailer
            .send(&user.email, &subject, &body)
            .await
            .context("Failed to send password reset email")?;

        tracing::info!(user_id = user.id, "Password reset requested");
        Ok("Please confirm your email for further instruction".to_string())
    }

    /// Complete a password reset
    pub async fn reset_password(&self, input: ResetPasswordInput) -> Result<(), UserServiceError> {
        let email = required(input.email, "email")?;
        let token = required(input.token, "token")?;
        let password = required_password(input.password, "password")?;
        let confirm = required_password(input.confirm_password, "confirm_password")?;

        if password != confirm {
            return Err(UserServiceError::ValidationError("Passwords do not match".to_string()));
        }

        let invalid =
            || UserServiceError::ValidationError("Token is Invalid or it has already expired".to_string());

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;
        let stored = self
            .user_repo
            .get_reset_token(&token)
            .await
            .context("Failed to get reset token")?
            .ok_or_else(invalid)?;

        if stored.used || stored.user_id != user.id || !self.reset_tokens.check_token(&user, &token) {
            return Err(invalid());
        }

        validate_password(&password).map_err(UserServiceError::ValidationError)?;

        let mut updated = user;
        updated.password_hash = hash_password(&password).context("Failed to hash password")?;
        self.user_repo
            .update(&updated)
            .await
            .context("Failed to update password")?;
        self.user_repo
            .mark_reset_token_used(stored.id)
            .await
            .context("Failed to mark reset token used")?;

        tracing::info!(user_id = updated.id, "Password reset completed");
        Ok(())
    }

    pub fn auth_response(&self, user: &User) -> Result<AuthResponse, UserServiceError> {
        let token = self.jwt.issue_access(user).map_err(anyhow::Error::from)?;
        Ok(AuthResponse {
            email: user.email.clone(),
            username: user.username.clone(),
            token,
        })
    }

    async fn profile_for(&self, user_id: i64) -> Result<Profile, UserServiceError> {
        match self
            .profile_repo
            .get_by_user_id(user_id)
            .await
            .context("Failed to get profile")?
        {
            Some(profile) => Ok(profile),
            None => Ok(self
                .profile_repo
                .create_for_user(user_id)
                .await
                .context("Failed to create profile")?),
        }
    }

    async fn ensure_username_free(&self, username: &str, except: Option<i64>) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        match existing {
            Some(other) if Some(other.id) != except => Err(UserServiceError::ValidationError(
                "That username is taken. Please try another".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn ensure_email_free(&self, email: &str, except: Option<i64>) -> Result<(), UserServiceError> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(other) if Some(other.id) != except => Err(UserServiceError::ValidationError(
                "That email is already used. Sign in instead or try another".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Trim a required field, rejecting missing or blank values
fn required(value: Option<String>, field: &str) -> Result<String, UserServiceError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UserServiceError::ValidationError(format!("Please fill in the {}", field)))
}

/// Reject missing or blank passwords, keeping the value as typed
fn required_password(value: Option<String>, field: &str) -> Result<String, UserServiceError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| UserServiceError::ValidationError(format!("Please fill in the {}", field)))
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Username cannot be more than {} characters",
            USERNAME_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(UserServiceError::ValidationError(
            "Enter a valid email address.".to_string(),
        ))
    }
}
