//! Social login
//!
//! The client obtains an OAuth access token from Google or Facebook and
//! hands it to us. We fetch the account's email from the provider; the
//! matching local user is signed in, or created (active, random password)
//! when none exists. Google identities must carry a verified email.

use crate::config::SocialConfig;
use crate::db::repositories::{ProfileRepository, UserRepository};
use crate::models::User;
use crate::services::password::hash_password;
use crate::services::user::{AuthResponse, UserService, UserServiceError, USERNAME_MAX_LEN};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Supported identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    /// Twitter and anything else is rejected
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "google" | "google-oauth2" => Some(Self::Google),
            "facebook" => Some(Self::Facebook),
            _ => None,
        }
    }
}

/// What we need from the provider's user info endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SocialIdentity {
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// `email_verified` on OpenID userinfo, `verified_email` on Google's v2 endpoint
    #[serde(default, alias = "verified_email")]
    pub email_verified: Option<bool>,
}

impl SocialIdentity {
    /// Google must vouch for the address; Facebook only shares confirmed ones
    pub fn has_trusted_email(&self, provider: Provider) -> bool {
        match provider {
            Provider::Google => self.email_verified == Some(true),
            Provider::Facebook => self.email_verified != Some(false),
        }
    }
}

/// Error types for social login
#[derive(Debug, thiserror::Error)]
pub enum SocialLoginError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Provider not supported")]
    UnsupportedProvider,

    /// The provider refused the access token
    #[error("Invalid token")]
    InvalidToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UserServiceError> for SocialLoginError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => Self::InternalError(e),
            other => Self::ValidationError(other.to_string()),
        }
    }
}

/// Fetches identities from providers
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn fetch_identity(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<SocialIdentity, SocialLoginError>;
}

/// HTTPS client for the provider user info endpoints
pub struct HttpIdentityClient {
    client: reqwest::Client,
    config: SocialConfig,
}

impl HttpIdentityClient {
    pub fn new(config: SocialConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn fetch_identity(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<SocialIdentity, SocialLoginError> {
        let request = match provider {
            Provider::Google => self
                .client
                .get(&self.config.google_userinfo_url)
                .bearer_auth(access_token),
            Provider::Facebook => self
                .client
                .get(&self.config.facebook_me_url)
                .query(&[("access_token", access_token)]),
        };

        let response = request
            .send()
            .await
            .context("Failed to reach identity provider")?;

        if !response.status().is_success() {
            tracing::warn!(
                "Identity provider {:?} rejected token: {}",
                provider,
                response.status()
            );
            return Err(SocialLoginError::InvalidToken);
        }

        response
            .json::<SocialIdentity>()
            .await
            .map_err(|_| SocialLoginError::InvalidToken)
    }
}

/// Input for social login
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialLoginInput {
    pub provider: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

/// Social login service
pub struct SocialAuthService {
    user_repo: Arc<dyn UserRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    users: Arc<UserService>,
    client: Arc<dyn IdentityClient>,
}

impl SocialAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        users: Arc<UserService>,
        client: Arc<dyn IdentityClient>,
    ) -> Self {
        Self {
            user_repo,
            profile_repo,
            users,
            client,
        }
    }

    /// Sign in (or sign up) with a provider access token
    pub async fn login(&self, input: SocialLoginInput) -> Result<AuthResponse, SocialLoginError> {
        let provider_name = input
            .provider
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| SocialLoginError::ValidationError("Please fill in the provider".to_string()))?;
        let access_token = input
            .access_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SocialLoginError::ValidationError("Please fill in the access_token".to_string())
            })?;

        let provider = Provider::parse(&provider_name).ok_or(SocialLoginError::UnsupportedProvider)?;
        let identity = self.client.fetch_identity(provider, &access_token).await?;
        if !identity.has_trusted_email(provider) {
            tracing::warn!("Social login refused: {:?} email is not verified", provider);
            return Err(SocialLoginError::ValidationError(
                "Your social account email address has not been verified".to_string(),
            ));
        }

        let email = identity
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                SocialLoginError::ValidationError(
                    "Your social account does not share an email address".to_string(),
                )
            })?;

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        {
            Some(user) => user,
            None => self.create_social_user(&email).await?,
        };

        if !user.is_active {
            return Err(SocialLoginError::ValidationError(
                "This user has been deactivated.".to_string(),
            ));
        }

        Ok(self.users.auth_response(&user)?)
    }

    async fn create_social_user(&self, email: &str) -> Result<User, SocialLoginError> {
        let username = self.unique_username(&username_from_email(email)).await?;
        let password_hash =
            hash_password(&Uuid::new_v4().to_string()).context("Failed to hash password")?;

        let user = self
            .user_repo
            .create(&User::new(username, email.to_string(), password_hash).activated())
            .await
            .context("Failed to create user")?;
        self.profile_repo
            .create_for_user(user.id)
            .await
            .context("Failed to create profile")?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered through social login");
        Ok(user)
    }

    async fn unique_username(&self, base: &str) -> Result<String, SocialLoginError> {
        let mut candidate = base.to_string();
        let mut n: u32 = 1;
        while self
            .user_repo
            .get_by_username(&candidate)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            let suffix = n.to_string();
            let stem: String = base.chars().take(USERNAME_MAX_LEN - suffix.len()).collect();
            candidate = format!("{}{}", stem, suffix);
            n += 1;
        }
        Ok(candidate)
    }
}

/// Username seed: the email local part reduced to word characters
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned.to_lowercase().chars().take(USERNAME_MAX_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxProfileRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::services::mailer::RecordingMailer;
    use crate::services::rate_limiter::LoginRateLimiter;
    use crate::services::token::{JwtManager, ResetTokenGenerator};
    use crate::services::user::RegisterInput;

    /// Accepts the token "good-token" and reports the configured email
    struct FakeIdentityClient {
        email: Option<String>,
        verified: Option<bool>,
    }

    #[async_trait]
    impl IdentityClient for FakeIdentityClient {
        async fn fetch_identity(
            &self,
            _provider: Provider,
            access_token: &str,
        ) -> Result<SocialIdentity, SocialLoginError> {
            if access_token != "good-token" {
                return Err(SocialLoginError::InvalidToken);
            }
            Ok(SocialIdentity {
                email: self.email.clone(),
                name: Some("Amina".into()),
                email_verified: self.verified,
            })
        }
    }

    async fn setup(email: Option<&str>) -> (DynDatabasePool, Arc<UserService>, SocialAuthService) {
        setup_with(email, Some(true)).await
    }

    async fn setup_with(
        email: Option<&str>,
        verified: Option<bool>,
    ) -> (DynDatabasePool, Arc<UserService>, SocialAuthService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let users = Arc::new(UserService::new(
            user_repo.clone(),
            profile_repo.clone(),
            Arc::new(JwtManager::new("test-secret", 3600)),
            ResetTokenGenerator::new("test-secret", 3),
            Arc::new(RecordingMailer::default()),
            Arc::new(LoginRateLimiter::new()),
            false,
            "http://haven.test",
        ));
        let social = SocialAuthService::new(
            user_repo,
            profile_repo,
            users.clone(),
            Arc::new(FakeIdentityClient {
                email: email.map(str::to_string),
                verified,
            }),
        );
        (pool, users, social)
    }

    fn input(provider: &str, token: &str) -> SocialLoginInput {
        SocialLoginInput {
            provider: Some(provider.into()),
            access_token: Some(token.into()),
            access_token_secret: None,
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("Google"), Some(Provider::Google));
        assert_eq!(Provider::parse("facebook"), Some(Provider::Facebook));
        assert_eq!(Provider::parse("twitter"), None);
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("Amina.W@example.com"), "amina.w");
        assert_eq!(username_from_email("+++@example.com"), "user");

        let long = format!("{}@example.com", "a".repeat(80));
        assert_eq!(username_from_email(&long).len(), USERNAME_MAX_LEN);
    }

    #[test]
    fn test_identity_email_trust() {
        let identity: SocialIdentity =
            serde_json::from_str(r#"{"email":"a@example.com","verified_email":true}"#).unwrap();
        assert!(identity.has_trusted_email(Provider::Google));

        let identity: SocialIdentity =
            serde_json::from_str(r#"{"email":"a@example.com","email_verified":false}"#).unwrap();
        assert!(!identity.has_trusted_email(Provider::Google));
        assert!(!identity.has_trusted_email(Provider::Facebook));

        let identity: SocialIdentity = serde_json::from_str(r#"{"email":"a@example.com"}"#).unwrap();
        assert!(!identity.has_trusted_email(Provider::Google));
        assert!(identity.has_trusted_email(Provider::Facebook));
    }

    #[tokio::test]
    async fn test_unverified_google_email_is_not_linked() {
        let (_pool, users, social) = setup_with(Some("amina@example.com"), None).await;
        users
            .register(RegisterInput::new("writer", "amina@example.com", "password1"))
            .await
            .unwrap();

        let err = social.login(input("google", "good-token")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Your social account email address has not been verified"
        );

        let (_pool, _users, social) = setup_with(Some("amina@example.com"), Some(false)).await;
        let err = social.login(input("facebook", "good-token")).await.unwrap_err();
        assert!(matches!(err, SocialLoginError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_social_username_stays_within_limit_on_collision() {
        let local = "b".repeat(60);
        let email = format!("{}@gmail.com", local);
        let (_pool, users, social) = setup(Some(email.as_str())).await;
        users
            .register(RegisterInput::new("b".repeat(USERNAME_MAX_LEN), "other@example.com", "password1"))
            .await
            .unwrap();

        let response = social.login(input("google", "good-token")).await.unwrap();
        assert_eq!(response.username.len(), USERNAME_MAX_LEN);
        assert!(response.username.ends_with('1'));
    }

    #[tokio::test]
    async fn test_social_login_creates_user() {
        let (_pool, users, social) = setup(Some("amina@example.com")).await;
        let response = social.login(input("google", "good-token")).await.unwrap();
        assert_eq!(response.email, "amina@example.com");
        assert_eq!(response.username, "amina");

        let user = users.authenticate(&response.token).await.unwrap();
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_social_login_matches_existing_user() {
        let (_pool, users, social) = setup(Some("amina@example.com")).await;
        users
            .register(RegisterInput::new("writer", "amina@example.com", "password1"))
            .await
            .unwrap();

        let response = social.login(input("facebook", "good-token")).await.unwrap();
        assert_eq!(response.username, "writer");
    }

    #[tokio::test]
    async fn test_social_login_username_collision() {
        let (_pool, users, social) = setup(Some("amina@gmail.com")).await;
        users
            .register(RegisterInput::new("amina", "amina@example.com", "password1"))
            .await
            .unwrap();

        let response = social.login(input("google", "good-token")).await.unwrap();
        assert_eq!(response.username, "amina1");
    }

    #[tokio::test]
    async fn test_social_login_errors() {
        let (_pool, _users, social) = setup(Some("amina@example.com")).await;

        let err = social.login(input("twitter", "good-token")).await.unwrap_err();
        assert_eq!(err.to_string(), "Provider not supported");

        let err = social.login(input("google", "bad-token")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid token");

        let err = social
            .login(SocialLoginInput {
                provider: Some("google".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SocialLoginError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_social_login_without_email() {
        let (_pool, _users, social) = setup(None).await;
        let err = social.login(input("google", "good-token")).await.unwrap_err();
        assert!(matches!(err, SocialLoginError::ValidationError(_)));
    }
}
