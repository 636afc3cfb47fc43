//! Profile service
//!
//! Profile lookups plus the follow graph. Every profile view is rendered
//! relative to a viewer so `following` can be filled in.

use crate::db::repositories::ProfileRepository;
use crate::models::{Profile, User};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

const USER_NOT_FOUND: &str = "The user you are looking for does not exist";

/// Error types for profile service operations
#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Public view of a profile
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub bio: String,
    pub avatar: String,
    pub city: String,
    pub country: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub following: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile service
pub struct ProfileService {
    repo: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn ProfileRepository>) -> Self {
        Self { repo }
    }

    /// Render a profile as seen by `viewer`
    pub async fn view(
        &self,
        profile: Profile,
        viewer: Option<&User>,
    ) -> Result<ProfileView, ProfileServiceError> {
        let following = match viewer {
            Some(viewer) if viewer.id != profile.user_id => self
                .repo
                .is_following(viewer.id, profile.user_id)
                .await
                .context("Failed to check follow")?,
            _ => false,
        };
        let (followers_count, following_count) = self
            .repo
            .follow_counts(profile.user_id)
            .await
            .context("Failed to count follows")?;

        Ok(ProfileView {
            avatar: profile.avatar_url(),
            username: profile.username,
            first_name: profile.first_name,
            last_name: profile.last_name,
            birth_date: profile.birth_date,
            bio: profile.bio,
            city: profile.city,
            country: profile.country,
            phone: profile.phone,
            website: profile.website,
            following,
            followers_count,
            following_count,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        })
    }

    async fn views(
        &self,
        profiles: Vec<Profile>,
        viewer: Option<&User>,
    ) -> Result<Vec<ProfileView>, ProfileServiceError> {
        let mut views = Vec::with_capacity(profiles.len());
        for profile in profiles {
            views.push(self.view(profile, viewer).await?);
        }
        Ok(views)
    }

    async fn find(&self, username: &str) -> Result<Profile, ProfileServiceError> {
        self.repo
            .get_by_username(username)
            .await
            .context("Failed to get profile")?
            .ok_or_else(|| ProfileServiceError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// All profiles
    pub async fn list(&self, viewer: &User) -> Result<Vec<ProfileView>, ProfileServiceError> {
        let profiles = self.repo.list().await.context("Failed to list profiles")?;
        self.views(profiles, Some(viewer)).await
    }

    pub async fn get(
        &self,
        username: &str,
        viewer: Option<&User>,
    ) -> Result<ProfileView, ProfileServiceError> {
        let profile = self.find(username).await?;
        self.view(profile, viewer).await
    }

    /// Follow `username`; following twice is a no-op
    pub async fn follow(&self, viewer: &User, username: &str) -> Result<ProfileView, ProfileServiceError> {
        let profile = self.find(username).await?;
        if profile.user_id == viewer.id {
            return Err(ProfileServiceError::ValidationError(
                "You cannot follow yourself".to_string(),
            ));
        }

        if self
            .repo
            .follow(viewer.id, profile.user_id)
            .await
            .context("Failed to follow user")?
        {
            tracing::debug!(follower = viewer.id, followed = profile.user_id, "Followed");
        }
        self.view(profile, Some(viewer)).await
    }

    pub async fn unfollow(&self, viewer: &User, username: &str) -> Result<ProfileView, ProfileServiceError> {
        let profile = self.find(username).await?;
        if profile.user_id == viewer.id {
            return Err(ProfileServiceError::ValidationError(
                "You cannot perform that action".to_string(),
            ));
        }

        self.repo
            .unfollow(viewer.id, profile.user_id)
            .await
            .context("Failed to unfollow user")?;
        self.view(profile, Some(viewer)).await
    }

    /// Profiles following `username`
    pub async fn followers(
        &self,
        username: &str,
        viewer: Option<&User>,
    ) -> Result<Vec<ProfileView>, ProfileServiceError> {
        let profile = self.find(username).await?;
        let followers = self
            .repo
            .followers(profile.user_id)
            .await
            .context("Failed to list followers")?;
        self.views(followers, viewer).await
    }

    /// Profiles `username` follows
    pub async fn following(
        &self,
        username: &str,
        viewer: Option<&User>,
    ) -> Result<Vec<ProfileView>, ProfileServiceError> {
        let profile = self.find(username).await?;
        let following = self
            .repo
            .following(profile.user_id)
            .await
            .context("Failed to list following")?;
        self.views(following, viewer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxProfileRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, ProfileService, User, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let profiles = SqlxProfileRepository::boxed(pool.clone());
        let mut created = Vec::new();
        for name in ["amina", "brian"] {
            let user = users
                .create(&User::new(name.into(), format!("{}@example.com", name), "hash".into()).activated())
                .await
                .unwrap();
            profiles.create_for_user(user.id).await.unwrap();
            created.push(user);
        }
        let brian = created.pop().unwrap();
        let amina = created.pop().unwrap();

        (pool, ProfileService::new(profiles), amina, brian)
    }

    #[tokio::test]
    async fn test_get_profile_and_gravatar() {
        let (_pool, service, amina, _) = setup().await;
        let view = service.get("amina", Some(&amina)).await.unwrap();
        assert_eq!(view.username, "amina");
        assert!(view.avatar.starts_with("https://www.gravatar.com/avatar/"));
        assert!(!view.following);

        let err = service.get("ghost", None).await.unwrap_err();
        assert_eq!(err.to_string(), USER_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (_pool, service, amina, brian) = setup().await;

        let view = service.follow(&amina, "brian").await.unwrap();
        assert!(view.following);
        assert_eq!(view.followers_count, 1);

        // Idempotent
        let view = service.follow(&amina, "brian").await.unwrap();
        assert_eq!(view.followers_count, 1);

        let followers = service.followers("brian", Some(&brian)).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "amina");

        let following = service.following("amina", None).await.unwrap();
        assert_eq!(following[0].username, "brian");

        let view = service.unfollow(&amina, "brian").await.unwrap();
        assert!(!view.following);
        assert_eq!(view.followers_count, 0);
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let (_pool, service, amina, _) = setup().await;
        let err = service.follow(&amina, "amina").await.unwrap_err();
        assert_eq!(err.to_string(), "You cannot follow yourself");

        let err = service.unfollow(&amina, "amina").await.unwrap_err();
        assert_eq!(err.to_string(), "You cannot perform that action");

        let err = service.follow(&amina, "ghost").await.unwrap_err();
        assert!(matches!(err, ProfileServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_profiles() {
        let (_pool, service, amina, _) = setup().await;
        let all = service.list(&amina).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
