//! Fixtures shared by the service tests

use crate::cache::create_cache;
use crate::config::CacheConfig;
use crate::db::repositories::{
    ProfileRepository, SqlxArticleRepository, SqlxNotificationRepository, SqlxProfileRepository,
    SqlxReactionRepository, SqlxTagRepository, SqlxUserRepository, UserRepository,
};
use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::models::User;
use crate::services::article::ArticleService;
use crate::services::notification::NotificationService;
use std::sync::Arc;

pub async fn setup_pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Active user with a profile
pub async fn create_user(pool: &DynDatabasePool, username: &str) -> User {
    insert_user(pool, User::new(username.into(), format!("{}@example.com", username), "hash".into()).activated()).await
}

pub async fn create_staff(pool: &DynDatabasePool, username: &str) -> User {
    let mut user = User::new(username.into(), format!("{}@example.com", username), "hash".into()).activated();
    user.is_staff = true;
    insert_user(pool, user).await
}

async fn insert_user(pool: &DynDatabasePool, user: User) -> User {
    let user = SqlxUserRepository::new(pool.clone())
        .create(&user)
        .await
        .expect("Failed to create user");
    SqlxProfileRepository::new(pool.clone())
        .create_for_user(user.id)
        .await
        .expect("Failed to create profile");
    user
}

pub fn notification_service(pool: &DynDatabasePool) -> Arc<NotificationService> {
    Arc::new(NotificationService::new(
        SqlxNotificationRepository::boxed(pool.clone()),
        SqlxProfileRepository::boxed(pool.clone()),
    ))
}

pub fn article_service(pool: &DynDatabasePool) -> Arc<ArticleService> {
    Arc::new(ArticleService::new(
        SqlxArticleRepository::boxed(pool.clone()),
        SqlxTagRepository::boxed(pool.clone()),
        SqlxReactionRepository::boxed(pool.clone()),
        SqlxUserRepository::boxed(pool.clone()),
        SqlxProfileRepository::boxed(pool.clone()),
        create_cache(&CacheConfig::default()),
        notification_service(pool),
    ))
}
