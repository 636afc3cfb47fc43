//! Profile repository
//!
//! Profiles and the follow graph between users. Profile rows are always
//! read joined with `users` so they carry the username and email.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Profile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const PROFILE_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.username, u.email, p.first_name, p.last_name, p.birth_date,
           p.bio, p.avatar, p.city, p.country, p.phone, p.website,
           p.app_notification_enabled, p.email_notification_enabled, p.created_at, p.updated_at
    FROM profiles p
    INNER JOIN users u ON u.id = p.user_id
"#;

/// Profile and follow graph repository trait
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create the empty profile of a new user
    async fn create_for_user(&self, user_id: i64) -> Result<Profile>;

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<Profile>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<Profile>>;

    /// List all profiles ordered by username
    async fn list(&self) -> Result<Vec<Profile>>;

    /// Persist the editable profile fields
    async fn update(&self, profile: &Profile) -> Result<Profile>;

    async fn set_app_notifications(&self, user_id: i64, enabled: bool) -> Result<()>;

    async fn set_email_notifications(&self, user_id: i64, enabled: bool) -> Result<()>;

    /// Add a follow edge. Returns false if it already existed.
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Remove a follow edge. Returns false if there was none.
    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Profiles of the users following `user_id`
    async fn followers(&self, user_id: i64) -> Result<Vec<Profile>>;

    /// Profiles of the users `user_id` follows
    async fn following(&self, user_id: i64) -> Result<Vec<Profile>>;

    /// (followers, following) counts
    async fn follow_counts(&self, user_id: i64) -> Result<(i64, i64)>;

    /// Followers of `user_id` that accept in-app notifications
    async fn notifiable_follower_ids(&self, user_id: i64) -> Result<Vec<i64>>;
}

/// SQLx-based profile repository implementation
pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn create_for_user(&self, user_id: i64) -> Result<Profile> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_profile_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => create_profile_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<Profile>> {
        let sql = format!("{} WHERE p.user_id = ?", PROFILE_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get profile")?;
                Ok(row.as_ref().map(row_to_profile_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get profile")?;
                Ok(row.as_ref().map(row_to_profile_mysql))
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let sql = format!("{} WHERE u.username = ?", PROFILE_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get profile")?;
                Ok(row.as_ref().map(row_to_profile_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(username)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get profile")?;
                Ok(row.as_ref().map(row_to_profile_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Profile>> {
        let sql = format!("{} ORDER BY u.username ASC", PROFILE_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_profiles_sqlite(self.pool.as_sqlite().unwrap(), &sql, None).await
            }
            DatabaseDriver::Mysql => {
                list_profiles_mysql(self.pool.as_mysql().unwrap(), &sql, None).await
            }
        }
    }

    async fn update(&self, profile: &Profile) -> Result<Profile> {
        let sql = r#"
            UPDATE profiles
            SET first_name = ?, last_name = ?, birth_date = ?, bio = ?, avatar = ?,
                city = ?, country = ?, phone = ?, website = ?, updated_at = ?
            WHERE user_id = ?
        "#;
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&profile.first_name)
                    .bind(&profile.last_name)
                    .bind(profile.birth_date)
                    .bind(&profile.bio)
                    .bind(&profile.avatar)
                    .bind(&profile.city)
                    .bind(&profile.country)
                    .bind(&profile.phone)
                    .bind(&profile.website)
                    .bind(now)
                    .bind(profile.user_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update profile")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&profile.first_name)
                    .bind(&profile.last_name)
                    .bind(profile.birth_date)
                    .bind(&profile.bio)
                    .bind(&profile.avatar)
                    .bind(&profile.city)
                    .bind(&profile.country)
                    .bind(&profile.phone)
                    .bind(&profile.website)
                    .bind(now)
                    .bind(profile.user_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update profile")?;
            }
        }

        self.get_by_user_id(profile.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Profile not found after update"))
    }

    async fn set_app_notifications(&self, user_id: i64, enabled: bool) -> Result<()> {
        self.set_flag("app_notification_enabled", user_id, enabled).await
    }

    async fn set_email_notifications(&self, user_id: i64, enabled: bool) -> Result<()> {
        self.set_flag("email_notification_enabled", user_id, enabled).await
    }

    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(followed_id)
            .bind(now)
            .execute(self.pool.as_sqlite().unwrap())
            .await
            .context("Failed to follow user")?
            .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(followed_id)
            .bind(now)
            .execute(self.pool.as_mysql().unwrap())
            .await
            .context("Failed to follow user")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE follower_id = ? AND followed_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to unfollow user")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to unfollow user")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM follows WHERE follower_id = ? AND followed_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check follow")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(follower_id)
                .bind(followed_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check follow")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn followers(&self, user_id: i64) -> Result<Vec<Profile>> {
        let sql = format!(
            "{} INNER JOIN follows f ON f.follower_id = p.user_id WHERE f.followed_id = ? ORDER BY f.created_at DESC",
            PROFILE_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_profiles_sqlite(self.pool.as_sqlite().unwrap(), &sql, Some(user_id)).await
            }
            DatabaseDriver::Mysql => {
                list_profiles_mysql(self.pool.as_mysql().unwrap(), &sql, Some(user_id)).await
            }
        }
    }

    async fn following(&self, user_id: i64) -> Result<Vec<Profile>> {
        let sql = format!(
            "{} INNER JOIN follows f ON f.followed_id = p.user_id WHERE f.follower_id = ? ORDER BY f.created_at DESC",
            PROFILE_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_profiles_sqlite(self.pool.as_sqlite().unwrap(), &sql, Some(user_id)).await
            }
            DatabaseDriver::Mysql => {
                list_profiles_mysql(self.pool.as_mysql().unwrap(), &sql, Some(user_id)).await
            }
        }
    }

    async fn follow_counts(&self, user_id: i64) -> Result<(i64, i64)> {
        let sql = r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE followed_id = ?) AS followers,
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?) AS following
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to count follows")?;
                Ok((row.get("followers"), row.get("following")))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(user_id)
                    .bind(user_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to count follows")?;
                Ok((row.get("followers"), row.get("following")))
            }
        }
    }

    async fn notifiable_follower_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let sql = r#"
            SELECT f.follower_id AS id
            FROM follows f
            INNER JOIN profiles p ON p.user_id = f.follower_id
            WHERE f.followed_id = ? AND p.app_notification_enabled = ?
            ORDER BY f.follower_id
        "#;
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(true)
                .fetch_all(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to list followers")?
                .iter()
                .map(|row| row.get("id"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(true)
                .fetch_all(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to list followers")?
                .iter()
                .map(|row| row.get("id"))
                .collect(),
        };
        Ok(ids)
    }
}

impl SqlxProfileRepository {
    async fn set_flag(&self, column: &str, user_id: i64, enabled: bool) -> Result<()> {
        let sql = format!("UPDATE profiles SET {} = ?, updated_at = ? WHERE user_id = ?", column);
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(&sql)
                    .bind(enabled)
                    .bind(now)
                    .bind(user_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update notification setting")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(&sql)
                    .bind(enabled)
                    .bind(now)
                    .bind(user_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update notification setting")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_profile_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Profile> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, first_name, last_name, bio, city, country,
                              app_notification_enabled, email_notification_enabled, created_at, updated_at)
        VALUES (?, '', '', '', '', '', ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(true)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create profile")?;

    let sql = format!("{} WHERE p.user_id = ?", PROFILE_SELECT);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to get profile after insert")?;
    Ok(row_to_profile_sqlite(&row))
}

async fn list_profiles_sqlite(
    pool: &SqlitePool,
    sql: &str,
    user_id: Option<i64>,
) -> Result<Vec<Profile>> {
    let mut query = sqlx::query(sql);
    if let Some(id) = user_id {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list profiles")?;
    Ok(rows.iter().map(row_to_profile_sqlite).collect())
}

fn row_to_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> Profile {
    Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        birth_date: row.try_get("birth_date").ok().flatten(),
        bio: row.get("bio"),
        avatar: row.try_get("avatar").ok().flatten(),
        city: row.get("city"),
        country: row.get("country"),
        phone: row.try_get("phone").ok().flatten(),
        website: row.try_get("website").ok().flatten(),
        app_notification_enabled: row.get("app_notification_enabled"),
        email_notification_enabled: row.get("email_notification_enabled"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_profile_mysql(pool: &MySqlPool, user_id: i64) -> Result<Profile> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, first_name, last_name, bio, city, country,
                              app_notification_enabled, email_notification_enabled, created_at, updated_at)
        VALUES (?, '', '', '', '', '', ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(true)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create profile")?;

    let sql = format!("{} WHERE p.user_id = ?", PROFILE_SELECT);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to get profile after insert")?;
    Ok(row_to_profile_mysql(&row))
}

async fn list_profiles_mysql(
    pool: &MySqlPool,
    sql: &str,
    user_id: Option<i64>,
) -> Result<Vec<Profile>> {
    let mut query = sqlx::query(sql);
    if let Some(id) = user_id {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list profiles")?;
    Ok(rows.iter().map(row_to_profile_mysql).collect())
}

fn row_to_profile_mysql(row: &sqlx::mysql::MySqlRow) -> Profile {
    Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        birth_date: row.try_get("birth_date").ok().flatten(),
        bio: row.get("bio"),
        avatar: row.try_get("avatar").ok().flatten(),
        city: row.get("city"),
        country: row.get("country"),
        phone: row.try_get("phone").ok().flatten(),
        website: row.try_get("website").ok().flatten(),
        app_notification_enabled: row.get("app_notification_enabled"),
        email_notification_enabled: row.get("email_notification_enabled"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
