//! Reaction repository
//!
//! Likes/dislikes, ratings and favourites. Each table holds at most one row
//! per (article, user); likes and ratings are upserted.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Opinion, RatingTotals, ReactionCounts};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Reaction repository trait
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// The user's current opinion of an article, if any
    async fn get_opinion(&self, article_id: i64, user_id: i64) -> Result<Option<Opinion>>;

    /// Record or switch the user's opinion
    async fn set_opinion(&self, article_id: i64, user_id: i64, opinion: Opinion) -> Result<()>;

    /// Like, dislike and favourite counts
    async fn counts(&self, article_id: i64) -> Result<ReactionCounts>;

    /// Record or replace the user's rating
    async fn upsert_rating(&self, article_id: i64, user_id: i64, rating: i32) -> Result<()>;

    /// The user's rating of an article, if any
    async fn get_rating(&self, article_id: i64, user_id: i64) -> Result<Option<i32>>;

    /// Sum and count of all ratings
    async fn rating_totals(&self, article_id: i64) -> Result<RatingTotals>;

    /// Flip the favourite flag. Returns true if the article is now favourited.
    async fn toggle_favourite(&self, article_id: i64, user_id: i64) -> Result<bool>;

    async fn is_favourited(&self, article_id: i64, user_id: i64) -> Result<bool>;
}

/// SQLx-based reaction repository implementation
pub struct SqlxReactionRepository {
    pool: DynDatabasePool,
}

impl SqlxReactionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReactionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReactionRepository for SqlxReactionRepository {
    async fn get_opinion(&self, article_id: i64, user_id: i64) -> Result<Option<Opinion>> {
        let sql = "SELECT is_like FROM article_likes WHERE article_id = ? AND user_id = ?";
        let is_like: Option<bool> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_optional(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to get opinion")?
                .map(|row| row.get("is_like")),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_optional(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to get opinion")?
                .map(|row| row.get("is_like")),
        };
        Ok(is_like.map(Opinion::from_like_flag))
    }

    async fn set_opinion(&self, article_id: i64, user_id: i64, opinion: Opinion) -> Result<()> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    r#"
                    INSERT INTO article_likes (article_id, user_id, is_like, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(article_id, user_id)
                    DO UPDATE SET is_like = excluded.is_like, updated_at = excluded.updated_at
                    "#,
                )
                .bind(article_id)
                .bind(user_id)
                .bind(opinion.is_like())
                .bind(now)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to save opinion")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    r#"
                    INSERT INTO article_likes (article_id, user_id, is_like, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE is_like = VALUES(is_like), updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(article_id)
                .bind(user_id)
                .bind(opinion.is_like())
                .bind(now)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to save opinion")?;
            }
        }
        Ok(())
    }

    async fn counts(&self, article_id: i64) -> Result<ReactionCounts> {
        let sql = r#"
            SELECT
                (SELECT COUNT(*) FROM article_likes WHERE article_id = ? AND is_like = ?) AS likes,
                (SELECT COUNT(*) FROM article_likes WHERE article_id = ? AND is_like = ?) AS dislikes,
                (SELECT COUNT(*) FROM article_favourites WHERE article_id = ?) AS favourites
        "#;
        let counts = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(article_id)
                    .bind(true)
                    .bind(article_id)
                    .bind(false)
                    .bind(article_id)
                    .fetch_one(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to count reactions")?;
                ReactionCounts {
                    likes: row.get("likes"),
                    dislikes: row.get("dislikes"),
                    favourites: row.get("favourites"),
                }
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(article_id)
                    .bind(true)
                    .bind(article_id)
                    .bind(false)
                    .bind(article_id)
                    .fetch_one(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to count reactions")?;
                ReactionCounts {
                    likes: row.get("likes"),
                    dislikes: row.get("dislikes"),
                    favourites: row.get("favourites"),
                }
            }
        };
        Ok(counts)
    }

    async fn upsert_rating(&self, article_id: i64, user_id: i64, rating: i32) -> Result<()> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    r#"
                    INSERT INTO article_ratings (article_id, user_id, rating, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(article_id, user_id)
                    DO UPDATE SET rating = excluded.rating, updated_at = excluded.updated_at
                    "#,
                )
                .bind(article_id)
                .bind(user_id)
                .bind(rating)
                .bind(now)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to save rating")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    r#"
                    INSERT INTO article_ratings (article_id, user_id, rating, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE rating = VALUES(rating), updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(article_id)
                .bind(user_id)
                .bind(rating)
                .bind(now)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to save rating")?;
            }
        }
        Ok(())
    }

    async fn get_rating(&self, article_id: i64, user_id: i64) -> Result<Option<i32>> {
        let sql = "SELECT rating FROM article_ratings WHERE article_id = ? AND user_id = ?";
        let rating = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_optional(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to get rating")?
                .map(|row| row.get("rating")),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_optional(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to get rating")?
                .map(|row| row.get("rating")),
        };
        Ok(rating)
    }

    async fn rating_totals(&self, article_id: i64) -> Result<RatingTotals> {
        let totals = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(
                    "SELECT COALESCE(SUM(rating), 0) AS total, COUNT(*) AS count FROM article_ratings WHERE article_id = ?",
                )
                .bind(article_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to total ratings")?;
                RatingTotals {
                    sum: row.get("total"),
                    count: row.get("count"),
                }
            }
            DatabaseDriver::Mysql => {
                // SUM over INT yields DECIMAL in MySQL
                let row = sqlx::query(
                    "SELECT CAST(COALESCE(SUM(rating), 0) AS SIGNED) AS total, COUNT(*) AS count FROM article_ratings WHERE article_id = ?",
                )
                .bind(article_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to total ratings")?;
                RatingTotals {
                    sum: row.get("total"),
                    count: row.get("count"),
                }
            }
        };
        Ok(totals)
    }

    async fn toggle_favourite(&self, article_id: i64, user_id: i64) -> Result<bool> {
        if self.is_favourited(article_id, user_id).await? {
            let sql = "DELETE FROM article_favourites WHERE article_id = ? AND user_id = ?";
            match self.pool.driver() {
                DatabaseDriver::Sqlite => {
                    sqlx::query(sql)
                        .bind(article_id)
                        .bind(user_id)
                        .execute(self.pool.as_sqlite().unwrap())
                        .await
                        .context("Failed to remove favourite")?;
                }
                DatabaseDriver::Mysql => {
                    sqlx::query(sql)
                        .bind(article_id)
                        .bind(user_id)
                        .execute(self.pool.as_mysql().unwrap())
                        .await
                        .context("Failed to remove favourite")?;
                }
            }
            return Ok(false);
        }

        let sql = "INSERT INTO article_favourites (article_id, user_id, created_at) VALUES (?, ?, ?)";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(article_id)
                    .bind(user_id)
                    .bind(now)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to add favourite")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(article_id)
                    .bind(user_id)
                    .bind(now)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to add favourite")?;
            }
        }
        Ok(true)
    }

    async fn is_favourited(&self, article_id: i64, user_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM article_favourites WHERE article_id = ? AND user_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check favourite")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check favourite")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArticleRepository, SqlxArticleRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateArticleInput, User};

    /// Returns the repo, an article id and two reader ids
    async fn setup() -> (SqlxReactionRepository, i64, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["author", "reader1", "reader2"] {
            let user = users
                .create(&User::new(name.into(), format!("{}@example.com", name), "hash".into()))
                .await
                .unwrap();
            ids.push(user.id);
        }
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&CreateArticleInput {
                slug: "liked".into(),
                title: "Liked".into(),
                description: "d".into(),
                body: "b".into(),
                image: "img".into(),
                author_id: ids[0],
                time_to_read: "1 min".into(),
            })
            .await
            .unwrap();

        (SqlxReactionRepository::new(pool), article.id, ids[1], ids[2])
    }

    #[tokio::test]
    async fn test_opinion_upsert_and_counts() {
        let (repo, article, r1, r2) = setup().await;
        assert!(repo.get_opinion(article, r1).await.unwrap().is_none());

        repo.set_opinion(article, r1, Opinion::Like).await.unwrap();
        repo.set_opinion(article, r2, Opinion::Dislike).await.unwrap();
        assert_eq!(repo.get_opinion(article, r1).await.unwrap(), Some(Opinion::Like));

        let counts = repo.counts(article).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (1, 1));

        // Switching keeps one row per user
        repo.set_opinion(article, r2, Opinion::Like).await.unwrap();
        let counts = repo.counts(article).await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (2, 0));
    }

    #[tokio::test]
    async fn test_rating_upsert_and_totals() {
        let (repo, article, r1, r2) = setup().await;
        assert_eq!(repo.rating_totals(article).await.unwrap().average(), None);

        repo.upsert_rating(article, r1, 5).await.unwrap();
        repo.upsert_rating(article, r2, 2).await.unwrap();
        assert_eq!(repo.rating_totals(article).await.unwrap().average(), Some(3.5));

        repo.upsert_rating(article, r2, 4).await.unwrap();
        let totals = repo.rating_totals(article).await.unwrap();
        assert_eq!(totals, RatingTotals { sum: 9, count: 2 });
        assert_eq!(repo.get_rating(article, r2).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_toggle_favourite() {
        let (repo, article, r1, _) = setup().await;

        assert!(repo.toggle_favourite(article, r1).await.unwrap());
        assert!(repo.is_favourited(article, r1).await.unwrap());
        assert_eq!(repo.counts(article).await.unwrap().favourites, 1);

        assert!(!repo.toggle_favourite(article, r1).await.unwrap());
        assert!(!repo.is_favourited(article, r1).await.unwrap());
        assert_eq!(repo.counts(article).await.unwrap().favourites, 0);
    }
}
