//! Bookmark repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Bookmark;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const BOOKMARK_SELECT: &str = r#"
    SELECT b.id, b.user_id, b.article_id, a.slug AS article_slug, a.title AS article_title, b.created_at
    FROM bookmarks b
    INNER JOIN articles a ON a.id = b.article_id
"#;

/// Bookmark repository trait
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Save an article for a user
    async fn create(&self, user_id: i64, article_id: i64) -> Result<Bookmark>;

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Bookmark>>;

    /// A user's bookmarks, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Bookmark>>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Remove every bookmark of a user, returning how many were removed
    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64>;
}

/// SQLx-based bookmark repository implementation
pub struct SqlxBookmarkRepository {
    pool: DynDatabasePool,
}

impl SqlxBookmarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookmarkRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookmarkRepository for SqlxBookmarkRepository {
    async fn create(&self, user_id: i64, article_id: i64) -> Result<Bookmark> {
        let sql = "INSERT INTO bookmarks (article_id, user_id, created_at) VALUES (?, ?, ?)";
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to create bookmark")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to create bookmark")?
                .last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Bookmark not found after insert"))
    }

    async fn exists(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM bookmarks WHERE user_id = ? AND article_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(article_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check bookmark")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(article_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check bookmark")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Bookmark>> {
        let sql = format!("{} WHERE b.id = ?", BOOKMARK_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get bookmark")?;
                Ok(row.as_ref().map(row_to_bookmark_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get bookmark")?;
                Ok(row.as_ref().map(row_to_bookmark_mysql))
            }
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Bookmark>> {
        let sql = format!("{} WHERE b.user_id = ? ORDER BY b.created_at DESC, b.id DESC", BOOKMARK_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list bookmarks")?;
                Ok(rows.iter().map(row_to_bookmark_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list bookmarks")?;
                Ok(rows.iter().map(row_to_bookmark_mysql).collect())
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM bookmarks WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete bookmark")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM bookmarks WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete bookmark")?;
            }
        }
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64> {
        let sql = "DELETE FROM bookmarks WHERE user_id = ?";
        let removed = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to clear bookmarks")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to clear bookmarks")?
                .rows_affected(),
        };
        Ok(removed)
    }
}

fn row_to_bookmark_sqlite(row: &sqlx::sqlite::SqliteRow) -> Bookmark {
    Bookmark {
        id: row.get("id"),
        user_id: row.get("user_id"),
        article_id: row.get("article_id"),
        article_slug: row.get("article_slug"),
        article_title: row.get("article_title"),
        created_at: row.get("created_at"),
    }
}

fn row_to_bookmark_mysql(row: &sqlx::mysql::MySqlRow) -> Bookmark {
    Bookmark {
        id: row.get("id"),
        user_id: row.get("user_id"),
        article_id: row.get("article_id"),
        article_slug: row.get("article_slug"),
        article_title: row.get("article_title"),
        created_at: row.get("created_at"),
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

    async fn setup() -> (SqlxBookmarkRepository, SqlxArticleRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("amina".into(), "amina@example.com".into(), "hash".into()))
            .await
            .unwrap();
        (
            SqlxBookmarkRepository::new(pool.clone()),
            SqlxArticleRepository::new(pool),
            user.id,
        )
    }

    async fn article(repo: &SqlxArticleRepository, slug: &str, author_id: i64) -> i64 {
        repo.create(&CreateArticleInput {
            slug: slug.into(),
            title: slug.to_uppercase(),
            description: "d".into(),
            body: "b".into(),
            image: "img".into(),
            author_id,
            time_to_read: "1 min".into(),
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_create_and_list_bookmarks() {
        let (repo, articles, user) = setup().await;
        let first = article(&articles, "first", user).await;
        let second = article(&articles, "second", user).await;

        let bookmark = repo.create(user, first).await.unwrap();
        assert_eq!(bookmark.article_slug, "first");
        assert_eq!(bookmark.article_title, "FIRST");
        repo.create(user, second).await.unwrap();

        assert!(repo.exists(user, first).await.unwrap());
        assert_eq!(repo.list_for_user(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_bookmark_rejected() {
        let (repo, articles, user) = setup().await;
        let id = article(&articles, "only", user).await;
        repo.create(user, id).await.unwrap();
        assert!(repo.create(user, id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_bookmarks() {
        let (repo, articles, user) = setup().await;
        let a = article(&articles, "a", user).await;
        let b = article(&articles, "b", user).await;
        let first = repo.create(user, a).await.unwrap();
        repo.create(user, b).await.unwrap();

        repo.delete(first.id).await.unwrap();
        assert!(repo.get_by_id(first.id).await.unwrap().is_none());

        assert_eq!(repo.delete_all_for_user(user).await.unwrap(), 1);
        assert!(repo.list_for_user(user).await.unwrap().is_empty());
    }
}
