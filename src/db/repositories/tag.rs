//! Tag repository
//!
//! Tags are shared between articles through `article_tags`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Tag;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Find a tag by name, creating it if needed
    async fn get_or_create(&self, tag: &str) -> Result<Tag>;

    /// Replace the tags attached to an article
    async fn set_article_tags(&self, article_id: i64, tags: &[String]) -> Result<Vec<Tag>>;

    /// Tags attached to an article, alphabetically
    async fn get_for_article(&self, article_id: i64) -> Result<Vec<Tag>>;

    /// All tags, alphabetically
    async fn list(&self) -> Result<Vec<Tag>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_or_create(&self, tag: &str) -> Result<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_or_create_sqlite(self.pool.as_sqlite().unwrap(), tag).await,
            DatabaseDriver::Mysql => get_or_create_mysql(self.pool.as_mysql().unwrap(), tag).await,
        }
    }

    async fn set_article_tags(&self, article_id: i64, tags: &[String]) -> Result<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                    .bind(article_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to clear article tags")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                    .bind(article_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to clear article tags")?;
            }
        }

        for name in tags {
            let tag = self.get_or_create(name).await?;
            match self.pool.driver() {
                DatabaseDriver::Sqlite => {
                    sqlx::query(
                        "INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)",
                    )
                    .bind(article_id)
                    .bind(tag.id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to attach tag")?;
                }
                DatabaseDriver::Mysql => {
                    sqlx::query("INSERT IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                        .bind(article_id)
                        .bind(tag.id)
                        .execute(self.pool.as_mysql().unwrap())
                        .await
                        .context("Failed to attach tag")?;
                }
            }
        }

        self.get_for_article(article_id).await
    }

    async fn get_for_article(&self, article_id: i64) -> Result<Vec<Tag>> {
        let sql = r#"
            SELECT t.id, t.tag
            FROM tags t
            INNER JOIN article_tags atg ON atg.tag_id = t.id
            WHERE atg.article_id = ?
            ORDER BY t.tag ASC
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .bind(article_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get article tags")?;
                Ok(rows.iter().map(row_to_tag_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .bind(article_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get article tags")?;
                Ok(rows.iter().map(row_to_tag_mysql).collect())
            }
        }
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let sql = "SELECT id, tag FROM tags ORDER BY tag ASC";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list tags")?;
                Ok(rows.iter().map(row_to_tag_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list tags")?;
                Ok(rows.iter().map(row_to_tag_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_or_create_sqlite(pool: &SqlitePool, tag: &str) -> Result<Tag> {
    sqlx::query("INSERT OR IGNORE INTO tags (tag) VALUES (?)")
        .bind(tag)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    let row = sqlx::query("SELECT id, tag FROM tags WHERE tag = ?")
        .bind(tag)
        .fetch_one(pool)
        .await
        .context("Failed to get tag")?;
    Ok(row_to_tag_sqlite(&row))
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        tag: row.get("tag"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_or_create_mysql(pool: &MySqlPool, tag: &str) -> Result<Tag> {
    sqlx::query("INSERT IGNORE INTO tags (tag) VALUES (?)")
        .bind(tag)
        .execute(pool)
        .await
        .context("Failed to create tag")?;

    let row = sqlx::query("SELECT id, tag FROM tags WHERE tag = ?")
        .bind(tag)
        .fetch_one(pool)
        .await
        .context("Failed to get tag")?;
    Ok(row_to_tag_mysql(&row))
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
        id: row.get("id"),
        tag: row.get("tag"),
    }
}
