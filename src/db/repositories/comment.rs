//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CreateCommentInput};

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.article_id, c.author_id, u.username AS author, c.parent_id, c.body,
           (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS replies_count,
           c.created_at, c.updated_at
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
"#;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a comment or a reply
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Top-level comments of an article, oldest first
    async fn list_top_level(&self, article_id: i64) -> Result<Vec<Comment>>;

    /// Direct replies to a comment, oldest first
    async fn list_replies(&self, parent_id: i64) -> Result<Vec<Comment>>;

    /// Replace the body of a comment
    async fn update_body(&self, id: i64, body: &str) -> Result<Comment>;

    /// Delete a comment; replies cascade
    async fn delete(&self, id: i64) -> Result<()>;
}

/// Comment repository implementation
pub struct CommentRepositoryImpl {
    pool: DynDatabasePool,
}

impl CommentRepositoryImpl {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for CommentRepositoryImpl {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), input).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_top_level(&self, article_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "{} WHERE c.article_id = ? AND c.parent_id IS NULL ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap(), &sql, article_id).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), &sql, article_id).await,
        }
    }

    async fn list_replies(&self, parent_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "{} WHERE c.parent_id = ? ORDER BY c.created_at ASC, c.id ASC",
            COMMENT_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap(), &sql, parent_id).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), &sql, parent_id).await,
        }
    }

    async fn update_body(&self, id: i64, body: &str) -> Result<Comment> {
        let sql = "UPDATE comments SET body = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(body)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update comment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(body)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update comment")?;
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM comments WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete comment")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM comments WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete comment")?;
            }
        }
        Ok(())
    }
}

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (article_id, author_id, parent_id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.article_id)
    .bind(input.author_id)
    .bind(input.parent_id)
    .bind(&input.body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    get_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Comment not found after insert"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE c.id = ?", COMMENT_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_sqlite))
}

async fn list_sqlite(pool: &SqlitePool, sql: &str, key: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(sql)
        .bind(key)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;
    Ok(rows.iter().map(row_to_comment_sqlite).collect())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        parent_id: row.try_get("parent_id").ok().flatten(),
        body: row.get("body"),
        replies_count: row.get("replies_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// MySQL implementations
async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO comments (article_id, author_id, parent_id, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.article_id)
    .bind(input.author_id)
    .bind(input.parent_id)
    .bind(&input.body)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    get_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Comment not found after insert"))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let sql = format!("{} WHERE c.id = ?", COMMENT_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_mysql))
}

async fn list_mysql(pool: &MySqlPool, sql: &str, key: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(sql)
        .bind(key)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;
    Ok(rows.iter().map(row_to_comment_mysql).collect())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        article_id: row.get("article_id"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        parent_id: row.try_get("parent_id").ok().flatten(),
        body: row.get("body"),
        replies_count: row.get("replies_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
