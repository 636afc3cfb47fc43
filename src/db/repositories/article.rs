//! Article repository
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite and MySQL
//!
//! Listing takes an `ArticleFilter`; every filter is bound as a nullable
//! pattern so the same statement serves any combination of filters.
//! Patterns use `!` as the LIKE escape character on both drivers.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Article, ArticleFilter, CreateArticleInput, ListParams, PagedResult, UpdateArticleInput,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const ARTICLE_COLUMNS: &str = "a.id, a.slug, a.title, a.description, a.body, a.image, a.author_id, \
     a.rating_average, a.report_count, a.time_to_read, a.created_at, a.updated_at, a.published_at";

const FILTER_CLAUSE: &str = r#"
    WHERE (? IS NULL OR LOWER(u.username) LIKE ? ESCAPE '!')
      AND (? IS NULL OR LOWER(a.title) LIKE ? ESCAPE '!')
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM article_tags atg
            INNER JOIN tags t ON t.id = atg.tag_id
            WHERE atg.article_id = a.id AND LOWER(t.tag) LIKE ? ESCAPE '!'))
      AND (? IS NULL OR LOWER(a.title) LIKE ? ESCAPE '!'
           OR LOWER(a.description) LIKE ? ESCAPE '!'
           OR LOWER(a.body) LIKE ? ESCAPE '!')
"#;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article
    async fn create(&self, input: &CreateArticleInput) -> Result<Article>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Get article by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// Check if a slug is taken
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Update the given fields of an article; the slug is never changed
    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article>;

    /// Delete an article (tags, reactions, comments and reports cascade)
    async fn delete(&self, id: i64) -> Result<()>;

    /// Filtered listing, newest first
    async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> Result<PagedResult<Article>>;

    /// Store the recomputed rating average
    async fn set_rating_average(&self, id: i64, average: Option<f64>) -> Result<()>;

    /// Store the recomputed report count
    async fn set_report_count(&self, id: i64, count: i64) -> Result<()>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_article_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => create_article_mysql(self.pool.as_mysql().unwrap(), input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles a WHERE a.id = ?", ARTICLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get article by id")?;
                Ok(row.as_ref().map(row_to_article_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get article by id")?;
                Ok(row.as_ref().map(row_to_article_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {} FROM articles a WHERE a.slug = ?", ARTICLE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get article by slug")?;
                Ok(row.as_ref().map(row_to_article_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get article by slug")?;
                Ok(row.as_ref().map(row_to_article_mysql))
            }
        }
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) AS count FROM articles WHERE slug = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to check slug existence")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to check slug existence")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn update(&self, id: i64, input: &UpdateArticleInput) -> Result<Article> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Article not found"))?;

        let sql = r#"
            UPDATE articles
            SET title = ?, description = ?, body = ?, image = ?, time_to_read = ?, updated_at = ?
            WHERE id = ?
        "#;
        let title = input.title.as_ref().unwrap_or(&existing.title);
        let description = input.description.as_ref().unwrap_or(&existing.description);
        let body = input.body.as_ref().unwrap_or(&existing.body);
        let image = input.image.as_ref().unwrap_or(&existing.image);
        let time_to_read = input.time_to_read.as_ref().unwrap_or(&existing.time_to_read);
        let now = Utc::now();

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(title)
                    .bind(description)
                    .bind(body)
                    .bind(image)
                    .bind(time_to_read)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update article")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(title)
                    .bind(description)
                    .bind(body)
                    .bind(image)
                    .bind(time_to_read)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update article")?;
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Article not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM articles WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete article")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM articles WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete article")?;
            }
        }
        Ok(())
    }

    async fn list(&self, filter: &ArticleFilter, params: &ListParams) -> Result<PagedResult<Article>> {
        let (items, total) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_articles_sqlite(self.pool.as_sqlite().unwrap(), filter, params).await?
            }
            DatabaseDriver::Mysql => {
                list_articles_mysql(self.pool.as_mysql().unwrap(), filter, params).await?
            }
        };
        Ok(PagedResult::new(items, total, params))
    }

    async fn set_rating_average(&self, id: i64, average: Option<f64>) -> Result<()> {
        let sql = "UPDATE articles SET rating_average = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(average)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to store rating average")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(average)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to store rating average")?;
            }
        }
        Ok(())
    }

    async fn set_report_count(&self, id: i64, count: i64) -> Result<()> {
        let sql = "UPDATE articles SET report_count = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(count)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to store report count")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(count)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to store report count")?;
            }
        }
        Ok(())
    }
}

/// Bind values for `FILTER_CLAUSE`, in placeholder order
fn filter_binds(filter: &ArticleFilter) -> Vec<Option<String>> {
    let author = ArticleFilter::like_pattern(&filter.author);
    let title = ArticleFilter::like_pattern(&filter.title);
    let tag = ArticleFilter::like_pattern(&filter.tag);
    let search = ArticleFilter::like_pattern(&filter.search);

    vec![
        author.clone(),
        author,
        title.clone(),
        title,
        tag.clone(),
        tag,
        search.clone(),
        search.clone(),
        search.clone(),
        search,
    ]
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, input: &CreateArticleInput) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, image, author_id, report_count,
                              time_to_read, created_at, updated_at, published_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.body)
    .bind(&input.image)
    .bind(input.author_id)
    .bind(&input.time_to_read)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_rowid(),
        slug: input.slug.clone(),
        title: input.title.clone(),
        description: input.description.clone(),
        body: input.body.clone(),
        image: input.image.clone(),
        author_id: input.author_id,
        rating_average: None,
        report_count: 0,
        time_to_read: input.time_to_read.clone(),
        created_at: now,
        updated_at: now,
        published_at: now,
    })
}

async fn list_articles_sqlite(
    pool: &SqlitePool,
    filter: &ArticleFilter,
    params: &ListParams,
) -> Result<(Vec<Article>, i64)> {
    let binds = filter_binds(filter);

    let count_sql = format!(
        "SELECT COUNT(*) AS count FROM articles a INNER JOIN users u ON u.id = a.author_id {}",
        FILTER_CLAUSE
    );
    let mut count_query = sqlx::query(&count_sql);
    for value in &binds {
        count_query = count_query.bind(value.clone());
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .get("count");

    let list_sql = format!(
        "SELECT {} FROM articles a INNER JOIN users u ON u.id = a.author_id {} \
         ORDER BY a.published_at DESC, a.id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS, FILTER_CLAUSE
    );
    let mut list_query = sqlx::query(&list_sql);
    for value in &binds {
        list_query = list_query.bind(value.clone());
    }
    let rows = list_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    Ok((rows.iter().map(row_to_article_sqlite).collect(), total))
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Article {
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        image: row.get("image"),
        author_id: row.get("author_id"),
        rating_average: row.try_get("rating_average").ok().flatten(),
        report_count: row.get("report_count"),
        time_to_read: row.get("time_to_read"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        published_at: row.get("published_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, input: &CreateArticleInput) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, description, body, image, author_id, report_count,
                              time_to_read, created_at, updated_at, published_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.body)
    .bind(&input.image)
    .bind(input.author_id)
    .bind(&input.time_to_read)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    Ok(Article {
        id: result.last_insert_id() as i64,
        slug: input.slug.clone(),
        title: input.title.clone(),
        description: input.description.clone(),
        body: input.body.clone(),
        image: input.image.clone(),
        author_id: input.author_id,
        rating_average: None,
        report_count: 0,
        time_to_read: input.time_to_read.clone(),
        created_at: now,
        updated_at: now,
        published_at: now,
    })
}

async fn list_articles_mysql(
    pool: &MySqlPool,
    filter: &ArticleFilter,
    params: &ListParams,
) -> Result<(Vec<Article>, i64)> {
    let binds = filter_binds(filter);

    let count_sql = format!(
        "SELECT COUNT(*) AS count FROM articles a INNER JOIN users u ON u.id = a.author_id {}",
        FILTER_CLAUSE
    );
    let mut count_query = sqlx::query(&count_sql);
    for value in &binds {
        count_query = count_query.bind(value.clone());
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count articles")?
        .get("count");

    let list_sql = format!(
        "SELECT {} FROM articles a INNER JOIN users u ON u.id = a.author_id {} \
         ORDER BY a.published_at DESC, a.id DESC LIMIT ? OFFSET ?",
        ARTICLE_COLUMNS, FILTER_CLAUSE
    );
    let mut list_query = sqlx::query(&list_sql);
    for value in &binds {
        list_query = list_query.bind(value.clone());
    }
    let rows = list_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list articles")?;

    Ok((rows.iter().map(row_to_article_mysql).collect(), total))
}

fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Article {
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        body: row.get("body"),
        image: row.get("image"),
        author_id: row.get("author_id"),
        rating_average: row.try_get("rating_average").ok().flatten(),
        report_count: row.get("report_count"),
        time_to_read: row.get("time_to_read"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        published_at: row.get("published_at"),
    }
}
