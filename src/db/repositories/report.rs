//! Article report repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::ArticleReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const REPORT_SELECT: &str = r#"
    SELECT r.id, r.article_id, r.user_id, u.username AS reporter, r.text, r.created_at, r.updated_at
    FROM article_reports r
    INNER JOIN users u ON u.id = r.user_id
"#;

/// Report repository trait
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, article_id: i64, user_id: i64, text: &str) -> Result<ArticleReport>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ArticleReport>>;

    /// Reports on an article, oldest first; restricted to one reporter when given
    async fn list_for_article(
        &self,
        article_id: i64,
        reporter_id: Option<i64>,
    ) -> Result<Vec<ArticleReport>>;

    /// Reports a user has filed against one article
    async fn count_by_user(&self, article_id: i64, user_id: i64) -> Result<i64>;

    /// All reports filed against an article
    async fn count_for_article(&self, article_id: i64) -> Result<i64>;

    async fn update_text(&self, id: i64, text: &str) -> Result<ArticleReport>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based report repository implementation
pub struct SqlxReportRepository {
    pool: DynDatabasePool,
}

impl SqlxReportRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReportRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReportRepository for SqlxReportRepository {
    async fn create(&self, article_id: i64, user_id: i64, text: &str) -> Result<ArticleReport> {
        let sql = "INSERT INTO article_reports (article_id, user_id, text, created_at, updated_at) VALUES (?, ?, ?, ?, ?)";
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .bind(text)
                .bind(now)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to create report")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .bind(text)
                .bind(now)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to create report")?
                .last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Report not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ArticleReport>> {
        let sql = format!("{} WHERE r.id = ?", REPORT_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get report")?;
                Ok(row.as_ref().map(row_to_report_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get report")?;
                Ok(row.as_ref().map(row_to_report_mysql))
            }
        }
    }

    async fn list_for_article(
        &self,
        article_id: i64,
        reporter_id: Option<i64>,
    ) -> Result<Vec<ArticleReport>> {
        let sql = format!(
            "{} WHERE r.article_id = ? AND (? IS NULL OR r.user_id = ?) ORDER BY r.created_at ASC, r.id ASC",
            REPORT_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(article_id)
                    .bind(reporter_id)
                    .bind(reporter_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list reports")?;
                Ok(rows.iter().map(row_to_report_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(article_id)
                    .bind(reporter_id)
                    .bind(reporter_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list reports")?;
                Ok(rows.iter().map(row_to_report_mysql).collect())
            }
        }
    }

    async fn count_by_user(&self, article_id: i64, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM article_reports WHERE article_id = ? AND user_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count reports")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .bind(user_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count reports")?
                .get("count"),
        };
        Ok(count)
    }

    async fn count_for_article(&self, article_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM article_reports WHERE article_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(article_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count reports")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(article_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count reports")?
                .get("count"),
        };
        Ok(count)
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<ArticleReport> {
        let sql = "UPDATE article_reports SET text = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(text)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update report")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(text)
                    .bind(now)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update report")?;
            }
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Report not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM article_reports WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete report")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM article_reports WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete report")?;
            }
        }
        Ok(())
    }
}

fn row_to_report_sqlite(row: &sqlx::sqlite::SqliteRow) -> ArticleReport {
    ArticleReport {
        id: row.get("id"),
        article_id: row.get("article_id"),
        user_id: row.get("user_id"),
        reporter: row.get("reporter"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_report_mysql(row: &sqlx::mysql::MySqlRow) -> ArticleReport {
    ArticleReport {
        id: row.get("id"),
        article_id: row.get("article_id"),
        user_id: row.get("user_id"),
        reporter: row.get("reporter"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
