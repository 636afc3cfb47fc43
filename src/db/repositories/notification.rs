//! Notification repository
//!
//! A notification row is shared by all its recipients; per-recipient read
//! state lives in `notification_recipients`.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateNotificationInput, Notification, PendingEmail};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const NOTIFICATION_SELECT: &str = r#"
    SELECT n.id, n.article_id, a.slug AS article_slug, n.notification, n.classification,
           n.email_sent, nr.read_at, n.created_at
    FROM notifications n
    INNER JOIN notification_recipients nr ON nr.notification_id = n.id
    LEFT JOIN articles a ON a.id = n.article_id
"#;

const PENDING_EMAIL_SELECT: &str = r#"
    SELECT n.id AS notification_id, n.notification, a.slug AS article_slug,
           u.email AS recipient_email, u.username AS recipient_username
    FROM notifications n
    INNER JOIN notification_recipients nr ON nr.notification_id = n.id
    INNER JOIN users u ON u.id = nr.user_id
    INNER JOIN profiles p ON p.user_id = u.id
    LEFT JOIN articles a ON a.id = n.article_id
    WHERE n.email_sent = ? AND p.email_notification_enabled = ?
    ORDER BY n.id ASC, u.id ASC
"#;

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a notification and link it to every recipient. Returns its ID.
    async fn create(&self, input: &CreateNotificationInput) -> Result<i64>;

    /// A user's notifications, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>>;

    /// One notification, only if `user_id` is a recipient
    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Notification>>;

    /// Mark one notification read. Returns false if the user is not a recipient.
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Mark every unread notification of a user read
    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;

    /// Drop the user from the recipients. Returns false if they were not one.
    async fn remove_recipient(&self, id: i64, user_id: i64) -> Result<bool>;

    /// IDs of notifications whose email has not been sent yet
    async fn unsent_ids(&self) -> Result<Vec<i64>>;

    /// Emails owed for unsent notifications, to recipients who accept email
    async fn pending_emails(&self) -> Result<Vec<PendingEmail>>;

    /// Flag notifications as emailed
    async fn mark_email_sent(&self, ids: &[i64]) -> Result<()>;
}

/// SQLx-based notification repository implementation
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, input: &CreateNotificationInput) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_notification_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => {
                create_notification_mysql(self.pool.as_mysql().unwrap(), input).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        let sql = format!(
            "{} WHERE nr.user_id = ? ORDER BY n.created_at DESC, n.id DESC",
            NOTIFICATION_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list notifications")?;
                Ok(rows.iter().map(row_to_notification_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list notifications")?;
                Ok(rows.iter().map(row_to_notification_mysql).collect())
            }
        }
    }

    async fn get_for_user(&self, id: i64, user_id: i64) -> Result<Option<Notification>> {
        let sql = format!("{} WHERE n.id = ? AND nr.user_id = ?", NOTIFICATION_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get notification")?;
                Ok(row.as_ref().map(row_to_notification_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get notification")?;
                Ok(row.as_ref().map(row_to_notification_mysql))
            }
        }
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        if self.get_for_user(id, user_id).await?.is_none() {
            return Ok(false);
        }

        let sql = "UPDATE notification_recipients SET read_at = ? WHERE notification_id = ? AND user_id = ? AND read_at IS NULL";
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(now)
                    .bind(id)
                    .bind(user_id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to mark notification read")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(now)
                    .bind(id)
                    .bind(user_id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to mark notification read")?;
            }
        }
        Ok(true)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let sql = "UPDATE notification_recipients SET read_at = ? WHERE user_id = ? AND read_at IS NULL";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .bind(user_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .bind(user_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark notifications read")?
                .rows_affected(),
        };
        Ok(affected)
    }

    async fn remove_recipient(&self, id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM notification_recipients WHERE notification_id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to remove notification")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to remove notification")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn unsent_ids(&self) -> Result<Vec<i64>> {
        let sql = "SELECT id FROM notifications WHERE email_sent = ? ORDER BY id ASC";
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(false)
                .fetch_all(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to list unsent notifications")?
                .iter()
                .map(|row| row.get("id"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(false)
                .fetch_all(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to list unsent notifications")?
                .iter()
                .map(|row| row.get("id"))
                .collect(),
        };
        Ok(ids)
    }

    async fn pending_emails(&self) -> Result<Vec<PendingEmail>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(PENDING_EMAIL_SELECT)
                    .bind(false)
                    .bind(true)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list pending emails")?;
                Ok(rows
                    .iter()
                    .map(|row| PendingEmail {
                        notification_id: row.get("notification_id"),
                        notification: row.get("notification"),
                        article_slug: row.try_get("article_slug").ok().flatten(),
                        recipient_email: row.get("recipient_email"),
                        recipient_username: row.get("recipient_username"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(PENDING_EMAIL_SELECT)
                    .bind(false)
                    .bind(true)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list pending emails")?;
                Ok(rows
                    .iter()
                    .map(|row| PendingEmail {
                        notification_id: row.get("notification_id"),
                        notification: row.get("notification"),
                        article_slug: row.try_get("article_slug").ok().flatten(),
                        recipient_email: row.get("recipient_email"),
                        recipient_username: row.get("recipient_username"),
                    })
                    .collect())
            }
        }
    }

    async fn mark_email_sent(&self, ids: &[i64]) -> Result<()> {
        let sql = "UPDATE notifications SET email_sent = ? WHERE id = ?";
        for id in ids {
            match self.pool.driver() {
                DatabaseDriver::Sqlite => {
                    sqlx::query(sql)
                        .bind(true)
                        .bind(id)
                        .execute(self.pool.as_sqlite().unwrap())
                        .await
                        .context("Failed to flag notification as emailed")?;
                }
                DatabaseDriver::Mysql => {
                    sqlx::query(sql)
                        .bind(true)
                        .bind(id)
                        .execute(self.pool.as_mysql().unwrap())
                        .await
                        .context("Failed to flag notification as emailed")?;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_notification_sqlite(
    pool: &SqlitePool,
    input: &CreateNotificationInput,
) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        "INSERT INTO notifications (article_id, notification, classification, email_sent, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.article_id)
    .bind(&input.notification)
    .bind(&input.classification)
    .bind(false)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to create notification")?
    .last_insert_rowid();

    for user_id in &input.recipients {
        sqlx::query(
            "INSERT OR IGNORE INTO notification_recipients (notification_id, user_id) VALUES (?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add notification recipient")?;
    }

    tx.commit().await.context("Failed to commit notification")?;
    Ok(id)
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Notification {
    Notification {
        id: row.get("id"),
        article_id: row.try_get("article_id").ok().flatten(),
        article_slug: row.try_get("article_slug").ok().flatten(),
        notification: row.get("notification"),
        classification: row.get("classification"),
        email_sent: row.get("email_sent"),
        read_at: row.try_get("read_at").ok().flatten(),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_notification_mysql(
    pool: &MySqlPool,
    input: &CreateNotificationInput,
) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        "INSERT INTO notifications (article_id, notification, classification, email_sent, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.article_id)
    .bind(&input.notification)
    .bind(&input.classification)
    .bind(false)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to create notification")?
    .last_insert_id() as i64;

    for user_id in &input.recipients {
        sqlx::query(
            "INSERT IGNORE INTO notification_recipients (notification_id, user_id) VALUES (?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add notification recipient")?;
    }

    tx.commit().await.context("Failed to commit notification")?;
    Ok(id)
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Notification {
    Notification {
        id: row.get("id"),
        article_id: row.try_get("article_id").ok().flatten(),
        article_slug: row.try_get("article_slug").ok().flatten(),
        notification: row.get("notification"),
        classification: row.get("classification"),
        email_sent: row.get("email_sent"),
        read_at: row.try_get("read_at").ok().flatten(),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArticleRepository, ProfileRepository, SqlxArticleRepository, SqlxProfileRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateArticleInput, User, ARTICLE_CLASSIFICATION};

    struct Fixture {
        repo: SqlxNotificationRepository,
        profiles: SqlxProfileRepository,
        article_id: i64,
        readers: Vec<i64>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let profiles = SqlxProfileRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["author", "reader1", "reader2"] {
            let user = users
                .create(&User::new(name.into(), format!("{}@example.com", name), "hash".into()))
                .await
                .unwrap();
            profiles.create_for_user(user.id).await.unwrap();
            ids.push(user.id);
        }
        let article = SqlxArticleRepository::new(pool.clone())
            .create(&CreateArticleInput {
                slug: "news".into(),
                title: "News".into(),
                description: "d".into(),
                body: "b".into(),
                image: "img".into(),
                author_id: ids[0],
                time_to_read: "1 min".into(),
            })
            .await
            .unwrap();

        Fixture {
            repo: SqlxNotificationRepository::new(pool),
            profiles,
            article_id: article.id,
            readers: ids[1..].to_vec(),
        }
    }

    fn input(fx: &Fixture) -> CreateNotificationInput {
        CreateNotificationInput {
            article_id: Some(fx.article_id),
            notification: "author has created an article. Title: News".into(),
            classification: ARTICLE_CLASSIFICATION.into(),
            recipients: fx.readers.clone(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_and_read_state() {
        let fx = setup().await;
        let (r1, r2) = (fx.readers[0], fx.readers[1]);
        let id = fx.repo.create(&input(&fx)).await.unwrap();

        let list = fx.repo.list_for_user(r1).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].article_slug.as_deref(), Some("news"));
        assert!(list[0].is_unread());

        assert!(fx.repo.mark_read(id, r1).await.unwrap());
        assert!(!fx.repo.get_for_user(id, r1).await.unwrap().unwrap().is_unread());
        // Read state is per recipient
        assert!(fx.repo.get_for_user(id, r2).await.unwrap().unwrap().is_unread());

        assert_eq!(fx.repo.mark_all_read(r2).await.unwrap(), 1);
        assert_eq!(fx.repo.mark_all_read(r2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_recipient_cannot_see_notification() {
        let fx = setup().await;
        let id = fx
            .repo
            .create(&CreateNotificationInput {
                recipients: vec![fx.readers[0]],
                ..input(&fx)
            })
            .await
            .unwrap();

        let outsider = fx.readers[1];
        assert!(fx.repo.get_for_user(id, outsider).await.unwrap().is_none());
        assert!(!fx.repo.mark_read(id, outsider).await.unwrap());
        assert!(!fx.repo.remove_recipient(id, outsider).await.unwrap());

        assert!(fx.repo.remove_recipient(id, fx.readers[0]).await.unwrap());
        assert!(fx.repo.list_for_user(fx.readers[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_emails_respect_email_flag() {
        let fx = setup().await;
        let id = fx.repo.create(&input(&fx)).await.unwrap();
        fx.profiles
            .set_email_notifications(fx.readers[1], false)
            .await
            .unwrap();

        assert_eq!(fx.repo.unsent_ids().await.unwrap(), vec![id]);
        let pending = fx.repo.pending_emails().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipient_username, "reader1");
        assert_eq!(pending[0].article_slug.as_deref(), Some("news"));

        fx.repo.mark_email_sent(&[id]).await.unwrap();
        assert!(fx.repo.unsent_ids().await.unwrap().is_empty());
        assert!(fx.repo.pending_emails().await.unwrap().is_empty());
    }
}
