//! Notification email digest
//!
//! Periodically picks up notifications that have not been emailed yet and
//! mails each recipient who has email notifications switched on. Every
//! notification in the batch is marked sent afterwards, including those
//! whose mail failed, so one bad address cannot wedge the queue.

use crate::db::repositories::NotificationRepository;
use crate::services::mailer::{notification_email, Mailer};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Counts from one digest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestReport {
    pub notifications: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct DigestJob {
    repo: Arc<dyn NotificationRepository>,
    mailer: Arc<dyn Mailer>,
    site_url: String,
}

impl DigestJob {
    pub fn new(repo: Arc<dyn NotificationRepository>, mailer: Arc<dyn Mailer>, site_url: impl Into<String>) -> Self {
        Self {
            repo,
            mailer,
            site_url: site_url.into(),
        }
    }

    /// Send one batch
    pub async fn run_once(&self) -> Result<DigestReport> {
        let ids = self
            .repo
            .unsent_ids()
            .await
            .context("Failed to get unsent notifications")?;
        if ids.is_empty() {
            return Ok(DigestReport::default());
        }

        let batch: HashSet<i64> = ids.iter().copied().collect();
        let pending = self
            .repo
            .pending_emails()
            .await
            .context("Failed to get pending emails")?;

        let mut report = DigestReport {
            notifications: ids.len(),
            ..Default::default()
        };

        for email in pending.iter().filter(|e| batch.contains(&e.notification_id)) {
            let (subject, body) = notification_email(
                &self.site_url,
                &email.recipient_username,
                &email.notification,
                email.article_slug.as_deref(),
            );
            match self.mailer.send(&email.recipient_email, &subject, &body).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        notification_id = email.notification_id,
                        "Failed to email {}: {}",
                        email.recipient_email,
                        e
                    );
                }
            }
        }

        self.repo
            .mark_email_sent(&ids)
            .await
            .context("Failed to mark notifications emailed")?;

        tracing::info!(
            notifications = report.notifications,
            sent = report.sent,
            failed = report.failed,
            "Notification digest finished"
        );
        Ok(report)
    }

    /// Run forever on `interval`
    pub async fn run_every(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::warn!("Notification digest failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ProfileRepository, SqlxNotificationRepository, SqlxProfileRepository};
    use crate::services::article::NewArticleInput;
    use crate::services::mailer::RecordingMailer;
    use crate::services::test_support::{article_service, create_user, setup_pool};

    #[tokio::test]
    async fn test_digest_emails_opted_in_recipients_once() {
        let pool = setup_pool().await;
        let articles = article_service(&pool);
        let profiles = SqlxProfileRepository::new(pool.clone());
        let author = create_user(&pool, "amina").await;
        let brian = create_user(&pool, "brian").await;
        let chidi = create_user(&pool, "chidi").await;
        profiles.follow(brian.id, author.id).await.unwrap();
        profiles.follow(chidi.id, author.id).await.unwrap();
        profiles.set_email_notifications(chidi.id, false).await.unwrap();

        articles
            .create(
                &author,
                NewArticleInput {
                    title: Some("Async Rust".into()),
                    description: Some("d".into()),
                    body: Some("b".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let job = DigestJob::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            mailer.clone(),
            "http://haven.test",
        );

        let report = job.run_once().await.unwrap();
        assert_eq!(
            report,
            DigestReport {
                notifications: 1,
                sent: 1,
                failed: 0
            }
        );
        let messages = mailer.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "brian@example.com");
        assert!(messages[0].2.contains("amina has created an article. Title: Async Rust"));

        // Nothing left on the second run
        assert_eq!(job.run_once().await.unwrap(), DigestReport::default());
    }

    #[tokio::test]
    async fn test_digest_failure_does_not_stop_batch() {
        let pool = setup_pool().await;
        let articles = article_service(&pool);
        let profiles = SqlxProfileRepository::new(pool.clone());
        let author = create_user(&pool, "amina").await;
        let brian = create_user(&pool, "brian").await;
        let chidi = create_user(&pool, "chidi").await;
        profiles.follow(brian.id, author.id).await.unwrap();
        profiles.follow(chidi.id, author.id).await.unwrap();

        articles
            .create(
                &author,
                NewArticleInput {
                    title: Some("Pinning".into()),
                    description: Some("d".into()),
                    body: Some("b".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mailer = Arc::new(RecordingMailer::failing_for("brian@example.com"));
        let job = DigestJob::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            mailer.clone(),
            "http://haven.test",
        );

        let report = job.run_once().await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(mailer.messages()[0].0, "chidi@example.com");
        assert_eq!(job.run_once().await.unwrap().notifications, 0);
    }
}
