//! Notification service
//!
//! New articles fan out one notification to every follower of the author
//! who has in-app notifications switched on. Read state is per recipient.

use crate::db::repositories::{NotificationRepository, ProfileRepository};
use crate::models::{Article, CreateNotificationInput, Notification, User, ARTICLE_CLASSIFICATION};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const NOT_FOUND: &str = "Notification not found";

/// Units used by `timesince`, largest first
const TIME_CHUNKS: [(i64, &str); 6] = [
    (60 * 60 * 24 * 365, "year"),
    (60 * 60 * 24 * 30, "month"),
    (60 * 60 * 24 * 7, "week"),
    (60 * 60 * 24, "day"),
    (60 * 60, "hour"),
    (60, "minute"),
];

/// Error types for notification service operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationServiceError {
    #[error("{0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A notification as its recipient sees it
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub notification: String,
    pub classification: String,
    pub article: Option<String>,
    pub unread: bool,
    pub created_at: DateTime<Utc>,
    pub timesince: String,
}

impl NotificationView {
    pub fn from_notification(n: Notification, now: DateTime<Utc>) -> Self {
        Self {
            unread: n.is_unread(),
            timesince: timesince(n.created_at, now),
            id: n.id,
            notification: n.notification,
            classification: n.classification,
            article: n.article_slug,
            created_at: n.created_at,
        }
    }
}

/// Notification service
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, profile_repo: Arc<dyn ProfileRepository>) -> Self {
        Self { repo, profile_repo }
    }

    /// Tell the author's followers about a new article.
    ///
    /// Returns the notification id, or `None` when nobody is listening.
    pub async fn notify_new_article(
        &self,
        author: &User,
        article: &Article,
    ) -> Result<Option<i64>, NotificationServiceError> {
        let recipients = self
            .profile_repo
            .notifiable_follower_ids(author.id)
            .await
            .context("Failed to get followers")?;

        if recipients.is_empty() {
            return Ok(None);
        }

        let count = recipients.len();
        let id = self
            .repo
            .create(&CreateNotificationInput {
                article_id: Some(article.id),
                notification: format!(
                    "{} has created an article. Title: {}",
                    author.username, article.title
                ),
                classification: ARTICLE_CLASSIFICATION.to_string(),
                recipients,
            })
            .await
            .context("Failed to create notification")?;

        tracing::info!(notification_id = id, recipients = count, "Notified followers of new article");
        Ok(Some(id))
    }

    /// The user's notifications, newest first
    pub async fn list(&self, user: &User) -> Result<Vec<NotificationView>, NotificationServiceError> {
        let now = Utc::now();
        let notifications = self
            .repo
            .list_for_user(user.id)
            .await
            .context("Failed to list notifications")?;
        Ok(notifications
            .into_iter()
            .map(|n| NotificationView::from_notification(n, now))
            .collect())
    }

    pub async fn get(&self, user: &User, id: i64) -> Result<NotificationView, NotificationServiceError> {
        let notification = self
            .repo
            .get_for_user(id, user.id)
            .await
            .context("Failed to get notification")?
            .ok_or_else(|| NotificationServiceError::NotFound(NOT_FOUND.to_string()))?;
        Ok(NotificationView::from_notification(notification, Utc::now()))
    }

    pub async fn mark_read(&self, user: &User, id: i64) -> Result<NotificationView, NotificationServiceError> {
        if !self
            .repo
            .mark_read(id, user.id)
            .await
            .context("Failed to mark notification read")?
        {
            return Err(NotificationServiceError::NotFound(NOT_FOUND.to_string()));
        }
        self.get(user, id).await
    }

    /// Returns how many notifications changed state
    pub async fn mark_all_read(&self, user: &User) -> Result<u64, NotificationServiceError> {
        Ok(self
            .repo
            .mark_all_read(user.id)
            .await
            .context("Failed to mark notifications read")?)
    }

    /// Drop the user from the notification's recipients
    pub async fn remove(&self, user: &User, id: i64) -> Result<(), NotificationServiceError> {
        if !self
            .repo
            .remove_recipient(id, user.id)
            .await
            .context("Failed to remove notification")?
        {
            return Err(NotificationServiceError::NotFound(NOT_FOUND.to_string()));
        }
        Ok(())
    }

    /// Toggle in-app notifications; returns the new state
    pub async fn switch_app(&self, user: &User) -> Result<bool, NotificationServiceError> {
        let enabled = !self.current_flags(user).await?.0;
        self.profile_repo
            .set_app_notifications(user.id, enabled)
            .await
            .context("Failed to switch app notifications")?;
        Ok(enabled)
    }

    /// Toggle email notifications; returns the new state
    pub async fn switch_email(&self, user: &User) -> Result<bool, NotificationServiceError> {
        let enabled = !self.current_flags(user).await?.1;
        self.profile_repo
            .set_email_notifications(user.id, enabled)
            .await
            .context("Failed to switch email notifications")?;
        Ok(enabled)
    }

    async fn current_flags(&self, user: &User) -> Result<(bool, bool), NotificationServiceError> {
        let profile = self
            .profile_repo
            .get_by_user_id(user.id)
            .await
            .context("Failed to get profile")?
            .ok_or_else(|| NotificationServiceError::NotFound("Profile not found".to_string()))?;
        Ok((profile.app_notification_enabled, profile.email_notification_enabled))
    }
}

/// Human readable time between two instants, e.g. "2 hours, 5 minutes".
///
/// Shows the largest non-zero unit plus the next smaller unit when that is
/// non-zero too. Anything under a minute (or in the future) is "0 minutes".
pub fn timesince(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);

    for (i, (size, name)) in TIME_CHUNKS.iter().enumerate() {
        let count = seconds / size;
        if count == 0 {
            continue;
        }

        let mut out = plural(count, name);
        if let Some((next_size, next_name)) = TIME_CHUNKS.get(i + 1) {
            let rest = (seconds - count * size) / next_size;
            if rest != 0 {
                out.push_str(", ");
                out.push_str(&plural(rest, next_name));
            }
        }
        return out;
    }

    "0 minutes".to_string()
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ArticleRepository, SqlxArticleRepository, SqlxNotificationRepository,
        SqlxProfileRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::CreateArticleInput;
    use chrono::Duration;

    struct Harness {
        _pool: DynDatabasePool,
        service: NotificationService,
        profiles: Arc<dyn ProfileRepository>,
        author: User,
        reader: User,
        article: Article,
    }

    async fn setup() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let profiles = SqlxProfileRepository::boxed(pool.clone());
        let mut created = Vec::new();
        for name in ["amina", "brian"] {
            let user = users
                .create(&User::new(name.into(), format!("{}@example.com", name), "hash".into()).activated())
                .await
                .unwrap();
            profiles.create_for_user(user.id).await.unwrap();
            created.push(user);
        }
        let reader = created.pop().unwrap();
        let author = created.pop().unwrap();

        let article = SqlxArticleRepository::new(pool.clone())
            .create(&CreateArticleInput {
                slug: "ownership".into(),
                title: "Ownership".into(),
                description: "d".into(),
                body: "b".into(),
                image: "i".into(),
                author_id: author.id,
                time_to_read: "1 min".into(),
            })
            .await
            .unwrap();

        let service = NotificationService::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            profiles.clone(),
        );

        Harness {
            _pool: pool,
            service,
            profiles,
            author,
            reader,
            article,
        }
    }

    #[tokio::test]
    async fn test_no_followers_no_notification() {
        let h = setup().await;
        let id = h.service.notify_new_article(&h.author, &h.article).await.unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn test_fan_out_to_followers() {
        let h = setup().await;
        h.profiles.follow(h.reader.id, h.author.id).await.unwrap();

        let id = h
            .service
            .notify_new_article(&h.author, &h.article)
            .await
            .unwrap()
            .expect("notification created");

        let list = h.service.list(&h.reader).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].notification, "amina has created an article. Title: Ownership");
        assert_eq!(list[0].classification, "article");
        assert_eq!(list[0].article.as_deref(), Some("ownership"));
        assert!(list[0].unread);

        assert!(h.service.list(&h.author).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_app_switch_stops_fan_out() {
        let h = setup().await;
        h.profiles.follow(h.reader.id, h.author.id).await.unwrap();

        assert!(!h.service.switch_app(&h.reader).await.unwrap());
        assert!(h
            .service
            .notify_new_article(&h.author, &h.article)
            .await
            .unwrap()
            .is_none());

        assert!(h.service.switch_app(&h.reader).await.unwrap());
        assert!(!h.service.switch_email(&h.reader).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_state_and_remove() {
        let h = setup().await;
        h.profiles.follow(h.reader.id, h.author.id).await.unwrap();
        let id = h
            .service
            .notify_new_article(&h.author, &h.article)
            .await
            .unwrap()
            .unwrap();

        let view = h.service.mark_read(&h.reader, id).await.unwrap();
        assert!(!view.unread);

        // The author never received it
        let err = h.service.get(&h.author, id).await.unwrap_err();
        assert!(matches!(err, NotificationServiceError::NotFound(_)));
        assert!(h.service.mark_read(&h.author, id).await.is_err());

        h.service.remove(&h.reader, id).await.unwrap();
        assert!(h.service.list(&h.reader).await.unwrap().is_empty());
        assert!(h.service.remove(&h.reader, id).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let h = setup().await;
        h.profiles.follow(h.reader.id, h.author.id).await.unwrap();
        h.service.notify_new_article(&h.author, &h.article).await.unwrap();
        h.service.notify_new_article(&h.author, &h.article).await.unwrap();

        assert_eq!(h.service.mark_all_read(&h.reader).await.unwrap(), 2);
        let list = h.service.list(&h.reader).await.unwrap();
        assert!(list.iter().all(|n| !n.unread));
    }

    #[test]
    fn test_timesince() {
        let now = Utc::now();
        assert_eq!(timesince(now, now), "0 minutes");
        assert_eq!(timesince(now - Duration::seconds(59), now), "0 minutes");
        assert_eq!(timesince(now - Duration::minutes(1), now), "1 minute");
        assert_eq!(
            timesince(now - Duration::hours(2) - Duration::minutes(5), now),
            "2 hours, 5 minutes"
        );
        assert_eq!(timesince(now - Duration::days(1), now), "1 day");
        assert_eq!(timesince(now - Duration::days(9), now), "1 week, 2 days");
        assert_eq!(timesince(now - Duration::days(400), now), "1 year, 1 month");
        assert_eq!(timesince(now + Duration::hours(1), now), "0 minutes");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// At most two units, and the output always starts with a count.
        #[test]
        fn at_most_two_units(seconds in 0i64..(60 * 60 * 24 * 365 * 5)) {
            let now = Utc::now();
            let text = timesince(now - Duration::seconds(seconds), now);
            prop_assert!(text.split(", ").count() <= 2);
            prop_assert!(text.chars().next().map_or(false, |c| c.is_ascii_digit()));
        }

        /// Under a minute always reads as zero minutes.
        #[test]
        fn sub_minute_is_zero(seconds in 0i64..60) {
            let now = Utc::now();
            prop_assert_eq!(timesince(now - Duration::seconds(seconds), now), "0 minutes");
        }
    }
}
