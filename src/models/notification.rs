//! Notification model
//!
//! A notification is created once and linked to each recipient; read state
//! is tracked per recipient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of notifications raised when a followed author publishes
pub const ARTICLE_CLASSIFICATION: &str = "article";

/// Notification as seen by one recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub article_id: Option<i64>,
    /// Joined from `articles`
    pub article_slug: Option<String>,
    pub notification: String,
    pub classification: String,
    pub email_sent: bool,
    /// `None` until the recipient reads it
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

/// Input for a fan-out notification
#[derive(Debug, Clone)]
pub struct CreateNotificationInput {
    pub article_id: Option<i64>,
    pub notification: String,
    pub classification: String,
    pub recipients: Vec<i64>,
}

/// One email owed by the digest job
#[derive(Debug, Clone)]
pub struct PendingEmail {
    pub notification_id: i64,
    pub notification: String,
    pub article_slug: Option<String>,
    pub recipient_email: String,
    pub recipient_username: String,
}
