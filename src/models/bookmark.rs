//! Bookmark and article report models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reports a single user may file against one article
pub const MAX_REPORTS_PER_USER: i64 = 5;

/// A saved article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    pub article_id: i64,
    /// Joined from `articles`
    pub article_slug: String,
    /// Joined from `articles`
    pub article_title: String,
    pub created_at: DateTime<Utc>,
}

/// A concern raised by a reader about an article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleReport {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    /// Joined from `users`
    pub reporter: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
