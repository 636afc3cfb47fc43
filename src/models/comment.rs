//! Comment model
//!
//! Comments form threads through `parent_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a comment body
pub const MAX_COMMENT_LENGTH: usize = 500;

/// Comment entity with its author's username and reply count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub author_id: i64,
    /// Joined from `users`
    pub author: String,
    pub parent_id: Option<i64>,
    pub body: String,
    /// Number of direct replies
    pub replies_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a comment or a reply
#[derive(Debug, Clone)]
pub struct CreateCommentInput {
    pub article_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
}
