//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate.

pub mod article;
pub mod bookmark;
pub mod comment;
pub mod notification;
pub mod profile;
pub mod reaction;
pub mod report;
pub mod tag;
pub mod user;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use bookmark::{BookmarkRepository, SqlxBookmarkRepository};
pub use comment::{CommentRepository, CommentRepositoryImpl};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use reaction::{ReactionRepository, SqlxReactionRepository};
pub use report::{ReportRepository, SqlxReportRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
