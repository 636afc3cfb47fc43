//! Data models
//!
//! Plain data structures shared by the repositories, services and API:
//! database entities, input types and pagination helpers.

mod article;
mod bookmark;
mod comment;
mod notification;
mod profile;
mod reaction;
mod tag;
mod user;

pub use article::{
    Article, ArticleFilter, CreateArticleInput, ListParams, PagedResult, UpdateArticleInput,
    DEFAULT_ARTICLE_IMAGE,
};
pub use bookmark::{ArticleReport, Bookmark, MAX_REPORTS_PER_USER};
pub use comment::{Comment, CreateCommentInput, MAX_COMMENT_LENGTH};
pub use notification::{
    CreateNotificationInput, Notification, PendingEmail, ARTICLE_CLASSIFICATION,
};
pub use profile::{gravatar_url, Profile, UpdateProfileInput};
pub use reaction::{Opinion, RatingTotals, ReactionCounts, MAX_RATING, MIN_RATING};
pub use tag::{parse_tag_list, Tag, MAX_TAG_LENGTH};
pub use user::{PasswordResetToken, UpdateUserInput, User};
