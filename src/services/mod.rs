//! Services layer - Business logic
//!
//! This module contains all business logic services for Authors Haven.
//! Services are responsible for:
//! - Implementing business rules and permission checks
//! - Coordinating between repositories and cache
//! - Handling validation and error cases

pub mod article;
pub mod bookmark;
pub mod comment;
pub mod digest;
pub mod mailer;
pub mod notification;
pub mod password;
pub mod profile;
pub mod rate_limiter;
pub mod reaction;
pub mod report;
pub mod social;
pub mod token;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use article::{
    slugify, time_to_read, ArticleChanges, ArticleService, ArticleServiceError, ArticleView,
    NewArticleInput,
};
pub use bookmark::{BookmarkService, BookmarkServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use digest::{DigestJob, DigestReport};
pub use mailer::{create_mailer, LogMailer, Mailer, SmtpMailer};
pub use notification::{timesince, NotificationService, NotificationServiceError, NotificationView};
pub use password::{hash_password, validate_password, verify_password};
pub use profile::{ProfileService, ProfileServiceError, ProfileView};
pub use rate_limiter::LoginRateLimiter;
pub use reaction::{ReactionService, ReactionServiceError};
pub use report::{ReportService, ReportServiceError};
pub use social::{HttpIdentityClient, SocialAuthService, SocialLoginError, SocialLoginInput};
pub use token::{JwtManager, ResetTokenGenerator, TokenError, TokenPurpose};
pub use user::{
    AuthResponse, LoginInput, RegisterInput, ResetPasswordInput, UpdateCurrentUserInput,
    UserService, UserServiceError,
};
