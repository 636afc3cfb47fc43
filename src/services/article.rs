//! Article service
//!
//! Implements business logic for article management:
//! - Create, read, update, delete articles
//! - Slug and read-time generation
//! - Tag associations
//! - Cache of article rows keyed by slug
//! - Fan-out of new-article notifications

use crate::cache::{article_key, CacheLayer, MemoryCache};
use crate::db::repositories::{
    ArticleRepository, ProfileRepository, ReactionRepository, TagRepository, UserRepository,
};
use crate::models::{
    parse_tag_list, Article, ArticleFilter, CreateArticleInput, ListParams, PagedResult, Tag,
    UpdateArticleInput, User, DEFAULT_ARTICLE_IMAGE, MAX_TAG_LENGTH,
};
use crate::services::notification::NotificationService;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum slug length
pub const MAX_SLUG_LENGTH: usize = 140;

/// Maximum title length
pub const MAX_TITLE_LENGTH: usize = 255;

/// Reading speed used for `time_to_read`
const WORDS_PER_MINUTE: usize = 200;

const NOT_FOUND: &str = "Article with given id does not exist";

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for creating an article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewArticleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    /// Comma separated
    pub tags: Option<String>,
    pub image: Option<String>,
}

/// Partial update of an article
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tags: Option<String>,
    pub image: Option<String>,
}

/// Author details embedded in an article
#[derive(Debug, Clone, Serialize)]
pub struct AuthorSummary {
    pub username: String,
    pub bio: String,
    pub image: String,
}

/// An article as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ArticleView {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub image: String,
    pub author: AuthorSummary,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub favourites_count: i64,
    pub favourited: bool,
    pub rating_average: Option<f64>,
    pub report_count: i64,
    pub time_to_read: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

/// Article service
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    tag_repo: Arc<dyn TagRepository>,
    reaction_repo: Arc<dyn ReactionRepository>,
    user_repo: Arc<dyn UserRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    cache: Arc<MemoryCache>,
    notifications: Arc<NotificationService>,
}

impl ArticleService {
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        tag_repo: Arc<dyn TagRepository>,
        reaction_repo: Arc<dyn ReactionRepository>,
        user_repo: Arc<dyn UserRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
        cache: Arc<MemoryCache>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            repo,
            tag_repo,
            reaction_repo,
            user_repo,
            profile_repo,
            cache,
            notifications,
        }
    }

    /// Create an article and notify the author's followers
    pub async fn create(
        &self,
        author: &User,
        input: NewArticleInput,
    ) -> Result<ArticleView, ArticleServiceError> {
        let title = required(input.title, "title")?;
        validate_title(&title)?;
        let description = required(input.description, "description")?;
        let body = required(input.body, "body")?;
        let tags = validate_tags(input.tags.as_deref())?;
        let image = input
            .image
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| DEFAULT_ARTICLE_IMAGE.to_string());

        let slug = self.unique_slug(&title).await?;
        let article = self
            .repo
            .create(&CreateArticleInput {
                slug,
                time_to_read: time_to_read(&body),
                title,
                description,
                body,
                image,
                author_id: author.id,
            })
            .await
            .context("Failed to create article")?;

        if !tags.is_empty() {
            self.tag_repo
                .set_article_tags(article.id, &tags)
                .await
                .context("Failed to set article tags")?;
        }

        tracing::info!(article_id = article.id, slug = %article.slug, "Article created");

        // A failed fan-out should not undo the article
        if let Err(e) = self.notifications.notify_new_article(author, &article).await {
            tracing::warn!("Failed to notify followers of article {}: {}", article.slug, e);
        }

        self.view(article, Some(author)).await
    }

    /// Get an article by slug
    pub async fn get(&self, slug: &str, viewer: Option<&User>) -> Result<ArticleView, ArticleServiceError> {
        let article = self
            .find(slug)
            .await?
            .ok_or_else(|| ArticleServiceError::NotFound(NOT_FOUND.to_string()))?;
        self.view(article, viewer).await
    }

    /// Filtered, paginated list, newest first
    pub async fn list(
        &self,
        filter: &ArticleFilter,
        params: &ListParams,
        viewer: Option<&User>,
    ) -> Result<PagedResult<ArticleView>, ArticleServiceError> {
        let page = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list articles")?;

        if page.is_out_of_range() {
            return Err(ArticleServiceError::NotFound("Invalid page.".to_string()));
        }

        let mut views = Vec::with_capacity(page.items.len());
        for article in &page.items {
            views.push(self.view(article.clone(), viewer).await?);
        }
        Ok(PagedResult::new(views, page.total, params))
    }

    /// Update an article owned by `user`. The slug never changes.
    pub async fn update(
        &self,
        user: &User,
        slug: &str,
        changes: ArticleChanges,
    ) -> Result<ArticleView, ArticleServiceError> {
        let article = self
            .find(slug)
            .await?
            .ok_or_else(|| ArticleServiceError::NotFound(NOT_FOUND.to_string()))?;
        if article.author_id != user.id {
            return Err(ArticleServiceError::Forbidden(
                "You cannot edit an article you do not own.".to_string(),
            ));
        }

        let title = changes.title.map(|t| t.trim().to_string());
        if let Some(ref title) = title {
            if title.is_empty() {
                return Err(ArticleServiceError::ValidationError("Please fill in the title".to_string()));
            }
            validate_title(title)?;
        }
        let description = non_blank(changes.description, "description")?;
        let body = non_blank(changes.body, "body")?;
        let tags = match changes.tags.as_deref() {
            Some(raw) => Some(validate_tags(Some(raw))?),
            None => None,
        };

        let input = UpdateArticleInput {
            title,
            description,
            time_to_read: body.as_deref().map(time_to_read),
            body,
            image: changes.image.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()),
        };

        let updated = if input.has_changes() {
            self.repo
                .update(article.id, &input)
                .await
                .context("Failed to update article")?
        } else {
            article.clone()
        };

        if let Some(tags) = tags {
            self.tag_repo
                .set_article_tags(article.id, &tags)
                .await
                .context("Failed to set article tags")?;
        }

        self.invalidate(&article.slug).await;
        self.view(updated, Some(user)).await
    }

    /// Delete an article owned by `user`
    pub async fn delete(&self, user: &User, slug: &str) -> Result<String, ArticleServiceError> {
        let article = self
            .find(slug)
            .await?
            .ok_or_else(|| ArticleServiceError::NotFound(NOT_FOUND.to_string()))?;
        if article.author_id != user.id {
            return Err(ArticleServiceError::Forbidden(
                "You cannot delete articles belonging to other users.".to_string(),
            ));
        }

        self.repo
            .delete(article.id)
            .await
            .context("Failed to delete article")?;
        self.invalidate(&article.slug).await;

        tracing::info!(article_id = article.id, slug = %article.slug, "Article deleted");
        Ok("Article deleted successfully".to_string())
    }

    /// All tags, alphabetically
    pub async fn tags(&self) -> Result<Vec<Tag>, ArticleServiceError> {
        Ok(self.tag_repo.list().await.context("Failed to list tags")?)
    }

    /// Look up an article row, going through the cache
    pub async fn find(&self, slug: &str) -> anyhow::Result<Option<Article>> {
        let key = article_key(slug);
        if let Some(article) = self.cache.get::<Article>(&key).await.ok().flatten() {
            return Ok(Some(article));
        }

        let article = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get article by slug")?;

        if let Some(ref article) = article {
            let _ = self.cache.set(&key, article).await;
        }
        Ok(article)
    }

    /// Drop the cached row for `slug`
    pub async fn invalidate(&self, slug: &str) {
        let _ = self.cache.delete(&article_key(slug)).await;
    }

    /// Store a new rating average and refresh the cache
    pub async fn set_rating_average(&self, article: &Article, average: Option<f64>) -> anyhow::Result<()> {
        self.repo
            .set_rating_average(article.id, average)
            .await
            .context("Failed to store rating average")?;
        self.invalidate(&article.slug).await;
        Ok(())
    }

    /// Store a new report count and refresh the cache
    pub async fn set_report_count(&self, article: &Article, count: i64) -> anyhow::Result<()> {
        self.repo
            .set_report_count(article.id, count)
            .await
            .context("Failed to store report count")?;
        self.invalidate(&article.slug).await;
        Ok(())
    }

    /// Assemble the API view of an article for `viewer`
    pub async fn view(&self, article: Article, viewer: Option<&User>) -> Result<ArticleView, ArticleServiceError> {
        let author = self.author_summary(article.author_id).await?;
        let tags = self
            .tag_repo
            .get_for_article(article.id)
            .await
            .context("Failed to get article tags")?
            .into_iter()
            .map(|t| t.tag)
            .collect();
        let counts = self
            .reaction_repo
            .counts(article.id)
            .await
            .context("Failed to count reactions")?;
        let favourited = match viewer {
            Some(viewer) => self
                .reaction_repo
                .is_favourited(article.id, viewer.id)
                .await
                .context("Failed to check favourite")?,
            None => false,
        };

        Ok(ArticleView {
            id: article.id,
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            image: article.image,
            author,
            tags,
            likes_count: counts.likes,
            dislikes_count: counts.dislikes,
            favourites_count: counts.favourites,
            favourited,
            rating_average: article.rating_average,
            report_count: article.report_count,
            time_to_read: article.time_to_read,
            created_at: article.created_at,
            updated_at: article.updated_at,
            published_at: article.published_at,
        })
    }

    async fn author_summary(&self, author_id: i64) -> Result<AuthorSummary, ArticleServiceError> {
        let profile = self
            .profile_repo
            .get_by_user_id(author_id)
            .await
            .context("Failed to get author profile")?;

        if let Some(profile) = profile {
            return Ok(AuthorSummary {
                image: profile.avatar_url(),
                username: profile.username,
                bio: profile.bio,
            });
        }

        let user = self
            .user_repo
            .get_by_id(author_id)
            .await
            .context("Failed to get author")?
            .ok_or_else(|| anyhow::anyhow!("Article author {} is missing", author_id))?;
        Ok(AuthorSummary {
            image: crate::models::gravatar_url(&user.email),
            username: user.username,
            bio: String::new(),
        })
    }

    /// Slug from the title, made unique with a numeric suffix
    async fn unique_slug(&self, title: &str) -> Result<String, ArticleServiceError> {
        let base = truncate_chars(&slugify(title), MAX_SLUG_LENGTH)
            .trim_end_matches('-')
            .to_string();
        let base = if base.is_empty() { "article".to_string() } else { base };

        let mut candidate = base.clone();
        let mut n = 1;
        while self
            .repo
            .slug_exists(&candidate)
            .await
            .context("Failed to check slug uniqueness")?
        {
            let suffix = format!("-{}", n);
            let stem = truncate_chars(&base, MAX_SLUG_LENGTH - suffix.len());
            candidate = format!("{}{}", stem.trim_end_matches('-'), suffix);
            n += 1;
        }
        Ok(candidate)
    }
}

/// Generate a URL-friendly slug from a title
///
/// Lowercases, drops punctuation, and joins words with single hyphens.
pub fn slugify(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() || c == '-' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect();

    // Collapse hyphen runs and trim them from both ends
    let mut result = String::with_capacity(cleaned.len());
    let mut prev_hyphen = false;
    for c in cleaned.chars() {
        if c == '-' {
            if !prev_hyphen && !result.is_empty() {
                result.push(c);
                prev_hyphen = true;
            }
        } else {
            result.push(c);
            prev_hyphen = false;
        }
    }
    result.trim_end_matches('-').to_string()
}

/// Estimated reading time, e.g. "3 min"
pub fn time_to_read(body: &str) -> String {
    let words = body.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{} min", minutes)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn required(value: Option<String>, field: &str) -> Result<String, ArticleServiceError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ArticleServiceError::ValidationError(format!("Please fill in the {}", field)))
}

fn non_blank(value: Option<String>, field: &str) -> Result<Option<String>, ArticleServiceError> {
    match value {
        Some(v) => required(Some(v), field).map(Some),
        None => Ok(None),
    }
}

fn validate_title(title: &str) -> Result<(), ArticleServiceError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ArticleServiceError::ValidationError(format!(
            "Ensure this field has no more than {} characters.",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_tags(raw: Option<&str>) -> Result<Vec<String>, ArticleServiceError> {
    let tags = raw.map(parse_tag_list).unwrap_or_default();
    if let Some(tag) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LENGTH) {
        return Err(ArticleServiceError::ValidationError(format!(
            "Tag '{}' is too long. Tags can have at most {} characters.",
            tag, MAX_TAG_LENGTH
        )));
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{article_service, create_user, setup_pool};

    fn new_article(title: &str) -> NewArticleInput {
        NewArticleInput {
            title: Some(title.into()),
            description: Some("A short description".into()),
            body: Some("Some body text".into()),
            tags: Some("rust, ownership, Rust".into()),
            image: None,
        }
    }

    // ========================================================================
    // Slug and read time
    // ========================================================================

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Rust   is_fun -- really "), "rust-is-fun-really");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_time_to_read() {
        assert_eq!(time_to_read(""), "1 min");
        assert_eq!(time_to_read("one two three"), "1 min");
        assert_eq!(time_to_read(&"word ".repeat(200)), "1 min");
        assert_eq!(time_to_read(&"word ".repeat(201)), "2 min");
        assert_eq!(time_to_read(&"word ".repeat(1000)), "5 min");
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    #[tokio::test]
    async fn test_create_article() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;

        let view = service.create(&author, new_article("Hello World")).await.unwrap();
        assert_eq!(view.slug, "hello-world");
        assert_eq!(view.author.username, "amina");
        assert_eq!(view.tags, vec!["ownership".to_string(), "rust".to_string()]);
        assert_eq!(view.image, DEFAULT_ARTICLE_IMAGE);
        assert_eq!(view.time_to_read, "1 min");
        assert_eq!(view.likes_count, 0);
        assert!(view.rating_average.is_none());
    }

    #[tokio::test]
    async fn test_slug_collisions_get_suffixes() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;

        let a = service.create(&author, new_article("Same Title")).await.unwrap();
        let b = service.create(&author, new_article("Same Title")).await.unwrap();
        let c = service.create(&author, new_article("Same title!")).await.unwrap();
        assert_eq!(a.slug, "same-title");
        assert_eq!(b.slug, "same-title-1");
        assert_eq!(c.slug, "same-title-2");
    }

    #[tokio::test]
    async fn test_long_title_slug_truncated() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;

        let title = "word ".repeat(50);
        let a = service.create(&author, new_article(&title)).await.unwrap();
        let b = service.create(&author, new_article(&title)).await.unwrap();
        assert!(a.slug.chars().count() <= MAX_SLUG_LENGTH);
        assert!(b.slug.chars().count() <= MAX_SLUG_LENGTH);
        assert!(b.slug.ends_with("-1"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;

        let mut input = new_article("x");
        input.title = None;
        let err = service.create(&author, input).await.unwrap_err();
        assert_eq!(err.to_string(), "Please fill in the title");

        let mut input = new_article("x");
        input.body = Some("   ".into());
        assert!(matches!(
            service.create(&author, input).await.unwrap_err(),
            ArticleServiceError::ValidationError(_)
        ));

        let input = new_article(&"t".repeat(256));
        assert!(service.create(&author, input).await.is_err());

        let mut input = new_article("Tags");
        input.tags = Some("a-very-long-tag-that-goes-past-thirty".into());
        assert!(service.create(&author, input).await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_article() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let err = service.get("nope", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Article with given id does not exist");
    }

    #[tokio::test]
    async fn test_update_owner_only_and_slug_stable() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;
        let other = create_user(&pool, "brian").await;
        service.create(&author, new_article("Original")).await.unwrap();

        let err = service
            .update(&other, "original", ArticleChanges::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You cannot edit an article you do not own.");

        // Warm the cache, then make sure the update is visible
        service.get("original", None).await.unwrap();
        let view = service
            .update(
                &author,
                "original",
                ArticleChanges {
                    title: Some("Renamed".into()),
                    body: Some("word ".repeat(450)),
                    tags: Some("new".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.slug, "original");
        assert_eq!(view.title, "Renamed");
        assert_eq!(view.time_to_read, "3 min");
        assert_eq!(view.tags, vec!["new".to_string()]);

        let fetched = service.get("original", None).await.unwrap();
        assert_eq!(fetched.title, "Renamed");
    }

    #[tokio::test]
    async fn test_delete_owner_only() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;
        let other = create_user(&pool, "brian").await;
        service.create(&author, new_article("Doomed")).await.unwrap();
        service.get("doomed", None).await.unwrap();

        let err = service.delete(&other, "doomed").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "You cannot delete articles belonging to other users."
        );

        let message = service.delete(&author, "doomed").await.unwrap();
        assert_eq!(message, "Article deleted successfully");
        assert!(matches!(
            service.get("doomed", None).await.unwrap_err(),
            ArticleServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_invalid_page() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let amina = create_user(&pool, "amina").await;
        let brian = create_user(&pool, "brian").await;
        service.create(&amina, new_article("Rust Ownership")).await.unwrap();
        let mut python = new_article("Python Tips");
        python.tags = Some("python".into());
        service.create(&brian, python).await.unwrap();

        let all = service
            .list(&ArticleFilter::default(), &ListParams::default(), None)
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].title, "Python Tips");

        let by_author = service
            .list(
                &ArticleFilter {
                    author: Some("AMI".into()),
                    ..Default::default()
                },
                &ListParams::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(by_author.total, 1);
        assert_eq!(by_author.items[0].author.username, "amina");

        let by_tag = service
            .list(
                &ArticleFilter {
                    tag: Some("pyth".into()),
                    ..Default::default()
                },
                &ListParams::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(by_tag.total, 1);

        let err = service
            .list(&ArticleFilter::default(), &ListParams::new(5, 10), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid page.");
    }

    #[tokio::test]
    async fn test_tags_listing() {
        let pool = setup_pool().await;
        let service = article_service(&pool);
        let author = create_user(&pool, "amina").await;
        service.create(&author, new_article("Tagged")).await.unwrap();

        let tags: Vec<String> = service.tags().await.unwrap().into_iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec!["ownership".to_string(), "rust".to_string()]);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Slugs never contain spaces, doubled hyphens, or edge hyphens.
        #[test]
        fn slug_is_url_friendly(title in ".{0,200}") {
            let slug = slugify(&title);
            prop_assert!(!slug.contains(' '));
            prop_assert!(!slug.contains("--"));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
        }

        /// Slugifying twice changes nothing.
        #[test]
        fn slug_is_idempotent(title in "[a-zA-Z0-9 ,.!_-]{0,100}") {
            let once = slugify(&title);
            prop_assert_eq!(slugify(&once), once);
        }

        /// Read time is at least one minute and grows with length.
        #[test]
        fn read_time_matches_word_count(words in 0usize..3000) {
            let body = "word ".repeat(words);
            let expected = std::cmp::max(1, (words + 199) / 200);
            prop_assert_eq!(time_to_read(&body), format!("{} min", expected));
        }
    }
}
