//! Reaction service: likes/dislikes, ratings and favourites

use crate::db::repositories::ReactionRepository;
use crate::models::{Opinion, User, MAX_RATING, MIN_RATING};
use crate::services::article::ArticleService;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

/// Error types for reaction service operations
#[derive(Debug, thiserror::Error)]
pub enum ReactionServiceError {
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

#[derive(Debug, Clone, Serialize)]
pub struct LikeOutcome {
    pub message: String,
    pub likes_count: i64,
    pub dislikes_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingOutcome {
    pub message: String,
    pub rating: i32,
    /// The requester's rating before this one, when re-rating
    pub previous_rating: Option<i32>,
    pub rating_average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavouriteOutcome {
    pub message: String,
    pub favourited: bool,
    pub favourites_count: i64,
}

/// Reaction service
pub struct ReactionService {
    repo: Arc<dyn ReactionRepository>,
    articles: Arc<ArticleService>,
}

impl ReactionService {
    pub fn new(repo: Arc<dyn ReactionRepository>, articles: Arc<ArticleService>) -> Self {
        Self { repo, articles }
    }

    /// Record a like (`true`) or dislike (`false`).
    ///
    /// Repeating the current opinion is refused; switching updates it.
    pub async fn like(
        &self,
        user: &User,
        slug: &str,
        like: Option<bool>,
    ) -> Result<LikeOutcome, ReactionServiceError> {
        let article = self.articles.find(slug).await?.ok_or_else(|| {
            ReactionServiceError::NotFound("Article requested does not exist".to_string())
        })?;
        let like = like.ok_or_else(|| {
            ReactionServiceError::ValidationError(
                "You must indicate whether you like or dislike this article".to_string(),
            )
        })?;

        let opinion = Opinion::from_like_flag(like);
        let current = self
            .repo
            .get_opinion(article.id, user.id)
            .await
            .context("Failed to get opinion")?;
        if current == Some(opinion) {
            return Err(ReactionServiceError::Forbidden(format!(
                "{}, you already {} this article.",
                user.username,
                opinion.past_tense()
            )));
        }

        self.repo
            .set_opinion(article.id, user.id, opinion)
            .await
            .context("Failed to save opinion")?;
        let counts = self
            .repo
            .counts(article.id)
            .await
            .context("Failed to count reactions")?;

        Ok(LikeOutcome {
            message: format!(
                "Thank you {} for giving your opinion on this article.",
                user.username
            ),
            likes_count: counts.likes,
            dislikes_count: counts.dislikes,
        })
    }

    /// Rate an article 1 to 5; rating again replaces the earlier rating
    pub async fn rate(
        &self,
        user: &User,
        slug: &str,
        rating: Option<i64>,
    ) -> Result<RatingOutcome, ReactionServiceError> {
        let article = self
            .articles
            .find(slug)
            .await?
            .ok_or_else(|| ReactionServiceError::NotFound("That article does not exist".to_string()))?;

        if article.author_id == user.id {
            return Err(ReactionServiceError::Forbidden(
                "We see what you did there 😉. Sorry, but you cannot rate your own article."
                    .to_string(),
            ));
        }

        let rating = rating
            .filter(|r| (MIN_RATING as i64..=MAX_RATING as i64).contains(r))
            .ok_or_else(|| {
                ReactionServiceError::ValidationError(format!(
                    "Rating should be a number between {} and {}",
                    MIN_RATING, MAX_RATING
                ))
            })? as i32;

        let previous_rating = self
            .repo
            .get_rating(article.id, user.id)
            .await
            .context("Failed to get rating")?;
        self.repo
            .upsert_rating(article.id, user.id, rating)
            .await
            .context("Failed to save rating")?;
        let average = self
            .repo
            .rating_totals(article.id)
            .await
            .context("Failed to total ratings")?
            .average();
        self.articles.set_rating_average(&article, average).await?;

        Ok(RatingOutcome {
            message: "Thank you for taking time to rate this article.".to_string(),
            rating,
            previous_rating,
            rating_average: average,
        })
    }

    /// Toggle the favourite flag
    pub async fn favourite(&self, user: &User, slug: &str) -> Result<FavouriteOutcome, ReactionServiceError> {
        let article = self
            .articles
            .find(slug)
            .await?
            .ok_or_else(|| ReactionServiceError::NotFound("The article does not exist".to_string()))?;

        let favourited = self
            .repo
            .toggle_favourite(article.id, user.id)
            .await
            .context("Failed to toggle favourite")?;
        let counts = self
            .repo
            .counts(article.id)
            .await
            .context("Failed to count reactions")?;

        let message = if favourited {
            "You have successfully favourited this article"
        } else {
            "You have successfully unfavourited this article"
        };
        Ok(FavouriteOutcome {
            message: message.to_string(),
            favourited,
            favourites_count: counts.favourites,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxReactionRepository;
    use crate::db::DynDatabasePool;
    use crate::services::article::NewArticleInput;
    use crate::services::test_support::{article_service, create_user, setup_pool};

    struct Harness {
        _pool: DynDatabasePool,
        service: ReactionService,
        articles: Arc<ArticleService>,
        author: User,
        reader: User,
    }

    async fn setup() -> Harness {
        let pool = setup_pool().await;
        let articles = article_service(&pool);
        let author = create_user(&pool, "amina").await;
        let reader = create_user(&pool, "brian").await;
        articles
            .create(
                &author,
                NewArticleInput {
                    title: Some("Borrowing".into()),
                    description: Some("d".into()),
                    body: Some("b".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        Harness {
            service: ReactionService::new(SqlxReactionRepository::boxed(pool.clone()), articles.clone()),
            _pool: pool,
            articles,
            author,
            reader,
        }
    }

    #[tokio::test]
    async fn test_like_then_switch() {
        let h = setup().await;
        let outcome = h.service.like(&h.reader, "borrowing", Some(true)).await.unwrap();
        assert_eq!(
            outcome.message,
            "Thank you brian for giving your opinion on this article."
        );
        assert_eq!((outcome.likes_count, outcome.dislikes_count), (1, 0));

        let err = h.service.like(&h.reader, "borrowing", Some(true)).await.unwrap_err();
        assert_eq!(err.to_string(), "brian, you already liked this article.");

        let outcome = h.service.like(&h.reader, "borrowing", Some(false)).await.unwrap();
        assert_eq!((outcome.likes_count, outcome.dislikes_count), (0, 1));

        let err = h.service.like(&h.reader, "borrowing", Some(false)).await.unwrap_err();
        assert_eq!(err.to_string(), "brian, you already disliked this article.");
    }

    #[tokio::test]
    async fn test_like_validation() {
        let h = setup().await;
        let err = h.service.like(&h.reader, "borrowing", None).await.unwrap_err();
        assert!(matches!(err, ReactionServiceError::ValidationError(_)));

        let err = h.service.like(&h.reader, "missing", Some(true)).await.unwrap_err();
        assert_eq!(err.to_string(), "Article requested does not exist");
    }

    #[tokio::test]
    async fn test_rating_average() {
        let h = setup().await;
        let pool_user = create_user(&h._pool, "chidi").await;

        let outcome = h.service.rate(&h.reader, "borrowing", Some(4)).await.unwrap();
        assert_eq!(outcome.message, "Thank you for taking time to rate this article.");
        assert_eq!(outcome.rating_average, Some(4.0));
        assert_eq!(outcome.previous_rating, None);

        let outcome = h.service.rate(&pool_user, "borrowing", Some(5)).await.unwrap();
        assert_eq!(outcome.rating_average, Some(4.5));

        // Re-rating replaces
        let outcome = h.service.rate(&h.reader, "borrowing", Some(1)).await.unwrap();
        assert_eq!(outcome.rating_average, Some(3.0));
        assert_eq!(outcome.previous_rating, Some(4));

        let view = h.articles.get("borrowing", None).await.unwrap();
        assert_eq!(view.rating_average, Some(3.0));
    }

    #[tokio::test]
    async fn test_rating_rounds_to_two_places() {
        let h = setup().await;
        let c = create_user(&h._pool, "chidi").await;
        let d = create_user(&h._pool, "dana").await;
        h.service.rate(&h.reader, "borrowing", Some(1)).await.unwrap();
        h.service.rate(&c, "borrowing", Some(1)).await.unwrap();
        let outcome = h.service.rate(&d, "borrowing", Some(2)).await.unwrap();
        assert_eq!(outcome.rating_average, Some(1.33));
    }

    #[tokio::test]
    async fn test_rating_rules() {
        let h = setup().await;
        let err = h.service.rate(&h.author, "borrowing", Some(5)).await.unwrap_err();
        assert!(matches!(err, ReactionServiceError::Forbidden(_)));
        assert!(err.to_string().contains("cannot rate your own article"));

        for bad in [Some(0), Some(6), None] {
            let err = h.service.rate(&h.reader, "borrowing", bad).await.unwrap_err();
            assert!(matches!(err, ReactionServiceError::ValidationError(_)));
        }

        let err = h.service.rate(&h.reader, "missing", Some(3)).await.unwrap_err();
        assert_eq!(err.to_string(), "That article does not exist");
    }

    #[tokio::test]
    async fn test_favourite_toggle() {
        let h = setup().await;
        let outcome = h.service.favourite(&h.reader, "borrowing").await.unwrap();
        assert!(outcome.favourited);
        assert_eq!(outcome.message, "You have successfully favourited this article");
        assert_eq!(outcome.favourites_count, 1);

        let view = h.articles.get("borrowing", Some(&h.reader)).await.unwrap();
        assert!(view.favourited);

        let outcome = h.service.favourite(&h.reader, "borrowing").await.unwrap();
        assert!(!outcome.favourited);
        assert_eq!(outcome.message, "You have successfully unfavourited this article");

        let err = h.service.favourite(&h.reader, "missing").await.unwrap_err();
        assert_eq!(err.to_string(), "The article does not exist");
    }
}
