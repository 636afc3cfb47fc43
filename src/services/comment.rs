//! Comment service
//!
//! Comments hang off an article and may reply to another comment of the
//! same article. Deleting a comment deletes its replies.

use crate::db::repositories::CommentRepository;
use crate::models::{Article, Comment, CreateCommentInput, User, MAX_COMMENT_LENGTH};
use crate::services::article::ArticleService;
use anyhow::Context;
use std::sync::Arc;

const COMMENT_NOT_FOUND: &str = "Comment not found";

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
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

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
    articles: Arc<ArticleService>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>, articles: Arc<ArticleService>) -> Self {
        Self { repo, articles }
    }

    /// Comment on an article, or reply to `parent_id`
    pub async fn create(
        &self,
        user: &User,
        slug: &str,
        parent_id: Option<i64>,
        body: Option<String>,
    ) -> Result<Comment, CommentServiceError> {
        let article = self.article(slug).await?;
        if let Some(parent_id) = parent_id {
            self.comment_on(&article, parent_id).await?;
        }
        let body = validate_body(body)?;

        let comment = self
            .repo
            .create(&CreateCommentInput {
                article_id: article.id,
                author_id: user.id,
                parent_id,
                body,
            })
            .await
            .context("Failed to create comment")?;

        tracing::debug!(comment_id = comment.id, article_id = article.id, "Comment created");
        Ok(comment)
    }

    /// Top-level comments, oldest first
    pub async fn list(&self, slug: &str) -> Result<Vec<Comment>, CommentServiceError> {
        let article = self.article(slug).await?;
        Ok(self
            .repo
            .list_top_level(article.id)
            .await
            .context("Failed to list comments")?)
    }

    pub async fn get(&self, slug: &str, id: i64) -> Result<Comment, CommentServiceError> {
        let article = self.article(slug).await?;
        self.comment_on(&article, id).await
    }

    pub async fn replies(&self, slug: &str, id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        let article = self.article(slug).await?;
        let parent = self.comment_on(&article, id).await?;
        Ok(self
            .repo
            .list_replies(parent.id)
            .await
            .context("Failed to list replies")?)
    }

    /// Edit a comment; only its author may
    pub async fn update(
        &self,
        user: &User,
        slug: &str,
        id: i64,
        body: Option<String>,
    ) -> Result<Comment, CommentServiceError> {
        let article = self.article(slug).await?;
        let comment = self.comment_on(&article, id).await?;
        if comment.author_id != user.id {
            return Err(CommentServiceError::Forbidden(
                "You cannot edit a comment you do not own.".to_string(),
            ));
        }
        let body = validate_body(body)?;

        Ok(self
            .repo
            .update_body(comment.id, &body)
            .await
            .context("Failed to update comment")?)
    }

    /// Delete a comment and its replies; its author or staff may
    pub async fn delete(&self, user: &User, slug: &str, id: i64) -> Result<String, CommentServiceError> {
        let article = self.article(slug).await?;
        let comment = self.comment_on(&article, id).await?;
        if !user.can_manage(comment.author_id) {
            return Err(CommentServiceError::Forbidden(
                "You cannot delete a comment you do not own.".to_string(),
            ));
        }

        self.repo
            .delete(comment.id)
            .await
            .context("Failed to delete comment")?;
        Ok("Comment deleted successfully".to_string())
    }

    async fn article(&self, slug: &str) -> Result<Article, CommentServiceError> {
        self.articles
            .find(slug)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound("Article not found".to_string()))
    }

    /// Comment `id`, provided it belongs to `article`
    async fn comment_on(&self, article: &Article, id: i64) -> Result<Comment, CommentServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .filter(|c| c.article_id == article.id)
            .ok_or_else(|| CommentServiceError::NotFound(COMMENT_NOT_FOUND.to_string()))
    }
}

fn validate_body(body: Option<String>) -> Result<String, CommentServiceError> {
    let body = body
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| CommentServiceError::ValidationError("Please fill in the body".to_string()))?;
    if body.chars().count() > MAX_COMMENT_LENGTH {
        return Err(CommentServiceError::ValidationError(format!(
            "Ensure this field has no more than {} characters.",
            MAX_COMMENT_LENGTH
        )));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::CommentRepositoryImpl;
    use crate::db::DynDatabasePool;
    use crate::services::article::NewArticleInput;
    use crate::services::test_support::{article_service, create_staff, create_user, setup_pool};

    async fn setup() -> (DynDatabasePool, CommentService, User, User) {
        let pool = setup_pool().await;
        let articles = article_service(&pool);
        let author = create_user(&pool, "amina").await;
        let reader = create_user(&pool, "brian").await;
        for title in ["Traits", "Generics"] {
            articles
                .create(
                    &author,
                    NewArticleInput {
                        title: Some(title.into()),
                        description: Some("d".into()),
                        body: Some("b".into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let service = CommentService::new(Arc::new(CommentRepositoryImpl::new(pool.clone())), articles);
        (pool, service, author, reader)
    }

    #[tokio::test]
    async fn test_comment_thread() {
        let (_pool, service, author, reader) = setup().await;

        let root = service
            .create(&reader, "traits", None, Some("Great read".into()))
            .await
            .unwrap();
        assert_eq!(root.author, "brian");
        assert!(root.parent_id.is_none());

        let reply = service
            .create(&author, "traits", Some(root.id), Some("Thanks!".into()))
            .await
            .unwrap();
        assert_eq!(reply.parent_id, Some(root.id));

        let top = service.list("traits").await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].replies_count, 1);

        let replies = service.replies("traits", root.id).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body, "Thanks!");

        // The parent must belong to the same article
        let err = service
            .create(&reader, "generics", Some(root.id), Some("x".into()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Comment not found");
    }

    #[tokio::test]
    async fn test_comment_validation() {
        let (_pool, service, _author, reader) = setup().await;
        assert!(matches!(
            service.create(&reader, "traits", None, None).await.unwrap_err(),
            CommentServiceError::ValidationError(_)
        ));
        assert!(matches!(
            service
                .create(&reader, "traits", None, Some("x".repeat(501)))
                .await
                .unwrap_err(),
            CommentServiceError::ValidationError(_)
        ));
        assert!(service
            .create(&reader, "traits", None, Some("x".repeat(500)))
            .await
            .is_ok());
        assert!(matches!(
            service.create(&reader, "missing", None, Some("x".into())).await.unwrap_err(),
            CommentServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_update_owner_only() {
        let (_pool, service, author, reader) = setup().await;
        let comment = service
            .create(&reader, "traits", None, Some("first".into()))
            .await
            .unwrap();

        let err = service
            .update(&author, "traits", comment.id, Some("hijack".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden(_)));

        let updated = service
            .update(&reader, "traits", comment.id, Some("edited".into()))
            .await
            .unwrap();
        assert_eq!(updated.body, "edited");
        assert_eq!(service.get("traits", comment.id).await.unwrap().body, "edited");
    }

    #[tokio::test]
    async fn test_delete_owner_or_staff_cascades() {
        let (pool, service, author, reader) = setup().await;
        let staff = create_staff(&pool, "moderator").await;

        let root = service
            .create(&reader, "traits", None, Some("root".into()))
            .await
            .unwrap();
        service
            .create(&author, "traits", Some(root.id), Some("reply".into()))
            .await
            .unwrap();

        let err = service.delete(&author, "traits", root.id).await.unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden(_)));

        service.delete(&staff, "traits", root.id).await.unwrap();
        assert!(service.list("traits").await.unwrap().is_empty());
        assert!(matches!(
            service.replies("traits", root.id).await.unwrap_err(),
            CommentServiceError::NotFound(_)
        ));
    }
}
