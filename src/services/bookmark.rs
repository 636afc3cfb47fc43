//! Bookmark service

use crate::db::repositories::BookmarkRepository;
use crate::models::{Bookmark, User};
use crate::services::article::ArticleService;
use anyhow::Context;
use std::sync::Arc;

/// Error types for bookmark service operations
#[derive(Debug, thiserror::Error)]
pub enum BookmarkServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("You have already bookmarked this article")]
    AlreadyBookmarked,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BookmarkService {
    repo: Arc<dyn BookmarkRepository>,
    articles: Arc<ArticleService>,
}

impl BookmarkService {
    pub fn new(repo: Arc<dyn BookmarkRepository>, articles: Arc<ArticleService>) -> Self {
        Self { repo, articles }
    }

    pub async fn create(&self, user: &User, slug: &str) -> Result<Bookmark, BookmarkServiceError> {
        let article = self
            .articles
            .find(slug)
            .await?
            .ok_or_else(|| BookmarkServiceError::NotFound("The article does not exist".to_string()))?;

        if self
            .repo
            .exists(user.id, article.id)
            .await
            .context("Failed to check bookmark")?
        {
            return Err(BookmarkServiceError::AlreadyBookmarked);
        }

        Ok(self
            .repo
            .create(user.id, article.id)
            .await
            .context("Failed to create bookmark")?)
    }

    pub async fn list(&self, user: &User) -> Result<Vec<Bookmark>, BookmarkServiceError> {
        Ok(self
            .repo
            .list_for_user(user.id)
            .await
            .context("Failed to list bookmarks")?)
    }

    pub async fn delete(&self, user: &User, id: i64) -> Result<(), BookmarkServiceError> {
        let bookmark = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get bookmark")?
            .ok_or_else(|| BookmarkServiceError::NotFound("Bookmark not found".to_string()))?;

        if bookmark.user_id != user.id {
            return Err(BookmarkServiceError::Forbidden(
                "You cannot delete a bookmark that is not yours".to_string(),
            ));
        }

        self.repo
            .delete(bookmark.id)
            .await
            .context("Failed to delete bookmark")?;
        Ok(())
    }

    /// Remove every bookmark of the user; returns how many went
    pub async fn clear(&self, user: &User) -> Result<u64, BookmarkServiceError> {
        Ok(self
            .repo
            .delete_all_for_user(user.id)
            .await
            .context("Failed to delete bookmarks")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxBookmarkRepository;
    use crate::services::article::NewArticleInput;
    use crate::services::test_support::{article_service, create_user, setup_pool};

    fn article(title: &str) -> NewArticleInput {
        NewArticleInput {
            title: Some(title.into()),
            description: Some("d".into()),
            body: Some("b".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bookmark_lifecycle() {
        let pool = setup_pool().await;
        let articles = article_service(&pool);
        let service = BookmarkService::new(SqlxBookmarkRepository::boxed(pool.clone()), articles.clone());
        let author = create_user(&pool, "amina").await;
        let reader = create_user(&pool, "brian").await;
        articles.create(&author, article("First")).await.unwrap();
        articles.create(&author, article("Second")).await.unwrap();

        let bookmark = service.create(&reader, "first").await.unwrap();
        assert_eq!(bookmark.article_slug, "first");

        let err = service.create(&reader, "first").await.unwrap_err();
        assert_eq!(err.to_string(), "You have already bookmarked this article");

        service.create(&reader, "second").await.unwrap();
        assert_eq!(service.list(&reader).await.unwrap().len(), 2);

        let err = service.delete(&author, bookmark.id).await.unwrap_err();
        assert_eq!(err.to_string(), "You cannot delete a bookmark that is not yours");

        service.delete(&reader, bookmark.id).await.unwrap();
        assert!(matches!(
            service.delete(&reader, bookmark.id).await.unwrap_err(),
            BookmarkServiceError::NotFound(_)
        ));

        assert_eq!(service.clear(&reader).await.unwrap(), 1);
        assert!(service.list(&reader).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bookmark_missing_article() {
        let pool = setup_pool().await;
        let service = BookmarkService::new(SqlxBookmarkRepository::boxed(pool.clone()), article_service(&pool));
        let reader = create_user(&pool, "brian").await;
        assert!(matches!(
            service.create(&reader, "nope").await.unwrap_err(),
            BookmarkServiceError::NotFound(_)
        ));
    }
}
