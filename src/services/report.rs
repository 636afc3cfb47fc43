//! Article report service
//!
//! Readers may raise up to five concerns per article. Staff see and manage
//! every report; everyone else only their own.

use crate::db::repositories::ReportRepository;
use crate::models::{Article, ArticleReport, User, MAX_REPORTS_PER_USER};
use crate::services::article::ArticleService;
use anyhow::Context;
use std::sync::Arc;

const ARTICLE_NOT_FOUND: &str = "That article does not exist.";
const REPORT_NOT_FOUND: &str = "That article report does not exist.";

/// Error types for report service operations
#[derive(Debug, thiserror::Error)]
pub enum ReportServiceError {
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

/// Which operation is asking for access, for the refusal message
#[derive(Debug, Clone, Copy)]
pub enum ReportAction {
    View,
    Update,
    Delete,
}

impl ReportAction {
    fn verb(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
    articles: Arc<ArticleService>,
}

impl ReportService {
    pub fn new(repo: Arc<dyn ReportRepository>, articles: Arc<ArticleService>) -> Self {
        Self { repo, articles }
    }

    /// Report an article
    pub async fn create(
        &self,
        user: &User,
        slug: &str,
        text: Option<String>,
    ) -> Result<(String, ArticleReport), ReportServiceError> {
        let article = self.article(slug).await?;
        let text = required_text(text)?;

        let previous = self
            .repo
            .count_by_user(article.id, user.id)
            .await
            .context("Failed to count reports")?;
        if previous >= MAX_REPORTS_PER_USER {
            return Err(ReportServiceError::Forbidden(
                "You are not allowed to report an article more than five times.".to_string(),
            ));
        }

        let report = self
            .repo
            .create(article.id, user.id, &text)
            .await
            .context("Failed to create report")?;
        self.refresh_count(&article).await?;

        tracing::info!(article_id = article.id, report_id = report.id, "Article reported");
        Ok((
            "Your feedback has been recorded. Authors' Haven thanks you for your service.".to_string(),
            report,
        ))
    }

    /// Reports on an article visible to `user`
    pub async fn list(&self, user: &User, slug: &str) -> Result<Vec<ArticleReport>, ReportServiceError> {
        let article = self.article(slug).await?;
        let reporter = if user.is_staff { None } else { Some(user.id) };
        let reports = self
            .repo
            .list_for_article(article.id, reporter)
            .await
            .context("Failed to list reports")?;

        if reports.is_empty() {
            return Err(ReportServiceError::NotFound(
                "No concerns have been raised on this article.".to_string(),
            ));
        }
        Ok(reports)
    }

    pub async fn get(&self, user: &User, slug: &str, id: i64) -> Result<ArticleReport, ReportServiceError> {
        let article = self.article(slug).await?;
        self.accessible_report(user, &article, id, ReportAction::View).await
    }

    pub async fn update(
        &self,
        user: &User,
        slug: &str,
        id: i64,
        text: Option<String>,
    ) -> Result<ArticleReport, ReportServiceError> {
        let article = self.article(slug).await?;
        let report = self
            .accessible_report(user, &article, id, ReportAction::Update)
            .await?;
        let text = required_text(text)?;

        Ok(self
            .repo
            .update_text(report.id, &text)
            .await
            .context("Failed to update report")?)
    }

    pub async fn delete(&self, user: &User, slug: &str, id: i64) -> Result<String, ReportServiceError> {
        let article = self.article(slug).await?;
        let report = self
            .accessible_report(user, &article, id, ReportAction::Delete)
            .await?;

        self.repo
            .delete(report.id)
            .await
            .context("Failed to delete report")?;
        self.refresh_count(&article).await?;
        Ok("Report was deleted successfully".to_string())
    }

    async fn article(&self, slug: &str) -> Result<Article, ReportServiceError> {
        self.articles
            .find(slug)
            .await?
            .ok_or_else(|| ReportServiceError::NotFound(ARTICLE_NOT_FOUND.to_string()))
    }

    async fn accessible_report(
        &self,
        user: &User,
        article: &Article,
        id: i64,
        action: ReportAction,
    ) -> Result<ArticleReport, ReportServiceError> {
        let report = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get report")?
            .filter(|r| r.article_id == article.id)
            .ok_or_else(|| ReportServiceError::NotFound(REPORT_NOT_FOUND.to_string()))?;

        if !user.can_manage(report.user_id) {
            return Err(ReportServiceError::Forbidden(format!(
                "You are not allowed to {} this report.",
                action.verb()
            )));
        }
        Ok(report)
    }

    async fn refresh_count(&self, article: &Article) -> Result<(), ReportServiceError> {
        let count = self
            .repo
            .count_for_article(article.id)
            .await
            .context("Failed to count reports")?;
        self.articles.set_report_count(article, count).await?;
        Ok(())
    }
}

fn required_text(text: Option<String>) -> Result<String, ReportServiceError> {
    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ReportServiceError::ValidationError("Please fill in the text".to_string()))
}
