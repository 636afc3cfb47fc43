//! Article model
//!
//! This module provides:
//! - `Article` entity
//! - Input types for creating and updating articles
//! - `ArticleFilter` for list queries
//! - Pagination types for list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image used when an article is created without one
pub const DEFAULT_ARTICLE_IMAGE: &str = "static/images/no-img.jpg";

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug, unique and stable across edits
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    /// Cover image URL
    pub image: String,
    /// Author user ID
    pub author_id: i64,
    /// Mean of all ratings, two decimals; `None` until rated
    pub rating_average: Option<f64>,
    /// Number of reports filed against the article
    pub report_count: i64,
    /// Estimated reading time, e.g. "3 min"
    pub time_to_read: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

/// Input for creating an article (slug and reading time already computed)
#[derive(Debug, Clone)]
pub struct CreateArticleInput {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub image: String,
    pub author_id: i64,
    pub time_to_read: String,
}

/// Input for updating an article; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateArticleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub image: Option<String>,
    pub time_to_read: Option<String>,
}

impl UpdateArticleInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.body.is_some()
            || self.image.is_some()
            || self.time_to_read.is_some()
    }
}

/// Case-insensitive "contains" filters for article listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleFilter {
    /// Author username
    pub author: Option<String>,
    pub title: Option<String>,
    pub tag: Option<String>,
    /// Matches title, description or body
    pub search: Option<String>,
}

impl ArticleFilter {
    /// Lowercased `%value%` pattern for a filter, ignoring blank values
    ///
    /// `%`, `_` and the escape character `!` match literally.
    pub fn like_pattern(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| format!("%{}%", escape_like(&v.to_lowercase())))
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there is a previous page
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// A page past the end; page 1 of an empty listing is still valid
    pub fn is_out_of_range(&self) -> bool {
        self.page > 1 && self.page > self.total_pages()
    }

    /// Transform the items while keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_clamps() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(params.offset(), 0);

        let params = ListParams::new(3, 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_paged_result_navigation() {
        let params = ListParams::new(2, 10);
        let page = PagedResult::new(vec![1, 2, 3], 23, &params);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(page.has_prev());
        assert!(!page.is_out_of_range());
    }

    #[test]
    fn test_empty_first_page_is_in_range() {
        let page: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::default());
        assert_eq!(page.total_pages(), 0);
        assert!(!page.is_out_of_range());

        let page: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::new(2, 10));
        assert!(page.is_out_of_range());
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(ArticleFilter::like_pattern(&Some(" Rust ".into())), Some("%rust%".into()));
        assert_eq!(ArticleFilter::like_pattern(&Some("   ".into())), None);
        assert_eq!(ArticleFilter::like_pattern(&None), None);
        assert_eq!(
            ArticleFilter::like_pattern(&Some("50%_off!".into())),
            Some("%50!%!_off!!%".into())
        );
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Every item index falls on exactly one page.
        #[test]
        fn pages_cover_all_items(total in 0i64..2_000, per_page in 1u32..=100) {
            let params = ListParams::new(1, per_page);
            let pages = PagedResult::<()>::new(vec![], total, &params).total_pages() as i64;
            prop_assert!(pages * per_page as i64 >= total);
            prop_assert!((pages - 1).max(0) * (per_page as i64) < total.max(1));
        }
    }
}
