//! Common API utilities and shared types

use serde::Deserialize;

use crate::models::{ArticleFilter, ListParams};

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size
pub fn default_page_size() -> u32 {
    10
}

/// Largest accepted page size
pub const MAX_PAGE_SIZE: u32 = 100;

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PaginationQuery {
    /// Clamped to `1..=MAX_PAGE_SIZE`
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size.min(MAX_PAGE_SIZE))
    }
}

/// Query string for article listing: pagination plus filters
#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub author: Option<String>,
    pub title: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl ArticleListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size.min(MAX_PAGE_SIZE))
    }

    pub fn filter(&self) -> ArticleFilter {
        ArticleFilter {
            author: self.author.clone(),
            title: self.title.clone(),
            tag: self.tag.clone(),
            search: self.search.clone(),
        }
    }
}
