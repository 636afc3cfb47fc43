//! Shared API response types

use serde::Serialize;

use crate::models::PagedResult;

/// Paginated list envelope
///
/// `next` and `previous` are page numbers, absent at either end.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> From<PagedResult<T>> for PageResponse<T> {
    fn from(page: PagedResult<T>) -> Self {
        Self {
            count: page.total,
            total_pages: page.total_pages(),
            next: page.has_next().then(|| page.page + 1),
            previous: page.has_prev().then(|| page.page - 1),
            page: page.page,
            page_size: page.per_page,
            results: page.items,
        }
    }
}

/// A bare `{ "message": ... }` body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_page_response_links() {
        let page = PagedResult::new(vec![1, 2], 25, &ListParams::new(2, 10));
        let response = PageResponse::from(page);
        assert_eq!(response.count, 25);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.next, Some(3));
        assert_eq!(response.previous, Some(1));
        assert_eq!(response.results, vec![1, 2]);
    }

    #[test]
    fn test_page_response_single_page() {
        let page: PagedResult<i32> = PagedResult::new(vec![], 0, &ListParams::default());
        let response = PageResponse::from(page);
        assert_eq!(response.total_pages, 0);
        assert!(response.next.is_none());
        assert!(response.previous.is_none());
    }
}
