//! Shared pagination types for API query parameters.
//!
//! List endpoints use page-based pagination with 1-indexed `page` and
//! `page_size` parameters. The total count of matching items is computed
//! before pagination, so a page past the end of the result set is an empty
//! but valid response.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum number of items that can be requested per page.
pub const MAX_PAGE_SIZE: i64 = 500;

/// Standard pagination parameters for list endpoints.
///
/// - `page`: 1-indexed page number (default: 1)
/// - `page_size`: items per page (default: 20, max: 500)
///
/// Both values are clamped so out-of-range input never produces a zero-size
/// or negative window.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// 1-indexed page number (default: 1)
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Maximum number of items to return (default: 20, max: 500)
    #[param(default = 20, minimum = 1, maximum = 500)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page_size: Option<i64>,
}

impl Pagination {
    /// Get the page number, clamped to at least 1.
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the page size, clamped between 1 and MAX_PAGE_SIZE.
    /// Defaults to DEFAULT_PAGE_SIZE if not specified.
    #[inline]
    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Get both page and page size as a tuple, useful for destructuring.
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.page(), self.page_size())
    }
}

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total: i64,
    /// 1-indexed page number of this response
    pub page: i64,
    /// Maximum items returned per page
    pub page_size: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    /// Create a new paginated response
    pub fn new(data: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        Self {
            data,
            total,
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_clamping() {
        // Zero is clamped to 1
        let p = Pagination {
            page: Some(0),
            page_size: None,
        };
        assert_eq!(p.page(), 1);

        // Negative is clamped to 1
        let p = Pagination {
            page: Some(-3),
            page_size: None,
        };
        assert_eq!(p.page(), 1);

        // Valid value passes through
        let p = Pagination {
            page: Some(7),
            page_size: None,
        };
        assert_eq!(p.page(), 7);
    }

    #[test]
    fn test_page_size_clamping() {
        // Zero is clamped to 1
        let p = Pagination {
            page: None,
            page_size: Some(0),
        };
        assert_eq!(p.page_size(), 1);

        // Over max is clamped to MAX_PAGE_SIZE
        let p = Pagination {
            page: None,
            page_size: Some(10_000),
        };
        assert_eq!(p.page_size(), MAX_PAGE_SIZE);

        // Valid value passes through
        let p = Pagination {
            page: None,
            page_size: Some(50),
        };
        assert_eq!(p.page_size(), 50);
    }

    #[test]
    fn test_params() {
        let p = Pagination {
            page: Some(2),
            page_size: Some(50),
        };
        assert_eq!(p.params(), (2, 50));
    }
}
