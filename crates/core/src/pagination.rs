//! Page arithmetic for the review listing.
//!
//! Pagination is applied on top of whatever order the caller produced; it does
//! not sort.

use crate::error::CoreError;

/// Default page size when the caller does not supply one. The review UI
/// shows two records at a time.
pub const DEFAULT_PAGE_LIMIT: u32 = 2;

/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Validate `page >= 1` and `1 <= limit <= MAX_PAGE_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Result<Self, CoreError> {
        if page == 0 {
            return Err(CoreError::Validation("page must be at least 1".to_string()));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(CoreError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    /// Zero-based offset of the first item: `(page - 1) * limit`.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// The items on this page. Empty when the page is past the end.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset().min(items.len());
        let end = (start + self.limit as usize).min(items.len());
        &items[start..end]
    }
}

/// `ceil(total / limit)`.
pub fn total_pages(total: usize, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit as usize) as u32
}
