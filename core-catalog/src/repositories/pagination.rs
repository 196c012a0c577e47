//! Pagination types shared by the repositories and the query engine.
//!
//! Limits are never allowed to produce unbounded result sets: a zero or
//! negative size is rejected as a validation error and anything above
//! [`MAX_PAGE_SIZE`] is clamped.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Upper bound on page sizes and feed limits.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Validate a caller-supplied feed limit, clamping it to [`MAX_PAGE_SIZE`].
pub fn effective_limit(limit: i64) -> Result<i64> {
    if limit <= 0 {
        return Err(CatalogError::validation(
            "limit",
            "limit must be a positive integer",
        ));
    }
    Ok(limit.min(MAX_PAGE_SIZE as i64))
}

/// A page request: 0-indexed page number plus page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Build a request, rejecting a zero page size and clamping oversized
    /// ones.
    pub fn new(page: u32, per_page: u32) -> Result<Self> {
        if per_page == 0 {
            return Err(CatalogError::validation(
                "per_page",
                "page size must be a positive integer",
            ));
        }
        Ok(Self {
            page,
            per_page: per_page.min(MAX_PAGE_SIZE),
        })
    }

    pub fn offset(&self) -> u32 {
        self.page * self.per_page
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: 20,
        }
    }
}

/// A page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages()
    }
}
