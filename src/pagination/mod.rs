//! Request planning for paginated provider calls.
//!
//! The provider addresses results with a 1-based `offset` and a page size
//! (`hits`) capped at [`MAX_PAGE_SIZE`]. A run that wants `total` results is
//! split into `ceil(total / page_size)` requests.

use serde::{Deserialize, Serialize};

use crate::app::{CatalogError, Result};

/// Largest page the provider will serve.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Largest result target accepted for a single run.
pub const MAX_TOTAL: i64 = 1000;

/// Highest 1-based offset the provider will serve.
pub const MAX_OFFSET: i64 = 50_000;

/// One provider request: `limit` rows starting at 1-based `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePlan {
    pub limit: i64,
    pub offset: i64,
}

/// Split `total` results into ordered page requests of `page_size` rows,
/// starting at `start_offset`.
///
/// ```
/// use catalog_mirror::pagination::{plan, PagePlan};
///
/// let pages = plan(250, 100, 1).unwrap();
/// assert_eq!(pages, vec![
///     PagePlan { limit: 100, offset: 1 },
///     PagePlan { limit: 100, offset: 101 },
///     PagePlan { limit: 100, offset: 201 },
/// ]);
/// ```
pub fn plan(total: i64, page_size: i64, start_offset: i64) -> Result<Vec<PagePlan>> {
    if total <= 0 {
        return Err(CatalogError::InvalidParameter(format!(
            "total must be positive, got {}",
            total
        )));
    }
    if page_size <= 0 {
        return Err(CatalogError::InvalidParameter(format!(
            "page size must be positive, got {}",
            page_size
        )));
    }
    if start_offset < 1 {
        return Err(CatalogError::InvalidParameter(format!(
            "offset is 1-based, got {}",
            start_offset
        )));
    }

    let pages = total / page_size + i64::from(total % page_size != 0);
    let last_offset = (pages - 1)
        .checked_mul(page_size)
        .and_then(|span| span.checked_add(start_offset));
    if last_offset.is_none() {
        return Err(CatalogError::InvalidParameter(format!(
            "offset {} with {} pages of {} is out of range",
            start_offset, pages, page_size
        )));
    }

    Ok((0..pages)
        .map(|i| PagePlan {
            limit: page_size,
            offset: start_offset + i * page_size,
        })
        .collect())
}

/// Cap a requested page size at the provider maximum.
pub fn clamp_page_size(page_size: i64) -> i64 {
    page_size.min(MAX_PAGE_SIZE)
}
