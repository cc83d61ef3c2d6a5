pub mod sqlite;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::{FetchLogEntry, Item, NewFetchLog};

pub use sqlite::SqliteStore;

/// Largest page a search may return.
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Substring of the title, description or external id.
    pub keyword: Option<String>,
    pub maker: Option<String>,
    /// Inclusive lower bound on the release date.
    pub released_from: Option<NaiveDate>,
    /// Inclusive upper bound on the release date.
    pub released_to: Option<NaiveDate>,
}

/// Result of writing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    /// `false` when an existing row was updated.
    pub created: bool,
}

/// Result of writing a page of items in one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub created: usize,
    pub updated: usize,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Clamp a requested page size to `1..=MAX_SEARCH_LIMIT`.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_SEARCH_LIMIT)
}

/// Clamp a requested row offset to be non-negative.
pub fn clamp_offset(offset: i64) -> i64 {
    offset.max(0)
}

pub trait Store {
    // Item operations
    fn find_by_external_id(&self, external_id: &str) -> Result<Option<Item>>;
    fn upsert(&self, item: &Item) -> Result<UpsertOutcome>;
    fn upsert_batch(&self, items: &[Item]) -> Result<BatchOutcome>;
    fn search(&self, filters: &SearchFilters, limit: i64, offset: i64) -> Result<Vec<Item>>;
    fn count(&self, filters: &SearchFilters) -> Result<i64>;

    // Fetch log operations
    fn append_fetch_log(&self, entry: &NewFetchLog) -> Result<i64>;
    fn recent_fetch_logs(&self, limit: i64) -> Result<Vec<FetchLogEntry>>;
}
