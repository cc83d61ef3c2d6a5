use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::app::error::{CatalogError, Result};
use crate::client::CatalogClient;
use crate::config::Config;
use crate::domain::{FetchKind, Item};
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::ingest::{Ingestor, RunRequest};
use crate::store::sqlite::SqliteStore;
use crate::store::{clamp_limit, clamp_offset, SearchFilters, Store, DEFAULT_SEARCH_LIMIT};

/// One page of the local catalog plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct ItemListing {
    pub items: Vec<Item>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub client: Arc<CatalogClient>,
    pub ingestor: Ingestor<SqliteStore>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.database.path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(config.provider.fetch_policy())?);

        tracing::debug!(path = %db_path.display(), "Opened catalog database");
        Ok(Self::with_parts(config, store, fetcher))
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(config.provider.fetch_policy())?);
        Ok(Self::with_parts(config, store, fetcher))
    }

    /// Wire a context around an existing store and fetcher.
    pub fn with_parts(
        config: Config,
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Self {
        let client = Arc::new(CatalogClient::new(fetcher, config.provider.clone()));
        let ingestor = Ingestor::new(store.clone(), client.clone());

        Self {
            config,
            store,
            client,
            ingestor,
        }
    }

    /// A run request built from the configured ingest settings.
    pub fn run_request(&self, kind: FetchKind) -> RunRequest {
        RunRequest::from_settings(&self.config.ingest, kind)
    }

    pub fn list_items(
        &self,
        filters: &SearchFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<ItemListing> {
        let limit = clamp_limit(limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
        let offset = clamp_offset(offset.unwrap_or(0));

        let items = self.store.search(filters, limit, offset)?;
        let total = self.store.count(filters)?;

        Ok(ItemListing {
            items,
            total,
            limit,
            offset,
        })
    }

    pub fn get_by_external_id(&self, external_id: &str) -> Result<Item> {
        self.store
            .find_by_external_id(external_id)?
            .ok_or_else(|| CatalogError::ItemNotFound(external_id.to_string()))
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CatalogError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("catalog-mirror");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("catalog.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> AppContext {
        let ctx = AppContext::in_memory(Config::default()).unwrap();
        let batch: Vec<Item> = (0..30)
            .map(|i| Item::new(format!("id-{:02}", i), format!("Title {}", i)))
            .collect();
        ctx.store.upsert_batch(&batch).unwrap();
        ctx
    }

    #[test]
    fn test_list_items_defaults_and_clamps() {
        let ctx = seeded();

        let listing = ctx.list_items(&SearchFilters::default(), None, None).unwrap();
        assert_eq!(listing.items.len(), 20);
        assert_eq!(listing.total, 30);
        assert_eq!((listing.limit, listing.offset), (20, 0));

        let listing = ctx
            .list_items(&SearchFilters::default(), Some(500), Some(-4))
            .unwrap();
        assert_eq!(listing.limit, 100);
        assert_eq!(listing.offset, 0);
        assert_eq!(listing.items.len(), 30);
    }

    #[test]
    fn test_get_by_external_id() {
        let ctx = seeded();
        assert_eq!(ctx.get_by_external_id("id-07").unwrap().title, "Title 7");

        let err = ctx.get_by_external_id("nope").unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound(_)));
    }

    #[test]
    fn test_run_request_uses_settings() {
        let mut config = Config::default();
        config.ingest.total = 40;
        let ctx = AppContext::in_memory(config).unwrap();

        let request = ctx.run_request(FetchKind::Manual);
        assert_eq!(request.total, 40);
        assert_eq!(request.kind, FetchKind::Manual);
    }
}
