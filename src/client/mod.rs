//! Catalog provider client: query building, envelope parsing and
//! normalization of one page of results.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::app::{CatalogError, Result};
use crate::config::ProviderConfig;
use crate::domain::Item;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::pagination::clamp_page_size;

/// Per-request overrides merged over the configured defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    pub hits: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub keyword: Option<String>,
    pub cid: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(mut self, hits: i64) -> Self {
        self.hits = Some(hits);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

/// One provider response with its items still in provider shape.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub total_count: Option<i64>,
    pub items: Vec<Value>,
}

/// One provider response after normalization.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    /// Size of the whole result set as reported by the provider.
    pub total_count: Option<i64>,
    pub items: Vec<Item>,
    /// Raw items dropped because they had no usable external id.
    pub skipped: usize,
}

pub struct CatalogClient {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    provider: ProviderConfig,
}

impl CatalogClient {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, provider: ProviderConfig) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            provider,
        }
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Provider URL for `query`: configured defaults first, overrides
    /// replacing them in place, extra pairs appended.
    pub fn build_url(&self, query: &ItemQuery) -> Result<Url> {
        if !self.provider.has_credentials() {
            return Err(CatalogError::Config(
                "provider api_id and affiliate_id must be set".into(),
            ));
        }

        let p = &self.provider;
        let mut params: Vec<(String, String)> = vec![
            ("api_id".into(), p.api_id.clone()),
            ("affiliate_id".into(), p.affiliate_id.clone()),
            ("site".into(), p.site.clone()),
            ("service".into(), p.service.clone()),
            ("floor".into(), p.floor.clone()),
            ("hits".into(), query.hits.unwrap_or(20).to_string()),
            ("offset".into(), query.offset.unwrap_or(1).to_string()),
            (
                "sort".into(),
                query.sort.clone().unwrap_or_else(|| "date".into()),
            ),
            ("output".into(), "json".into()),
        ];
        if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            params.push(("keyword".into(), keyword.trim().to_string()));
        }
        if let Some(cid) = query.cid.as_deref().filter(|c| !c.trim().is_empty()) {
            params.push(("cid".into(), cid.trim().to_string()));
        }
        for (key, value) in &query.extra {
            match params.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.clone(),
                None => params.push((key.clone(), value.clone())),
            }
        }

        Ok(Url::parse_with_params(&p.endpoint, &params)?)
    }

    /// Fetch one page and unwrap its envelope without normalizing.
    pub async fn fetch_raw(&self, query: &ItemQuery) -> Result<RawPage> {
        let url = self.build_url(query)?;
        let body = self.fetcher.get(&url).await?;
        let (total_count, items) = parse_envelope(&body)?;
        Ok(RawPage { total_count, items })
    }

    pub fn normalize(&self, raw: RawPage) -> ItemPage {
        let (items, skipped) = self.normalizer.normalize_all(&raw.items);

        tracing::debug!(
            received = raw.items.len(),
            normalized = items.len(),
            skipped,
            "Normalized provider page"
        );

        ItemPage {
            total_count: raw.total_count,
            items,
            skipped,
        }
    }

    /// Fetch and normalize one page.
    pub async fn fetch_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        let raw = self.fetch_raw(query).await?;
        Ok(self.normalize(raw))
    }

    /// Newest items first.
    pub async fn fetch_recent(&self, count: i64) -> Result<ItemPage> {
        if count <= 0 {
            return Err(CatalogError::InvalidParameter(format!(
                "count must be positive, got {}",
                count
            )));
        }
        let query = ItemQuery::new()
            .hits(clamp_page_size(count))
            .offset(1)
            .sort("date");
        self.fetch_items(&query).await
    }

    /// The item with provider id `external_id`, if the provider knows it.
    pub async fn fetch_by_id(&self, external_id: &str) -> Result<Option<Item>> {
        let query = ItemQuery::new().cid(external_id).hits(1);
        let page = self.fetch_items(&query).await?;
        Ok(page.items.into_iter().next())
    }
}

/// Split a provider body into `(total_count, raw items)`.
fn parse_envelope(body: &[u8]) -> Result<(Option<i64>, Vec<Value>)> {
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| CatalogError::FetchFailed(format!("invalid JSON response: {}", e)))?;

    let result = json
        .get("result")
        .ok_or_else(|| CatalogError::FetchFailed("response has no result envelope".into()))?;

    if let Some(status) = result.get("status").and_then(as_integer) {
        if !(200..300).contains(&status) {
            let message = result
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message");
            return Err(CatalogError::FetchFailed(format!(
                "provider returned status {}: {}",
                status, message
            )));
        }
    }

    let items = result
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| CatalogError::FetchFailed("response has no result.items list".into()))?
        .clone();

    let total_count = result.get("total_count").and_then(as_integer);

    Ok((total_count, items))
}

/// Integer from a JSON number or numeric string.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
