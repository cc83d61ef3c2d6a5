//! One ingestion run: plan pages, fetch each in order, persist what arrives
//! and record a single fetch-log entry.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::app::{CatalogError, Result};
use crate::client::{CatalogClient, ItemQuery};
use crate::config::IngestSettings;
use crate::domain::{FetchKind, NewFetchLog, RunStatus};
use crate::pagination::{self, PagePlan, MAX_OFFSET, MAX_PAGE_SIZE, MAX_TOTAL};
use crate::store::Store;

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub hits: i64,
    pub offset: i64,
    pub total: i64,
    pub sort: String,
    pub keyword: Option<String>,
    pub kind: FetchKind,
}

impl RunRequest {
    pub fn from_settings(settings: &IngestSettings, kind: FetchKind) -> Self {
        Self {
            hits: settings.hits,
            offset: settings.offset,
            total: settings.total,
            sort: settings.sort.clone(),
            keyword: settings.keyword.clone(),
            kind,
        }
    }

    /// Reject impossible values and clamp oversized ones.
    pub fn validated(mut self) -> Result<Self> {
        if self.hits <= 0 {
            return Err(CatalogError::InvalidParameter(format!(
                "hits must be positive, got {}",
                self.hits
            )));
        }
        if self.total <= 0 {
            return Err(CatalogError::InvalidParameter(format!(
                "total must be positive, got {}",
                self.total
            )));
        }
        if self.offset < 1 {
            return Err(CatalogError::InvalidParameter(format!(
                "offset must be at least 1, got {}",
                self.offset
            )));
        }
        if self.offset > MAX_OFFSET {
            return Err(CatalogError::InvalidParameter(format!(
                "offset must be at most {}, got {}",
                MAX_OFFSET, self.offset
            )));
        }
        if self.sort.trim().is_empty() {
            self.sort = "date".to_string();
        }
        self.hits = self.hits.min(MAX_PAGE_SIZE);
        self.total = self.total.min(MAX_TOTAL);
        Ok(self)
    }

    /// Pages this request would fetch, without doing any I/O.
    pub fn plan(&self) -> Result<Vec<PagePlan>> {
        let request = self.clone().validated()?;
        pagination::plan(request.total, request.hits, request.offset)
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub planned_pages: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    /// Pages not requested because they lie past the provider's result set.
    pub pages_skipped: usize,
    pub items_processed: usize,
    /// Raw items dropped during normalization.
    pub items_skipped: usize,
    pub total_result_count: Option<i64>,
    pub elapsed_ms: i64,
    pub status: RunStatus,
    /// `None` when the fetch log could not be written.
    pub log_id: Option<i64>,
}

impl RunSummary {
    pub fn message(&self) -> String {
        format!(
            "Fetched {} items ({} of {} pages ok, {} failed, {} skipped; {} items unusable)",
            self.items_processed,
            self.pages_succeeded,
            self.planned_pages,
            self.pages_failed,
            self.pages_skipped,
            self.items_skipped,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Planning,
    Fetching(usize),
    Normalizing(usize),
    Persisting(usize),
    Completed,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Planning => write!(f, "planning"),
            RunPhase::Fetching(page) => write!(f, "fetching page {}", page),
            RunPhase::Normalizing(page) => write!(f, "normalizing page {}", page),
            RunPhase::Persisting(page) => write!(f, "persisting page {}", page),
            RunPhase::Completed => write!(f, "completed"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

pub struct Ingestor<S: Store> {
    store: Arc<S>,
    client: Arc<CatalogClient>,
}

impl<S: Store> Ingestor<S> {
    pub fn new(store: Arc<S>, client: Arc<CatalogClient>) -> Self {
        Self { store, client }
    }

    /// Execute one run. Only validation and configuration problems return
    /// `Err`; page failures are counted in the summary.
    pub async fn run(&self, request: RunRequest) -> Result<RunSummary> {
        let started = Instant::now();
        let request = request.validated()?;

        if !self.client.provider().has_credentials() {
            return Err(CatalogError::Config(
                "provider api_id and affiliate_id must be set".into(),
            ));
        }

        trace_phase(RunPhase::Planning);
        let pages = pagination::plan(request.total, request.hits, request.offset)?;
        tracing::info!(
            kind = %request.kind,
            pages = pages.len(),
            hits = request.hits,
            total = request.total,
            "Starting ingestion run"
        );

        let mut summary = RunSummary {
            planned_pages: pages.len(),
            pages_succeeded: 0,
            pages_failed: 0,
            pages_skipped: 0,
            items_processed: 0,
            items_skipped: 0,
            total_result_count: None,
            elapsed_ms: 0,
            status: RunStatus::Success,
            log_id: None,
        };

        for (index, page) in pages.iter().enumerate() {
            let number = index + 1;

            if let Some(available) = summary.total_result_count {
                if page.offset > available {
                    tracing::debug!(page = number, offset = page.offset, available, "Skipping page past end of results");
                    summary.pages_skipped += 1;
                    continue;
                }
            }

            trace_phase(RunPhase::Fetching(number));
            let mut query = ItemQuery::new()
                .hits(page.limit)
                .offset(page.offset)
                .sort(request.sort.clone());
            if let Some(keyword) = &request.keyword {
                query = query.keyword(keyword.clone());
            }

            let raw = match self.client.fetch_raw(&query).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(page = number, offset = page.offset, error = %e, "Page fetch failed");
                    summary.pages_failed += 1;
                    continue;
                }
            };

            trace_phase(RunPhase::Normalizing(number));
            let fetched = self.client.normalize(raw);
            if fetched.total_count.is_some() {
                summary.total_result_count = fetched.total_count;
            }
            summary.items_skipped += fetched.skipped;

            trace_phase(RunPhase::Persisting(number));
            match self.store.upsert_batch(&fetched.items) {
                Ok(outcome) => {
                    tracing::info!(
                        page = number,
                        offset = page.offset,
                        created = outcome.created,
                        updated = outcome.updated,
                        "Page ingested"
                    );
                    summary.pages_succeeded += 1;
                    summary.items_processed += outcome.total();
                }
                Err(e) => {
                    tracing::error!(page = number, offset = page.offset, error = %e, "Page persistence failed");
                    summary.pages_failed += 1;
                }
            }
        }

        summary.status = RunStatus::from_counts(summary.pages_succeeded, summary.pages_failed);
        summary.elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        trace_phase(match summary.status {
            RunStatus::Error => RunPhase::Failed,
            _ => RunPhase::Completed,
        });

        let entry = NewFetchLog {
            kind: request.kind,
            status: summary.status,
            items_fetched: summary.items_processed as i64,
            message: summary.message(),
            elapsed_ms: summary.elapsed_ms,
        };
        summary.log_id = match self.store.append_fetch_log(&entry) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, "Failed to record fetch log");
                None
            }
        };

        tracing::info!(
            status = %summary.status,
            items = summary.items_processed,
            failed = summary.pages_failed,
            elapsed_ms = summary.elapsed_ms,
            "Ingestion run finished"
        );

        Ok(summary)
    }
}

fn trace_phase(phase: RunPhase) {
    tracing::debug!(phase = %phase, "Ingestion phase");
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use crate::client::tests::{page_body, provider, ScriptedFetcher};
    use crate::config::ProviderConfig;
    use crate::store::{SearchFilters, SqliteStore};

    use super::*;

    fn request(hits: i64, total: i64) -> RunRequest {
        RunRequest {
            hits,
            offset: 1,
            total,
            sort: "date".into(),
            keyword: None,
            kind: FetchKind::Manual,
        }
    }

    fn ingestor(
        responses: Vec<Result<Vec<u8>>>,
    ) -> (Ingestor<SqliteStore>, Arc<SqliteStore>, Arc<ScriptedFetcher>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher::new(responses));
        let client = Arc::new(CatalogClient::new(fetcher.clone(), provider()));
        (Ingestor::new(store.clone(), client), store, fetcher)
    }

    #[tokio::test]
    async fn test_all_pages_succeed() {
        let (ingestor, store, _) = ingestor(vec![
            Ok(page_body(100, &["a1", "a2"])),
            Ok(page_body(100, &["b1", "b2"])),
        ]);

        let summary = assert_ok!(ingestor.run(request(2, 4)).await);

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.planned_pages, 2);
        assert_eq!(summary.pages_succeeded, 2);
        assert_eq!(summary.items_processed, 4);
        assert_eq!(summary.total_result_count, Some(100));
        assert!(summary.log_id.is_some());
        assert_eq!(store.count(&SearchFilters::default()).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_middle_page_failure_is_partial() {
        let (ingestor, store, fetcher) = ingestor(vec![
            Ok(page_body(100, &["a1", "a2"])),
            Err(CatalogError::FetchFailed("HTTP 503".into())),
            Ok(page_body(100, &["c1", "c2"])),
        ]);

        let summary = ingestor.run(request(2, 6)).await.unwrap();

        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(summary.pages_succeeded, 2);
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.items_processed, 4);
        assert_eq!(fetcher.requested().len(), 3);

        assert!(store.find_by_external_id("a1").unwrap().is_some());
        assert!(store.find_by_external_id("c2").unwrap().is_some());

        let logs = store.recent_fetch_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, RunStatus::Partial);
        assert_eq!(logs[0].items_fetched, 4);
        assert_eq!(Some(logs[0].id), summary.log_id);
    }

    #[tokio::test]
    async fn test_all_pages_failing_is_error() {
        let (ingestor, store, _) = ingestor(vec![
            Err(CatalogError::FetchFailed("HTTP 500".into())),
            Ok(b"not json".to_vec()),
        ]);

        let summary = ingestor.run(request(10, 20)).await.unwrap();

        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.pages_failed, 2);
        assert_eq!(summary.items_processed, 0);

        let logs = store.recent_fetch_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, RunStatus::Error);
    }

    #[tokio::test]
    async fn test_pages_past_total_count_are_skipped() {
        let (ingestor, _, fetcher) = ingestor(vec![
            Ok(page_body(3, &["a1", "a2"])),
            Ok(page_body(3, &["a3"])),
        ]);

        let summary = ingestor.run(request(2, 10)).await.unwrap();

        assert_eq!(summary.planned_pages, 5);
        assert_eq!(summary.pages_succeeded, 2);
        assert_eq!(summary.pages_skipped, 3);
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(fetcher.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_writes_no_log() {
        let (ingestor, store, fetcher) = ingestor(vec![]);

        for bad in [request(0, 10), request(10, 0), RunRequest { offset: 0, ..request(10, 10) }] {
            let err = assert_err!(ingestor.run(bad).await);
            assert!(err.is_rejection());
        }

        assert!(fetcher.requested().is_empty());
        assert!(store.recent_fetch_logs(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_abort_run() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let client = Arc::new(CatalogClient::new(fetcher, ProviderConfig::default()));
        let ingestor = Ingestor::new(store.clone(), client);

        let err = ingestor.run(request(10, 10)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
        assert!(store.recent_fetch_logs(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reingesting_updates_instead_of_duplicating() {
        let (ingestor, store, _) = ingestor(vec![
            Ok(page_body(2, &["a1", "a2"])),
            Ok(page_body(2, &["a1", "a2"])),
        ]);

        ingestor.run(request(2, 2)).await.unwrap();
        let second = ingestor.run(request(2, 2)).await.unwrap();

        assert_eq!(second.items_processed, 2);
        assert_eq!(store.count(&SearchFilters::default()).unwrap(), 2);
        assert_eq!(store.recent_fetch_logs(10).unwrap().len(), 2);
    }

    #[test]
    fn test_validation_rejects_offset_past_result_window() {
        let far = RunRequest {
            offset: i64::MAX - 50,
            ..request(100, 1000)
        };
        assert!(assert_err!(far.clone().validated()).is_rejection());
        assert!(assert_err!(far.plan()).is_rejection());

        let edge = RunRequest {
            offset: MAX_OFFSET,
            ..request(100, 1000)
        };
        assert_eq!(assert_ok!(edge.plan()).len(), 10);
    }

    #[test]
    fn test_validation_clamps_oversized_values() {
        let clamped = request(500, 5000).validated().unwrap();
        assert_eq!(clamped.hits, 100);
        assert_eq!(clamped.total, 1000);
        assert_eq!(request(500, 5000).plan().unwrap().len(), 10);
    }

    #[test]
    fn test_from_settings() {
        let settings = IngestSettings {
            keyword: Some("sea".into()),
            ..Default::default()
        };
        let req = RunRequest::from_settings(&settings, FetchKind::Scheduled);
        assert_eq!(req.hits, 20);
        assert_eq!(req.total, 100);
        assert_eq!(req.keyword.as_deref(), Some("sea"));
        assert_eq!(req.kind, FetchKind::Scheduled);
    }
}
