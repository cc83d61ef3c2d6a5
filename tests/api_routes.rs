//! Router tests for the read API and the admin ingestion trigger.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`
use url::Url;

use catalog_mirror::api::build_router;
use catalog_mirror::app::{AppContext, CatalogError, Result};
use catalog_mirror::config::Config;
use catalog_mirror::domain::Item;
use catalog_mirror::fetcher::Fetcher;
use catalog_mirror::store::{SqliteStore, Store};

const TOKEN: &str = "admin-s3cret";

/// Replays canned provider bodies in order.
struct CannedFetcher {
    bodies: Mutex<VecDeque<Result<Vec<u8>>>>,
    calls: Mutex<usize>,
}

impl CannedFetcher {
    fn new(bodies: Vec<Result<Vec<u8>>>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn get(&self, _url: &Url) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap() += 1;
        self.bodies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CatalogError::FetchFailed("no canned body".into())))
    }
}

fn provider_page(ids: &[&str]) -> Vec<u8> {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| json!({"content_id": id, "title": format!("Title {}", id), "prices": {"price": "¥1,980"}}))
        .collect();
    json!({"result": {"status": 200, "total_count": 1000, "items": items}})
        .to_string()
        .into_bytes()
}

fn test_config(admin_token: Option<&str>) -> Config {
    let mut config = Config::default();
    config.provider.api_id = "api-123".into();
    config.provider.affiliate_id = "aff-990".into();
    config.server.admin_token = admin_token.map(String::from);
    config
}

/// Test helper: app over an in-memory store seeded with `seed` items.
fn setup_app(
    admin_token: Option<&str>,
    seed: usize,
    bodies: Vec<Result<Vec<u8>>>,
) -> (axum::Router, Arc<AppContext>, Arc<CannedFetcher>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let items: Vec<Item> = (0..seed)
        .map(|i| Item::new(format!("seed-{:03}", i), format!("Seed {}", i)))
        .collect();
    store.upsert_batch(&items).unwrap();

    let fetcher = Arc::new(CannedFetcher::new(bodies));
    let ctx = Arc::new(AppContext::with_parts(
        test_config(admin_token),
        store,
        fetcher.clone(),
    ));
    (build_router(ctx.clone()), ctx, fetcher)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn admin_post(token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/admin/fetch-items")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Read API
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (app, _, _) = setup_app(None, 0, vec![]);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_items_default_page() {
    let (app, _, _) = setup_app(None, 25, vec![]);

    let response = app.oneshot(get("/api/items")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total"], 25);
    assert_eq!(body["data"]["limit"], 20);
    assert_eq!(body["data"]["offset"], 0);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_list_items_clamps_limit() {
    let (app, _, _) = setup_app(None, 150, vec![]);

    let response = app
        .oneshot(get("/api/items?limit=200&offset=-5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["limit"], 100);
    assert_eq!(body["data"]["offset"], 0);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 100);
    assert_eq!(body["data"]["total"], 150);
}

#[tokio::test]
async fn test_list_items_keyword_filter() {
    let (app, _, _) = setup_app(None, 15, vec![]);

    let response = app
        .oneshot(get("/api/items?keyword=seed-01"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;

    // seed-010 through seed-014
    assert_eq!(body["data"]["total"], 5);
}

#[tokio::test]
async fn test_list_items_rejects_bad_date() {
    let (app, _, _) = setup_app(None, 1, vec![]);

    let response = app
        .oneshot(get("/api/items?released_from=yesterday"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_get_item_found_and_missing() {
    let (app, _, _) = setup_app(None, 3, vec![]);

    let response = app.clone().oneshot(get("/api/items/seed-001")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["external_id"], "seed-001");
    assert_eq!(body["data"]["title"], "Seed 1");

    let response = app.oneshot(get("/api/items/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Item not found");
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _, _) = setup_app(None, 0, vec![]);

    let response = app.oneshot(get("/api/nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Admin trigger
// =============================================================================

#[tokio::test]
async fn test_admin_disabled_without_configured_token() {
    let (app, _, fetcher) = setup_app(None, 0, vec![]);

    let response = app.oneshot(admin_post(Some("anything"), "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_admin_rejects_missing_or_wrong_token() {
    let (app, ctx, fetcher) = setup_app(Some(TOKEN), 0, vec![]);

    let response = app.clone().oneshot(admin_post(None, "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(admin_post(Some("guess"), "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(fetcher.calls(), 0);
    assert!(ctx.store.recent_fetch_logs(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_rejects_malformed_body() {
    let (app, ctx, fetcher) = setup_app(Some(TOKEN), 0, vec![]);

    let response = app.oneshot(admin_post(Some(TOKEN), "{hits: ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fetcher.calls(), 0);
    assert!(ctx.store.recent_fetch_logs(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_rejects_invalid_parameters() {
    let (app, ctx, fetcher) = setup_app(Some(TOKEN), 0, vec![]);

    let response = app
        .oneshot(admin_post(Some(TOKEN), r#"{"hits": 0}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fetcher.calls(), 0);
    assert!(ctx.store.recent_fetch_logs(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_rejects_out_of_range_offset() {
    let (app, ctx, fetcher) = setup_app(Some(TOKEN), 0, vec![]);

    let response = app
        .oneshot(admin_post(
            Some(TOKEN),
            r#"{"hits": 100, "total": 1000, "offset": 9223372036854775757}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(fetcher.calls(), 0);
    assert!(ctx.store.recent_fetch_logs(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_runs_ingestion() {
    let bodies = vec![
        Ok(provider_page(&["abc001", "abc002"])),
        Err(CatalogError::FetchFailed("HTTP 503".into())),
        Ok(provider_page(&["abc005", "abc006"])),
    ];
    let (app, ctx, fetcher) = setup_app(Some(TOKEN), 0, bodies);

    let response = app
        .oneshot(admin_post(Some(TOKEN), r#"{"hits": 2, "total": 6}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "partial");
    assert_eq!(body["data"]["planned_pages"], 3);
    assert_eq!(body["data"]["pages_failed"], 1);
    assert_eq!(body["data"]["items_processed"], 4);
    assert_eq!(fetcher.calls(), 3);

    let stored = ctx.store.find_by_external_id("abc005").unwrap().unwrap();
    assert_eq!(stored.price, Some(1980));

    let logs = ctx.store.recent_fetch_logs(10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].items_fetched, 4);
}

#[tokio::test]
async fn test_admin_all_pages_failing_still_returns_summary() {
    let (app, ctx, _) = setup_app(Some(TOKEN), 0, vec![]);

    let response = app
        .oneshot(admin_post(Some(TOKEN), r#"{"hits": 10, "total": 10}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["status"], "error");
    assert_eq!(ctx.store.recent_fetch_logs(10).unwrap().len(), 1);
}
