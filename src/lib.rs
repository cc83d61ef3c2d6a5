//! # catalog-mirror
//!
//! Mirrors a third-party product catalog into local SQLite and serves it back
//! over a small read API.
//!
//! ## Architecture
//!
//! Ingestion is a sequential pipeline driven one page at a time:
//!
//! ```text
//! Pagination → Fetcher → Client (envelope) → Normalizer → Store
//! ```
//!
//! - [`pagination`]: plans the `(hits, offset)` requests of a run
//! - [`fetcher`]: HTTP GET with per-attempt timeout and retry/backoff
//! - [`normalizer`]: maps provider JSON of any known shape to an [`Item`](domain::Item)
//! - [`store`]: SQLite persistence with idempotent upserts
//! - [`ingest`]: runs the pipeline and records one fetch-log entry per run
//!
//! ## Quick Start
//!
//! ```bash
//! # Show what an ingestion would request
//! catalog-mirror plan --total 250 --hits 100
//!
//! # Ingest using the configured settings
//! catalog-mirror ingest
//!
//! # Browse what was stored
//! catalog-mirror list --keyword summer
//!
//! # Serve the HTTP API
//! catalog-mirror serve
//! ```

/// HTTP API built with axum.
///
/// - `GET /api/items`, `GET /api/items/{external_id}`, `GET /health`
/// - `POST /admin/fetch-items` (bearer token)
pub mod api;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// config, store, client and ingestor.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Catalog provider client.
pub mod client;

/// Configuration loaded from `~/.config/catalog-mirror/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Item`](domain::Item): canonical catalog entry
/// - [`FetchLogEntry`](domain::FetchLogEntry): one recorded ingestion attempt
pub mod domain;

/// HTTP fetching with retries.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for GET requests
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Ingestion runs.
pub mod ingest;

/// Provider JSON normalization.
pub mod normalizer;

/// Request planning for paginated provider queries.
pub mod pagination;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
