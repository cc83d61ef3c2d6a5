//! HTTP surface: the read API over the local catalog and the admin
//! ingestion trigger.

pub mod admin;
pub mod error;
pub mod items;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::app::AppContext;

pub use error::{ApiError, ApiResult};

/// Shared state handed to every handler.
pub type AppState = Arc<AppContext>;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/items", get(items::list_items))
        .route("/api/items/{external_id}", get(items::get_item))
        .route("/admin/fetch-items", post(admin::fetch_items))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Serve `state` on its configured bind address until the process exits.
pub async fn serve(state: AppState) -> crate::app::Result<()> {
    let bind = state.config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
