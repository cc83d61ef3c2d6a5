use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::store::SearchFilters;

/// Query string of `GET /api/items`.
#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    pub keyword: Option<String>,
    pub maker: Option<String>,
    pub released_from: Option<NaiveDate>,
    pub released_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ItemsQuery {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            keyword: self.keyword.clone(),
            maker: self.maker.clone(),
            released_from: self.released_from,
            released_to: self.released_to,
        }
    }
}

/// GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ItemsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let listing = state.list_items(&query.filters(), query.limit, query.offset)?;

    Ok(Json(json!({
        "success": true,
        "data": listing,
    })))
}

/// GET /api/items/{external_id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let item = state.get_by_external_id(&external_id)?;

    Ok(Json(json!({
        "success": true,
        "data": item,
    })))
}
