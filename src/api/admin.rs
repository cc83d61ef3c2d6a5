use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::domain::FetchKind;

/// Optional overrides accepted by `POST /admin/fetch-items`.
#[derive(Debug, Default, Deserialize)]
pub struct FetchItemsBody {
    pub hits: Option<i64>,
    pub offset: Option<i64>,
    pub total: Option<i64>,
    pub sort: Option<String>,
}

fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Reject the request unless it carries the configured admin token.
fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = state.config.admin_token().ok_or(ApiError::AdminDisabled)?;

    let presented = match bearer_token(headers) {
        Some(token) if !token.is_empty() => token,
        _ => {
            tracing::warn!("Admin request without bearer token");
            return Err(ApiError::Unauthorized);
        }
    };

    let presented_digest = token_digest(presented);
    if presented_digest != token_digest(expected) {
        tracing::warn!(fingerprint = &presented_digest[..8], "Admin request with wrong token");
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

/// POST /admin/fetch-items
///
/// Runs one ingestion with the configured settings, overridden by any
/// fields in the JSON body, and returns the run summary.
pub async fn fetch_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    authorize(&state, &headers)?;

    let overrides: FetchItemsBody = if body.iter().all(u8::is_ascii_whitespace) {
        FetchItemsBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?
    };

    let mut request = state.run_request(FetchKind::Manual);
    if let Some(hits) = overrides.hits {
        request.hits = hits;
    }
    if let Some(offset) = overrides.offset {
        request.offset = offset;
    }
    if let Some(total) = overrides.total {
        request.total = total;
    }
    if let Some(sort) = overrides.sort {
        request.sort = sort;
    }

    let summary = state.ingestor.run(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": summary,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc "));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_token_digest_is_stable_hex() {
        let digest = token_digest("s3cret");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("s3cret"));
        assert_ne!(digest, token_digest("s3cret "));
    }
}
