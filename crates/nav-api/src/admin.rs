use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use nav_catalog::pipeline::{inspect_records, RecordReport};
use nav_catalog::{CacheState, SnapshotOrigin};
use nav_core::notion::DatabaseInfo;
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiResult, AppState};

const DEFAULT_RECORD_LIMIT: u32 = 10;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct RecordsResponse {
    pub count: usize,
    pub records: Vec<RecordReport>,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub state: CacheState,
    pub ttl_seconds: u64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub origin: SnapshotOrigin,
    pub fetched_at: DateTime<Utc>,
    pub categories: usize,
    pub links: usize,
}

/// Admin routes stay disabled until `NAV_ADMIN_TOKEN` is configured.
fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "ADMIN_DISABLED",
            "admin routes are disabled; set NAV_ADMIN_TOKEN",
        ));
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    match provided {
        Some(token) if tokens_match(token, expected) => Ok(()),
        Some(_) => {
            tracing::warn!("admin request with invalid token");
            Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "AUTH_FAILED",
                "invalid admin token",
            ))
        }
        None => Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "missing admin token",
        )),
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    provided.len() == expected.len()
        && provided
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

pub async fn connection(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&state, &headers)?;
    state.notion.check_connection().await?;
    Ok(Json(StatusResponse { status: "ok" }))
}

pub async fn database(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<DatabaseInfo>> {
    require_admin(&state, &headers)?;
    let info = state.notion.database_info().await?;
    Ok(Json(info))
}

pub async fn records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecordsQuery>,
) -> ApiResult<Json<RecordsResponse>> {
    require_admin(&state, &headers)?;
    let raw = state
        .notion
        .raw_records(query.limit.unwrap_or(DEFAULT_RECORD_LIMIT))
        .await?;
    let records = inspect_records(raw, state.cache.tables());
    Ok(Json(RecordsResponse {
        count: records.len(),
        records,
    }))
}

pub async fn cache_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CacheStatus>> {
    require_admin(&state, &headers)?;
    Ok(Json(CacheStatus {
        state: state.cache.state().await,
        ttl_seconds: state.cache.ttl().as_secs(),
    }))
}

pub async fn refresh_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<RefreshResponse>> {
    require_admin(&state, &headers)?;
    let snapshot = state.cache.refresh().await;
    tracing::info!(origin = snapshot.origin.as_str(), "catalog refreshed by admin");
    Ok(Json(RefreshResponse {
        origin: snapshot.origin,
        fetched_at: snapshot.fetched_at,
        categories: snapshot.categories.len(),
        links: snapshot.links.len(),
    }))
}

pub async fn invalidate_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<StatusResponse>> {
    require_admin(&state, &headers)?;
    state.cache.invalidate().await;
    Ok(Json(StatusResponse { status: "cleared" }))
}

#[cfg(test)]
mod tests {
    use super::tokens_match;

    #[test]
    fn tokens_match_requires_identical_bytes() {
        assert!(tokens_match("letmein", "letmein"));
        assert!(!tokens_match("letmeio", "letmein"));
        assert!(!tokens_match("letme", "letmein"));
        assert!(!tokens_match("", "letmein"));
    }
}
