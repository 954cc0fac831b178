use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use nav_catalog::search::category_search;
use nav_catalog::{Category, Link, SnapshotOrigin};
use nav_core::notion::{is_notion_id, PageContent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ApiError, ApiResult, AppState};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryResponse {
    pub categories: Vec<Category>,
    pub links_by_category: BTreeMap<String, Vec<Link>>,
    pub fetched_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
}

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLinksResponse {
    pub category_id: String,
    pub category: Option<Category>,
    pub links: Vec<Link>,
}

#[derive(Deserialize)]
pub struct CategoryLinksQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct LinksQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct LinksPage {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<Link>,
}

pub async fn directory(State(state): State<AppState>) -> Json<DirectoryResponse> {
    let snapshot = state.cache.get().await;
    Json(DirectoryResponse {
        categories: snapshot.categories.clone(),
        links_by_category: snapshot.links_by_category(),
        fetched_at: snapshot.fetched_at,
        origin: snapshot.origin,
    })
}

pub async fn list_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    let snapshot = state.cache.get().await;
    Json(CategoriesResponse {
        categories: snapshot.categories.clone(),
    })
}

pub async fn category_links(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Query(query): Query<CategoryLinksQuery>,
) -> Json<CategoryLinksResponse> {
    let snapshot = state.cache.get().await;
    let links = category_search(
        query.q.as_deref(),
        &snapshot.links_in_category(&category_id),
    );
    tracing::debug!(category_id = %category_id, links = links.len(), "category links");
    Json(CategoryLinksResponse {
        category: snapshot.category(&category_id).cloned(),
        category_id,
        links,
    })
}

pub async fn list_links(
    State(state): State<AppState>,
    Query(query): Query<LinksQuery>,
) -> ApiResult<Json<LinksPage>> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_QUERY",
            "page starts at 1",
        ));
    }
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let snapshot = state.cache.get().await;
    let filtered: Vec<&Link> = snapshot
        .links
        .iter()
        .filter(|link| {
            query
                .category
                .as_deref()
                .map_or(true, |category| link.category_id == category)
        })
        .collect();

    let total = filtered.len();
    let results = filtered
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    Ok(Json(LinksPage {
        total,
        page,
        page_size,
        results,
    }))
}

pub async fn get_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<Link>> {
    let snapshot = state.cache.get().await;
    snapshot.link(&link_id).cloned().map(Json).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, "LINK_NOT_FOUND", "link not found")
            .with_details(serde_json::json!({ "link_id": link_id }))
    })
}

pub async fn page_content(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> ApiResult<Json<PageContent>> {
    if !is_notion_id(&page_id) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_QUERY",
            "page id must be a notion id",
        ));
    }
    let content = state.notion.page_content(&page_id).await?;
    Ok(Json(content))
}
