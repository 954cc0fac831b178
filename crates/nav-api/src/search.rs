use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use nav_catalog::search::{
    advanced_search, global_search, suggest, AdvancedOptions, SearchResults, SortOrder,
    DEFAULT_SUGGESTION_LIMIT,
};
use nav_catalog::{Category, Link};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ApiError, ApiResult, AppState};

const MAX_SUGGESTION_LIMIT: usize = 20;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct AdvancedQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
pub struct SuggestionsQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub categories: Vec<Category>,
    pub links_by_category: BTreeMap<String, Vec<Link>>,
    pub total: usize,
}

impl From<SearchResults> for SearchResponse {
    fn from(results: SearchResults) -> Self {
        Self {
            links_by_category: results.links_by_category(),
            total: results.total(),
            categories: results.categories,
        }
    }
}

/// Advanced results keep the flat list too, since a name sort is lost once
/// links are grouped.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSearchResponse {
    #[serde(flatten)]
    pub grouped: SearchResponse,
    pub links: Vec<Link>,
}

#[derive(Serialize)]
pub struct SuggestionsResponse {
    pub query: String,
    pub suggestions: Vec<String>,
}

pub async fn global(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<SearchResponse> {
    let snapshot = state.cache.get().await;
    let results = global_search(query.q.as_deref(), &snapshot.categories, &snapshot.links);
    Json(results.into())
}

fn parse_sort(raw: Option<&str>) -> ApiResult<SortOrder> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None | Some("source") => Ok(SortOrder::Source),
        Some("name") => Ok(SortOrder::Name),
        Some(other) => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_QUERY",
            format!("unsupported sort: {other}"),
        )),
    }
}

pub async fn advanced(
    State(state): State<AppState>,
    Query(query): Query<AdvancedQuery>,
) -> ApiResult<Json<AdvancedSearchResponse>> {
    let options = AdvancedOptions {
        category_id: query
            .category
            .map(|category| category.trim().to_string())
            .filter(|category| !category.is_empty()),
        sort: parse_sort(query.sort.as_deref())?,
    };
    let snapshot = state.cache.get().await;
    let results = advanced_search(
        query.q.as_deref(),
        &snapshot.categories,
        &snapshot.links,
        &options,
    );
    let links = results.links.clone();
    Ok(Json(AdvancedSearchResponse {
        grouped: results.into(),
        links,
    }))
}

pub async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionsQuery>,
) -> Json<SuggestionsResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .min(MAX_SUGGESTION_LIMIT);
    let text = query.q.unwrap_or_default();
    let snapshot = state.cache.get().await;
    Json(SuggestionsResponse {
        suggestions: suggest(&text, &snapshot.links, limit),
        query: text,
    })
}
