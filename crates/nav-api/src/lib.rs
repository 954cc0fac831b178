use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use nav_catalog::{CacheState, DataCache, NotionSettings, NotionSource, PropertyTables, SourceError};
use nav_core::notion::NotionError;
use nav_core::{config, http, logging, metrics, server};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod admin;
mod directory;
mod search;


pub const SERVICE_NAME: &str = "nav-api";

#[derive(Clone)]
pub struct AppState {
    cache: Arc<DataCache>,
    notion: Arc<NotionSource>,
    admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(cache: Arc<DataCache>, notion: Arc<NotionSource>) -> Self {
        Self {
            cache,
            notion,
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match &err {
            SourceError::NotConfigured(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "NOTION_NOT_CONFIGURED",
                err.to_string(),
            ),
            SourceError::Notion(NotionError::InvalidId(_)) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_QUERY", err.to_string())
            }
            SourceError::Notion(inner) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
                    .with_details(serde_json::json!({
                        "kind": inner.kind(),
                        "hint": inner.hint(),
                    }))
            }
            SourceError::Unavailable(_) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
                    .with_details(serde_json::json!({ "kind": err.kind() }))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(payload)).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    cache: CacheState,
}

/// Settings shared by the HTTP service and the offline CLI commands.
pub struct CatalogConfig {
    pub notion: NotionSettings,
    pub cache_ttl: Duration,
    pub properties_path: Option<PathBuf>,
}

pub struct ApiConfig {
    pub addr: SocketAddr,
    pub catalog: CatalogConfig,
    pub admin_token: Option<String>,
}

pub fn load_catalog_config() -> CatalogConfig {
    CatalogConfig {
        notion: NotionSettings::from_env(),
        cache_ttl: Duration::from_secs(config::u64_from_env(
            "CATALOG_CACHE_TTL_SECONDS",
            nav_catalog::DEFAULT_TTL.as_secs(),
        )),
        properties_path: config::path_from_env("CATALOG_PROPERTIES_PATH"),
    }
}

pub fn load_config() -> Result<ApiConfig> {
    let addr = config::socket_addr_from_env("NAV_API_ADDR", "0.0.0.0:8080")?;
    Ok(ApiConfig {
        addr,
        catalog: load_catalog_config(),
        admin_token: config::optional_env("NAV_ADMIN_TOKEN"),
    })
}

/// Wires the Notion source, property tables and cache described by `config`.
pub fn build_catalog(config: &CatalogConfig) -> Result<(Arc<DataCache>, Arc<NotionSource>)> {
    let tables = match &config.properties_path {
        Some(path) => PropertyTables::load(path)
            .with_context(|| format!("CATALOG_PROPERTIES_PATH={}", path.display()))?,
        None => PropertyTables::default(),
    };
    let notion = Arc::new(NotionSource::new(config.notion.clone()));
    if !notion.is_configured() {
        tracing::warn!("notion credentials missing; the fallback directory will be served");
    }
    let cache = DataCache::new(notion.clone())
        .with_ttl(config.cache_ttl)
        .with_tables(tables);
    Ok((Arc::new(cache), notion))
}

pub fn build_state(config: &ApiConfig) -> Result<AppState> {
    let (cache, notion) = build_catalog(&config.catalog)?;
    Ok(AppState::new(cache, notion).with_admin_token(config.admin_token.clone()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/v1/openapi.json", get(openapi_json))
        .route("/v1/directory", get(directory::directory))
        .route("/v1/categories", get(directory::list_categories))
        .route(
            "/v1/categories/:category_id/links",
            get(directory::category_links),
        )
        .route("/v1/links", get(directory::list_links))
        .route("/v1/links/:link_id", get(directory::get_link))
        .route("/v1/pages/:page_id", get(directory::page_content))
        .route("/v1/search", get(search::global))
        .route("/v1/search/advanced", get(search::advanced))
        .route("/v1/search/suggestions", get(search::suggestions))
        .route("/v1/admin/notion/connection", get(admin::connection))
        .route("/v1/admin/notion/database", get(admin::database))
        .route("/v1/admin/notion/records", get(admin::records))
        .route("/v1/admin/cache", get(admin::cache_status))
        .route("/v1/admin/cache/refresh", post(admin::refresh_cache))
        .route("/v1/admin/cache/invalidate", post(admin::invalidate_cache))
        .with_state(state)
}

pub async fn run(config: ApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    metrics::init(SERVICE_NAME);

    let state = build_state(&config)?;
    let router = http::apply_standard_layers(router(state), SERVICE_NAME);
    server::serve(config.addr, router, SERVICE_NAME).await
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        cache: state.cache.state().await,
    })
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::metrics_response(SERVICE_NAME)
}

async fn openapi_json() -> impl IntoResponse {
    Json(serde_json::json!({
        "openapi": "3.0.0",
        "info": { "title": SERVICE_NAME, "version": env!("CARGO_PKG_VERSION") },
        "paths": {
            "/healthz": { "get": { "summary": "Liveness and cache state" } },
            "/metrics": { "get": { "summary": "Prometheus metrics" } },
            "/v1/directory": { "get": { "summary": "Categories and links grouped by category" } },
            "/v1/categories": { "get": { "summary": "Categories with link counts" } },
            "/v1/categories/{category_id}/links": { "get": { "summary": "Links of one category" } },
            "/v1/links": { "get": { "summary": "Paged links" } },
            "/v1/links/{link_id}": { "get": { "summary": "One link" } },
            "/v1/pages/{page_id}": { "get": { "summary": "Notion page with its blocks" } },
            "/v1/search": { "get": { "summary": "Fuzzy search over categories and links" } },
            "/v1/search/advanced": { "get": { "summary": "Search with #tag tokens, category filter and sorting" } },
            "/v1/search/suggestions": { "get": { "summary": "Link name suggestions" } },
            "/v1/admin/notion/connection": { "get": { "summary": "Notion connection check" } },
            "/v1/admin/notion/database": { "get": { "summary": "Notion database schema" } },
            "/v1/admin/notion/records": { "get": { "summary": "Raw records with extraction issues" } },
            "/v1/admin/cache": { "get": { "summary": "Cache state" } },
            "/v1/admin/cache/refresh": { "post": { "summary": "Rebuild the snapshot now" } },
            "/v1/admin/cache/invalidate": { "post": { "summary": "Drop the snapshot" } }
        }
    }))
}
