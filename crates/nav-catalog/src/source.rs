use async_trait::async_trait;
use nav_core::config;
use nav_core::notion::{
    DatabaseInfo, NotionClient, NotionError, PageContent, DEFAULT_NOTION_API_URL, MAX_PAGE_SIZE,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 300;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Notion(#[from] NotionError),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::NotConfigured(_) => "config",
            SourceError::Notion(err) => err.kind(),
            SourceError::Unavailable(_) => "unavailable",
        }
    }
}

/// Upstream that produces raw directory records.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<Value>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct NotionSettings {
    pub token: Option<String>,
    pub database_id: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
    pub page_delay: Duration,
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            api_url: DEFAULT_NOTION_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }
}

impl NotionSettings {
    /// Missing credentials are allowed here; they surface later as a
    /// configuration error that the cache turns into the fallback directory.
    pub fn from_env() -> Self {
        Self {
            token: config::optional_env("NOTION_TOKEN"),
            database_id: config::optional_env("NOTION_DATABASE_ID"),
            api_url: config::optional_env("NOTION_API_URL")
                .unwrap_or_else(|| DEFAULT_NOTION_API_URL.to_string()),
            timeout: Duration::from_secs(config::u64_from_env(
                "NOTION_TIMEOUT_SECONDS",
                DEFAULT_TIMEOUT_SECONDS,
            )),
            page_delay: Duration::from_millis(config::u64_from_env(
                "NOTION_PAGE_DELAY_MS",
                DEFAULT_PAGE_DELAY_MS,
            )),
        }
    }
}

#[derive(Clone)]
pub struct NotionSource {
    client: Option<NotionClient>,
    database_id: Option<String>,
    page_delay: Duration,
}

impl NotionSource {
    pub fn new(settings: NotionSettings) -> Self {
        let client = settings.token.and_then(|token| {
            NotionClient::new(token, &settings.api_url, settings.timeout)
                .map_err(|err| {
                    tracing::warn!(error = %err, kind = err.kind(), "notion client unavailable");
                })
                .ok()
        });
        Self {
            client,
            database_id: settings.database_id,
            page_delay: settings.page_delay,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some() && self.database_id.is_some()
    }

    fn client(&self) -> Result<&NotionClient, SourceError> {
        self.client
            .as_ref()
            .ok_or(SourceError::NotConfigured("NOTION_TOKEN"))
    }

    fn database_id(&self) -> Result<&str, SourceError> {
        self.database_id
            .as_deref()
            .ok_or(SourceError::NotConfigured("NOTION_DATABASE_ID"))
    }

    fn observe(err: NotionError) -> SourceError {
        nav_core::metrics::inc_notion_error(err.kind());
        tracing::warn!(kind = err.kind(), hint = err.hint(), error = %err, "notion request failed");
        SourceError::Notion(err)
    }

    pub async fn database_info(&self) -> Result<DatabaseInfo, SourceError> {
        let client = self.client()?;
        let database_id = self.database_id()?;
        client
            .retrieve_database(database_id)
            .await
            .map_err(Self::observe)
    }

    /// Cheapest possible authenticated round trip against the database.
    pub async fn check_connection(&self) -> Result<(), SourceError> {
        let client = self.client()?;
        let database_id = self.database_id()?;
        client
            .query_database(database_id, None, 1)
            .await
            .map_err(Self::observe)?;
        tracing::info!(database_id, "notion connection ok");
        Ok(())
    }

    /// First page of untouched database records.
    pub async fn raw_records(&self, limit: u32) -> Result<Vec<Value>, SourceError> {
        let client = self.client()?;
        let database_id = self.database_id()?;
        let page = client
            .query_database(database_id, None, limit.clamp(1, MAX_PAGE_SIZE))
            .await
            .map_err(Self::observe)?;
        Ok(page.results)
    }

    pub async fn page_content(&self, page_id: &str) -> Result<PageContent, SourceError> {
        self.client()?
            .page_content(page_id)
            .await
            .map_err(Self::observe)
    }
}

#[async_trait]
impl CatalogSource for NotionSource {
    async fn fetch_records(&self) -> Result<Vec<Value>, SourceError> {
        let client = self.client()?;
        let database_id = self.database_id()?;

        let info = client
            .retrieve_database(database_id)
            .await
            .map_err(Self::observe)?;
        tracing::info!(
            database_id,
            title = %info.title,
            properties = ?info.property_names,
            "notion database validated"
        );

        client
            .query_all(database_id, self.page_delay)
            .await
            .map_err(Self::observe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_a_config_error() {
        let source = NotionSource::new(NotionSettings {
            database_id: Some("db".to_string()),
            ..NotionSettings::default()
        });
        assert!(!source.is_configured());
        let err = source.fetch_records().await.unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(matches!(err, SourceError::NotConfigured("NOTION_TOKEN")));
    }

    #[tokio::test]
    async fn missing_database_id_is_a_config_error() {
        let source = NotionSource::new(NotionSettings {
            token: Some("secret".to_string()),
            ..NotionSettings::default()
        });
        assert!(!source.is_configured());
        let err = source.check_connection().await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured("NOTION_DATABASE_ID")));
    }

    #[test]
    fn source_error_kind_follows_notion_error() {
        let err = SourceError::from(NotionError::Malformed("bad".into()));
        assert_eq!(err.kind(), "malformed");
        assert_eq!(SourceError::Unavailable("down".into()).kind(), "unavailable");
    }
}
