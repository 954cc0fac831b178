use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("notion configuration missing: {0}")]
    MissingConfig(&'static str),

    #[error("invalid notion api url: {0}")]
    InvalidUrl(String),

    #[error("not a notion object id: {0:?}")]
    InvalidId(String),

    #[error("notion authentication failed ({code}): {message}")]
    Auth { code: String, message: String },

    #[error("notion responded {status} ({code}): {message}")]
    Response {
        status: u16,
        code: String,
        message: String,
    },

    #[error("notion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed notion payload: {0}")]
    Malformed(String),
}

impl NotionError {
    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            NotionError::MissingConfig(_) | NotionError::InvalidUrl(_) => "config",
            NotionError::InvalidId(_) => "invalid_id",
            NotionError::Auth { .. } => "auth",
            NotionError::Response { .. } => "response",
            NotionError::Transport(_) => "transport",
            NotionError::Malformed(_) => "malformed",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            NotionError::MissingConfig(_) => "set NOTION_TOKEN and NOTION_DATABASE_ID",
            NotionError::InvalidUrl(_) => "NOTION_API_URL must be an absolute http(s) url",
            NotionError::InvalidId(_) => "pass a 32 character hex id, with or without dashes",
            NotionError::Auth { .. } => "check that NOTION_TOKEN is a valid integration token",
            NotionError::Response { .. } => {
                "check the database id and that the integration is shared with the database"
            }
            NotionError::Transport(_) => "check network access to the Notion API",
            NotionError::Malformed(_) => "the Notion API returned an unexpected payload",
        }
    }
}

pub type NotionResult<T> = Result<T, NotionError>;

/// Notion object ids are 32 hex digits, optionally grouped 8-4-4-4-12 with dashes.
pub fn is_notion_id(id: &str) -> bool {
    let hex = |part: &str| part.bytes().all(|byte| byte.is_ascii_hexdigit());
    if id.len() == 32 {
        return hex(id);
    }
    let groups: Vec<&str> = id.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && hex(group))
}

fn ensure_notion_id(id: &str) -> NotionResult<()> {
    if is_notion_id(id) {
        Ok(())
    } else {
        Err(NotionError::InvalidId(id.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl QueryPage {
    /// Cursor for the following page; a `has_more` page without a cursor is malformed.
    pub fn continuation(&self) -> NotionResult<Option<&str>> {
        if !self.has_more {
            return Ok(None);
        }
        match self.next_cursor.as_deref() {
            Some(cursor) if !cursor.is_empty() => Ok(Some(cursor)),
            _ => Err(NotionError::Malformed(
                "has_more is set but next_cursor is missing".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub property_names: Vec<String>,
    pub properties: Value,
    pub created_time: Option<String>,
    pub last_edited_time: Option<String>,
}

impl DatabaseInfo {
    pub fn from_value(value: &Value) -> NotionResult<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| NotionError::Malformed("database object without id".into()))?
            .to_string();
        let title = join_plain_text(value.get("title")).unwrap_or_else(|| "Untitled".to_string());
        let description = join_plain_text(value.get("description"));
        let properties = value.get("properties").cloned().unwrap_or(Value::Null);
        let property_names = properties
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        let timestamp = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            id,
            title,
            description,
            property_names,
            created_time: timestamp("created_time"),
            last_edited_time: timestamp("last_edited_time"),
            properties,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageContent {
    pub page: Value,
    pub blocks: Vec<Value>,
}

#[derive(Clone)]
pub struct NotionClient {
    base_url: Url,
    token: String,
    http: reqwest::Client,
}

impl NotionClient {
    pub fn new(token: String, base_url: &str, timeout: Duration) -> NotionResult<Self> {
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(NotionError::MissingConfig("NOTION_TOKEN"));
        }
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(NotionError::MissingConfig("NOTION_API_URL"));
        }
        let base_url = Url::parse(trimmed.trim_end_matches('/'))
            .map_err(|err| NotionError::InvalidUrl(format!("{trimmed}: {err}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(NotionError::InvalidUrl(trimmed.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    /// Appends each segment to the base url, percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> NotionResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| NotionError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn query_database(
        &self,
        database_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
    ) -> NotionResult<QueryPage> {
        let mut body = json!({ "page_size": page_size.clamp(1, MAX_PAGE_SIZE) });
        if let Some(cursor) = start_cursor {
            body["start_cursor"] = Value::String(cursor.to_string());
        }
        let resp = self
            .request(Method::POST, &["databases", database_id, "query"])?
            .json(&body)
            .send()
            .await?;
        let value = read_json(resp).await?;
        serde_json::from_value(value).map_err(|err| NotionError::Malformed(err.to_string()))
    }

    /// Walks every page of a database query, pausing `page_delay` between requests
    /// to stay under the Notion rate limit.
    pub async fn query_all(&self, database_id: &str, page_delay: Duration) -> NotionResult<Vec<Value>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .query_database(database_id, cursor.as_deref(), MAX_PAGE_SIZE)
                .await?;
            tracing::debug!(
                database_id,
                cursor = cursor.as_deref().unwrap_or("-"),
                received = page.results.len(),
                "notion page fetched"
            );
            let next = page.continuation()?.map(str::to_string);
            records.extend(page.results);
            match next {
                Some(next) => {
                    cursor = Some(next);
                    if !page_delay.is_zero() {
                        tokio::time::sleep(page_delay).await;
                    }
                }
                None => break,
            }
        }
        tracing::info!(database_id, records = records.len(), "notion database query complete");
        Ok(records)
    }

    pub async fn retrieve_database(&self, database_id: &str) -> NotionResult<DatabaseInfo> {
        let resp = self
            .request(Method::GET, &["databases", database_id])?
            .send()
            .await?;
        let value = read_json(resp).await?;
        DatabaseInfo::from_value(&value)
    }

    pub async fn retrieve_page(&self, page_id: &str) -> NotionResult<Value> {
        ensure_notion_id(page_id)?;
        let resp = self
            .request(Method::GET, &["pages", page_id])?
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn list_block_children(&self, block_id: &str) -> NotionResult<Vec<Value>> {
        ensure_notion_id(block_id)?;
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("page_size", MAX_PAGE_SIZE.to_string())];
            if let Some(cursor) = &cursor {
                query.push(("start_cursor", cursor.clone()));
            }
            let resp = self
                .request(Method::GET, &["blocks", block_id, "children"])?
                .query(&query)
                .send()
                .await?;
            let value = read_json(resp).await?;
            let page: QueryPage =
                serde_json::from_value(value).map_err(|err| NotionError::Malformed(err.to_string()))?;
            let next = page.continuation()?.map(str::to_string);
            blocks.extend(page.results);
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(blocks)
    }

    pub async fn page_content(&self, page_id: &str) -> NotionResult<PageContent> {
        ensure_notion_id(page_id)?;
        let page = self.retrieve_page(page_id).await?;
        let blocks = self.list_block_children(page_id).await?;
        Ok(PageContent { page, blocks })
    }

    fn request(&self, method: Method, segments: &[&str]) -> NotionResult<reqwest::RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn read_json(resp: reqwest::Response) -> NotionResult<Value> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(classify_error(status, &body));
    }
    serde_json::from_str(&body).map_err(|err| NotionError::Malformed(err.to_string()))
}

/// Maps a failed Notion response onto an auth or response error, keeping Notion's error code.
pub fn classify_error(status: StatusCode, body: &str) -> NotionError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|body| body.code.clone())
        .unwrap_or_else(|| status.as_str().to_string());
    let message = parsed
        .and_then(|body| body.message)
        .unwrap_or_else(|| body.trim().to_string());

    if status == StatusCode::UNAUTHORIZED || code == "unauthorized" {
        NotionError::Auth { code, message }
    } else {
        NotionError::Response {
            status: status.as_u16(),
            code,
            message,
        }
    }
}

fn join_plain_text(value: Option<&Value>) -> Option<String> {
    let runs = value?.as_array()?;
    let text: String = runs
        .iter()
        .filter_map(|run| run.get("plain_text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_blank_token() {
        let err = NotionClient::new("  ".into(), DEFAULT_NOTION_API_URL, Duration::from_secs(1))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn new_rejects_relative_api_url() {
        let err = NotionClient::new("secret".into(), "api.notion.com/v1", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, NotionError::InvalidUrl(_)));
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn endpoint_keeps_each_id_in_one_segment() {
        let client = NotionClient::new(
            "secret".into(),
            "http://localhost:9000/v1/",
            Duration::from_secs(1),
        )
        .unwrap();

        let url = client.endpoint(&["databases", "db-1", "query"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/v1/databases/db-1/query");

        let url = client.endpoint(&["pages", "../users?x=#frag"]).unwrap();
        assert_eq!(url.path_segments().unwrap().count(), 3);
        assert!(url.path().starts_with("/v1/pages/"));
        assert!(!url.path().contains("/users"));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn notion_ids_accept_plain_and_dashed_forms() {
        assert!(is_notion_id("0f3e1c2b9a8d4e7f8a6b5c4d3e2f1a0b"));
        assert!(is_notion_id("0f3e1c2b-9a8d-4e7f-8a6b-5c4d3e2f1a0b"));
        assert!(is_notion_id("0F3E1C2B9A8D4E7F8A6B5C4D3E2F1A0B"));

        assert!(!is_notion_id(""));
        assert!(!is_notion_id("p1"));
        assert!(!is_notion_id("../users"));
        assert!(!is_notion_id("0f3e1c2b9a8d4e7f8a6b5c4d3e2f1a0g"));
        assert!(!is_notion_id("0f3e1c2b-9a8d4e7f-8a6b-5c4d-3e2f1a0b"));
        assert!(!is_notion_id("0f3e1c2b-9a8d-4e7f-8a6b-5c4d3e2f1a0b?x="));
    }

    #[tokio::test]
    async fn page_requests_reject_non_notion_ids() {
        let client = NotionClient::new(
            "secret".into(),
            "http://127.0.0.1:9/v1",
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.page_content("../users?x=").await.unwrap_err();
        assert!(matches!(err, NotionError::InvalidId(ref id) if id == "../users?x="));
        assert_eq!(err.kind(), "invalid_id");
        assert!(client.list_block_children("..").await.is_err());
    }

    #[test]
    fn classify_error_distinguishes_auth_from_response() {
        let auth = classify_error(
            StatusCode::UNAUTHORIZED,
            r#"{"object":"error","status":401,"code":"unauthorized","message":"API token is invalid."}"#,
        );
        assert_eq!(auth.kind(), "auth");

        let missing = classify_error(
            StatusCode::NOT_FOUND,
            r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find database"}"#,
        );
        match missing {
            NotionError::Response { status, code, .. } => {
                assert_eq!(status, 404);
                assert_eq!(code, "object_not_found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn classify_error_tolerates_non_json_body() {
        let err = classify_error(StatusCode::BAD_GATEWAY, "upstream down");
        match err {
            NotionError::Response { code, message, .. } => {
                assert_eq!(code, "502");
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn query_page_continuation_requires_cursor() {
        let done = QueryPage::default();
        assert_eq!(done.continuation().unwrap(), None);

        let more = QueryPage {
            results: Vec::new(),
            next_cursor: Some("abc".into()),
            has_more: true,
        };
        assert_eq!(more.continuation().unwrap(), Some("abc"));

        let broken = QueryPage {
            results: Vec::new(),
            next_cursor: None,
            has_more: true,
        };
        assert_eq!(broken.continuation().unwrap_err().kind(), "malformed");
    }

    #[test]
    fn database_info_reads_title_and_properties() {
        let value = json!({
            "id": "db-1",
            "title": [{ "plain_text": "Nav " }, { "plain_text": "Links" }],
            "description": [],
            "properties": { "Name": { "type": "title" }, "URL": { "type": "url" } },
            "created_time": "2024-01-01T00:00:00.000Z"
        });
        let info = DatabaseInfo::from_value(&value).unwrap();
        assert_eq!(info.title, "Nav Links");
        assert_eq!(info.description, None);
        assert_eq!(info.property_names.len(), 2);
        assert_eq!(info.created_time.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(info.last_edited_time, None);
    }

    #[test]
    fn database_info_requires_id() {
        let err = DatabaseInfo::from_value(&json!({ "title": [] })).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }
}
