use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const NOTION_API_VERSION: &str = "2022-06-28";
pub const NOTION_BASE_URL: &str = "https://api.notion.com";

const MAX_ERROR_BODY: usize = 500;

/// Property name -> property value (or schema) as Notion's JSON
pub type Properties = Map<String, Value>;

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("Notion returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected Notion response: {0}")]
    Decode(String),
}

impl NotionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NotionError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Database {
    /// Name of the database's title column
    pub fn title_property(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|(_, schema)| schema.get("type").and_then(Value::as_str) == Some("title"))
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// The handful of Notion endpoints the sync and cleanup passes use
#[async_trait]
pub trait NotionApi: Send + Sync {
    async fn retrieve_database(&self, database_id: &str) -> Result<Database, NotionError>;

    /// Add or rename columns. `properties` maps column name to schema patch.
    async fn update_database(&self, database_id: &str, properties: Properties) -> Result<(), NotionError>;

    async fn query_database(&self, database_id: &str, body: Value) -> Result<QueryResponse, NotionError>;

    async fn create_page(&self, database_id: &str, properties: Properties) -> Result<Page, NotionError>;

    async fn update_page(&self, page_id: &str, properties: Properties) -> Result<(), NotionError>;

    async fn archive_page(&self, page_id: &str) -> Result<(), NotionError>;
}

/// reqwest-backed Notion client
pub struct NotionClient {
    client: Client,
    base_url: String,
}

impl NotionClient {
    pub fn new(token: &str) -> anyhow::Result<Self> {
        Self::with_base_url(token, NOTION_BASE_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("NOTION_API_TOKEN is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .context("Failed to create Notion HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, NotionError> {
        debug!("Notion {} {}", method, path);
        let mut request = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotionError::Status {
                status,
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NotionError::Decode(e.to_string()))
    }
}

#[async_trait]
impl NotionApi for NotionClient {
    async fn retrieve_database(&self, database_id: &str) -> Result<Database, NotionError> {
        self.send(Method::GET, &format!("/v1/databases/{database_id}"), None)
            .await
    }

    async fn update_database(&self, database_id: &str, properties: Properties) -> Result<(), NotionError> {
        let _: Value = self
            .send(
                Method::PATCH,
                &format!("/v1/databases/{database_id}"),
                Some(json!({ "properties": properties })),
            )
            .await?;
        Ok(())
    }

    async fn query_database(&self, database_id: &str, body: Value) -> Result<QueryResponse, NotionError> {
        self.send(
            Method::POST,
            &format!("/v1/databases/{database_id}/query"),
            Some(body),
        )
        .await
    }

    async fn create_page(&self, database_id: &str, properties: Properties) -> Result<Page, NotionError> {
        self.send(
            Method::POST,
            "/v1/pages",
            Some(json!({
                "parent": { "database_id": database_id },
                "properties": properties,
            })),
        )
        .await
    }

    async fn update_page(&self, page_id: &str, properties: Properties) -> Result<(), NotionError> {
        let _: Value = self
            .send(
                Method::PATCH,
                &format!("/v1/pages/{page_id}"),
                Some(json!({ "properties": properties })),
            )
            .await?;
        Ok(())
    }

    async fn archive_page(&self, page_id: &str) -> Result<(), NotionError> {
        let _: Value = self
            .send(
                Method::PATCH,
                &format!("/v1/pages/{page_id}"),
                Some(json!({ "archived": true })),
            )
            .await?;
        Ok(())
    }
}
