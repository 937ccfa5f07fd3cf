#![allow(dead_code)]

use async_trait::async_trait;
use bay_housing_sync::models::{Availability, Listing, PropertyType, Source};
use bay_housing_sync::notion::properties::{self, plain_text};
use bay_housing_sync::notion::{Database, NotionApi, NotionError, Page, Properties, QueryResponse};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory stand-in for a Notion database
pub struct FakeNotion {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    schema: Properties,
    pages: Vec<Page>,
    next_id: usize,
    writes: usize,
    failing_keys: HashSet<String>,
    schema_unavailable: bool,
}

fn status(code: StatusCode) -> NotionError {
    NotionError::Status {
        status: code,
        body: "fake".into(),
    }
}

impl FakeNotion {
    pub fn new() -> Self {
        let mut schema = Properties::new();
        schema.insert("Name".into(), json!({ "type": "title" }));
        Self {
            state: Mutex::new(State {
                schema,
                ..State::default()
            }),
        }
    }

    /// Database with extra columns and pre-existing pages
    pub fn with_pages(columns: &[(&str, &str)], pages: Vec<Properties>) -> Self {
        let fake = Self::new();
        {
            let mut state = fake.state.lock().unwrap();
            for (name, kind) in columns {
                state.schema.insert(name.to_string(), json!({ "type": kind }));
            }
            for properties in pages {
                state.next_id += 1;
                let id = format!("page-{}", state.next_id);
                state.pages.push(Page {
                    id,
                    properties,
                    archived: false,
                });
            }
        }
        fake
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn reset_writes(&self) {
        self.state.lock().unwrap().writes = 0;
    }

    pub fn fail_writes_for(&self, key: &str) {
        self.state.lock().unwrap().failing_keys.insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failing_keys.clear();
    }

    pub fn make_schema_unavailable(&self) {
        self.state.lock().unwrap().schema_unavailable = true;
    }

    pub fn pages(&self) -> Vec<Page> {
        self.state.lock().unwrap().pages.clone()
    }

    pub fn live_pages(&self) -> Vec<Page> {
        self.pages().into_iter().filter(|p| !p.archived).collect()
    }

    pub fn schema(&self) -> Properties {
        self.state.lock().unwrap().schema.clone()
    }

    pub fn page_by_key(&self, key: &str) -> Option<Page> {
        self.live_pages()
            .into_iter()
            .find(|p| plain_text(p.properties.get(properties::CANONICAL_KEY)) == key)
    }
}

impl State {
    fn rejects(&self, props: &Properties) -> bool {
        let key = plain_text(props.get(properties::CANONICAL_KEY));
        self.failing_keys.contains(&key)
    }
}

#[async_trait]
impl NotionApi for FakeNotion {
    async fn retrieve_database(&self, database_id: &str) -> Result<Database, NotionError> {
        let state = self.state.lock().unwrap();
        if state.schema_unavailable {
            return Err(status(StatusCode::UNAUTHORIZED));
        }
        Ok(Database {
            id: database_id.to_string(),
            properties: state.schema.clone(),
        })
    }

    async fn update_database(&self, _database_id: &str, patch: Properties) -> Result<(), NotionError> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        for (name, change) in patch {
            if let Some(new_name) = change.get("name").and_then(Value::as_str) {
                let new_name = new_name.to_string();
                if let Some(schema) = state.schema.remove(&name) {
                    state.schema.insert(new_name.clone(), schema);
                }
                for page in &mut state.pages {
                    if let Some(value) = page.properties.remove(&name) {
                        page.properties.insert(new_name.clone(), value);
                    }
                }
            } else {
                let kind = change
                    .as_object()
                    .and_then(|o| o.keys().next().cloned())
                    .unwrap_or_default();
                state.schema.insert(name, json!({ "type": kind }));
            }
        }
        Ok(())
    }

    async fn query_database(&self, _database_id: &str, body: Value) -> Result<QueryResponse, NotionError> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Page> = state.pages.iter().filter(|p| !p.archived).cloned().collect();

        if let Some(filter) = body.get("filter") {
            let property = filter["property"].as_str().unwrap_or_default();
            let wanted = filter["rich_text"]["equals"].as_str().unwrap_or_default();
            matching.retain(|p| plain_text(p.properties.get(property)) == wanted);
        }

        let start: usize = body
            .get("start_cursor")
            .and_then(Value::as_str)
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let size = body.get("page_size").and_then(Value::as_u64).unwrap_or(100) as usize;
        let end = (start + size).min(matching.len());
        let has_more = end < matching.len();

        Ok(QueryResponse {
            results: matching[start.min(end)..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn create_page(&self, _database_id: &str, properties: Properties) -> Result<Page, NotionError> {
        let mut state = self.state.lock().unwrap();
        if state.rejects(&properties) {
            return Err(status(StatusCode::INTERNAL_SERVER_ERROR));
        }
        state.writes += 1;
        state.next_id += 1;
        let page = Page {
            id: format!("page-{}", state.next_id),
            properties,
            archived: false,
        };
        state.pages.push(page.clone());
        Ok(page)
    }

    async fn update_page(&self, page_id: &str, properties: Properties) -> Result<(), NotionError> {
        let mut state = self.state.lock().unwrap();
        if state.rejects(&properties) {
            return Err(status(StatusCode::INTERNAL_SERVER_ERROR));
        }
        let Some(page) = state.pages.iter_mut().find(|p| p.id == page_id && !p.archived) else {
            return Err(status(StatusCode::NOT_FOUND));
        };
        for (name, value) in properties {
            page.properties.insert(name, value);
        }
        state.writes += 1;
        Ok(())
    }

    async fn archive_page(&self, page_id: &str) -> Result<(), NotionError> {
        let mut state = self.state.lock().unwrap();
        let Some(page) = state.pages.iter_mut().find(|p| p.id == page_id) else {
            return Err(status(StatusCode::NOT_FOUND));
        };
        page.archived = true;
        state.writes += 1;
        Ok(())
    }
}

pub fn fetched_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-07-10T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// A listing that passes the default quality gate
pub fn listing(url: &str, price: f64) -> Listing {
    Listing {
        identity_key: format!("url:{url}"),
        source: Source::Redfin,
        url: url.to_string(),
        search_url: "https://www.redfin.com/city/14972/CA/Los-Gatos/apartments-for-rent".to_string(),
        listing_id: url.to_string(),
        property_name: String::new(),
        address: "120 Oak Ridge Rd Los Gatos CA 95030".to_string(),
        city: "Los Gatos".to_string(),
        property_type: PropertyType::House,
        price: Some(price),
        beds: Some(3.0),
        baths: Some(2.0),
        posted_at: None,
        dog_friendly: Availability::Yes,
        parking: Availability::Maybe,
        nature_score: 5.0,
        commute_score: 3.0,
        match_score: 18.0,
        flags: Vec::new(),
        fetched_at: fetched_at(),
    }
}
