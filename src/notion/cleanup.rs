//! One-off migration of a database written by the old single-source sync:
//! legacy `URL` / `Listing ID` / `Source` values are folded into the plural
//! columns, then the legacy columns are renamed out of the way.

use crate::notion::client::{NotionApi, Properties};
use crate::notion::properties::{
    self, multi_select_names, plain_text, select_name, truncate_rich, url_value,
};
use crate::pipeline::{canonical_url, url_key};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
    pub renamed_columns: Vec<String>,
}

/// A legacy column, under its original name or its renamed one
fn legacy<'p>(props: &'p Properties, name: &str) -> Option<&'p Value> {
    props
        .get(name)
        .or_else(|| props.get(format!("LEGACY {name}").as_str()))
}

fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Property changes that bring one page onto the consolidated columns.
/// Empty when the page is already clean.
pub fn plan_page_changes(props: &Properties) -> Properties {
    let mut changes = Properties::new();

    let current_ids = plain_text(props.get(properties::LISTING_IDS));
    let legacy_id = plain_text(legacy(props, properties::LEGACY_LISTING_ID));
    let mut ids = lines(&current_ids);
    if !legacy_id.is_empty() {
        push_unique(&mut ids, legacy_id);
    }
    let merged_ids = truncate_rich(&ids.join("\n"));
    if merged_ids.trim() != current_ids {
        changes.insert(properties::LISTING_IDS.into(), properties::rich_text(&merged_ids));
    }

    let legacy_url = url_value(legacy(props, properties::LEGACY_URL));
    let current_urls = plain_text(props.get(properties::SOURCE_URLS));
    let mut urls = Vec::new();
    for url in lines(&current_urls)
        .into_iter()
        .chain(Some(legacy_url.clone()).filter(|u| !u.is_empty()))
    {
        push_unique(&mut urls, canonical_url(&url).unwrap_or(url));
    }
    let merged_urls = truncate_rich(&urls.join("\n"));
    if merged_urls.trim() != current_urls {
        changes.insert(properties::SOURCE_URLS.into(), properties::rich_text(&merged_urls));
    }

    let current_primary = url_value(props.get(properties::PRIMARY_URL));
    let primary_source = if current_primary.is_empty() {
        &legacy_url
    } else {
        &current_primary
    };
    if let Some(primary) = canonical_url(primary_source) {
        if primary != current_primary {
            changes.insert(properties::PRIMARY_URL.into(), json!({ "url": primary }));
        }
        if let Some(key) = url_key(&primary) {
            if plain_text(props.get(properties::CANONICAL_KEY)) != key {
                changes.insert(properties::CANONICAL_KEY.into(), properties::rich_text(&key));
            }
        }
    }

    let mut sources: BTreeSet<String> = multi_select_names(props.get(properties::SOURCES))
        .into_iter()
        .collect();
    if let Some(old) = select_name(legacy(props, properties::LEGACY_SOURCE)) {
        if !old.is_empty() && sources.insert(old) {
            let names: Vec<Value> = sources.iter().map(|s| json!({ "name": s })).collect();
            changes.insert(properties::SOURCES.into(), json!({ "multi_select": names }));
        }
    }

    changes
}

/// Legacy columns to rename: present under the old name, new name still free
pub fn plan_column_renames(schema: &Properties) -> Properties {
    properties::LEGACY_RENAMES
        .iter()
        .filter(|(old, new)| schema.contains_key(*old) && !schema.contains_key(*new))
        .map(|(old, new)| (old.to_string(), json!({ "name": new })))
        .collect()
}

pub struct NotionCleanup<'a, A: NotionApi + ?Sized> {
    api: &'a A,
    database_id: &'a str,
    dry_run: bool,
}

impl<'a, A: NotionApi + ?Sized> NotionCleanup<'a, A> {
    pub fn new(api: &'a A, database_id: &'a str, dry_run: bool) -> Self {
        Self {
            api,
            database_id,
            dry_run,
        }
    }

    pub async fn run(&self) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let response = self
                .api
                .query_database(self.database_id, body)
                .await
                .with_context(|| format!("querying database {}", self.database_id))?;

            for page in &response.results {
                report.scanned += 1;
                let changes = plan_page_changes(&page.properties);
                if changes.is_empty() {
                    continue;
                }

                let columns = changes.keys().cloned().collect::<Vec<_>>().join(", ");
                if self.dry_run {
                    info!("Would update page {}: {}", page.id, columns);
                    report.updated += 1;
                    continue;
                }
                match self.api.update_page(&page.id, changes).await {
                    Ok(()) => {
                        debug!("Updated page {}: {}", page.id, columns);
                        report.updated += 1;
                    }
                    Err(err) => {
                        warn!("Updating page {} failed: {}", page.id, err);
                        report.failed += 1;
                    }
                }
            }

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        report.renamed_columns = self.rename_legacy_columns().await?;
        Ok(report)
    }

    /// Rename the legacy columns once their values have been migrated.
    pub async fn rename_legacy_columns(&self) -> Result<Vec<String>> {
        let database = self
            .api
            .retrieve_database(self.database_id)
            .await
            .with_context(|| format!("reading schema of database {}", self.database_id))?;

        let renames = plan_column_renames(&database.properties);
        let names: Vec<String> = renames.keys().cloned().collect();
        if renames.is_empty() {
            info!("No legacy column renames needed");
            return Ok(names);
        }
        if self.dry_run {
            info!("Would rename legacy columns: {}", names.join(", "));
            return Ok(names);
        }

        self.api
            .update_database(self.database_id, renames)
            .await
            .with_context(|| format!("renaming columns in database {}", self.database_id))?;
        info!("Renamed legacy columns: {}", names.join(", "));
        Ok(names)
    }
}
