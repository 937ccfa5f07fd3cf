use crate::config::Requirements;
use crate::models::Listing;
use crate::notion::client::{NotionApi, NotionError, Properties};
use crate::notion::properties;
use crate::snapshot::{PageRecord, Snapshot};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Archive pages whose listing is gone upstream
    pub archive_removed: bool,
    /// Written to the Last Seen column
    pub seen_on: NaiveDate,
    /// Keys absent from this run's listings that may still be upstream
    /// (search page failed, cut by the item cap). Never archived.
    pub still_listed: HashSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub archived: usize,
    pub failed: usize,
    pub schema_properties_added: usize,
}

impl SyncReport {
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.archived
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub report: SyncReport,
    /// Page map for the next snapshot
    pub pages: BTreeMap<String, PageRecord>,
}

/// Upserts gated listings into one Notion database
pub struct NotionSync<'a, A: NotionApi + ?Sized> {
    api: &'a A,
    database_id: &'a str,
    requirements: &'a Requirements,
}

impl<'a, A: NotionApi + ?Sized> NotionSync<'a, A> {
    pub fn new(api: &'a A, database_id: &'a str, requirements: &'a Requirements) -> Self {
        Self {
            api,
            database_id,
            requirements,
        }
    }

    /// Add missing managed columns. Returns the title column name and how
    /// many columns were added.
    pub async fn ensure_schema(&self) -> Result<(String, usize)> {
        let database = self
            .api
            .retrieve_database(self.database_id)
            .await
            .with_context(|| format!("reading schema of database {}", self.database_id))?;

        let title = properties::title_property_or_default(database.title_property());
        let missing = properties::missing_properties(&database.properties);
        if missing.is_empty() {
            debug!("Notion schema already has every managed column");
            return Ok((title, 0));
        }

        let added = missing.len();
        info!(
            "Adding {} column(s) to Notion database: {}",
            added,
            missing.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        self.api
            .update_database(self.database_id, missing)
            .await
            .with_context(|| format!("adding columns to database {}", self.database_id))?;
        Ok((title, added))
    }

    /// First live page whose Canonical Key equals `key`
    pub async fn find_by_canonical_key(&self, key: &str) -> Result<Option<String>, NotionError> {
        let response = self
            .api
            .query_database(
                self.database_id,
                json!({
                    "filter": {
                        "property": properties::CANONICAL_KEY,
                        "rich_text": { "equals": key }
                    },
                    "page_size": 1
                }),
            )
            .await?;
        Ok(response
            .results
            .into_iter()
            .find(|page| !page.archived)
            .map(|page| page.id))
    }

    /// Returns the page id and whether the page was newly created.
    async fn upsert(
        &self,
        listing: &Listing,
        props: Properties,
        known: Option<&PageRecord>,
    ) -> Result<(String, bool), NotionError> {
        if let Some(record) = known {
            match self.api.update_page(&record.page_id, props.clone()).await {
                Ok(()) => return Ok((record.page_id.clone(), false)),
                Err(err) if err.is_not_found() => {
                    debug!(
                        "Page {} for {} is gone, looking it up again",
                        record.page_id, listing.identity_key
                    );
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(page_id) = self.find_by_canonical_key(&listing.identity_key).await? {
            self.api.update_page(&page_id, props).await?;
            return Ok((page_id, false));
        }

        let page = self.api.create_page(self.database_id, props).await?;
        Ok((page.id, true))
    }

    /// Sync `listings` against the page map of the previous run.
    ///
    /// Only a schema failure is returned as an error. Failures on individual
    /// listings are logged and counted, and the previous page record is
    /// carried over so the next run tries again.
    pub async fn run(
        &self,
        listings: &[Listing],
        previous: &Snapshot,
        opts: &SyncOptions,
    ) -> Result<SyncOutcome> {
        let (title_property, added) = self.ensure_schema().await?;
        let mut outcome = SyncOutcome {
            report: SyncReport {
                schema_properties_added: added,
                ..SyncReport::default()
            },
            pages: BTreeMap::new(),
        };

        for listing in listings {
            let key = &listing.identity_key;
            let props = properties::listing_properties(
                listing,
                &title_property,
                self.requirements,
                opts.seen_on,
            );
            let fingerprint = properties::page_fingerprint(&props);
            let known = previous.pages.get(key);

            if let Some(record) = known.filter(|r| r.fingerprint == fingerprint) {
                outcome.report.unchanged += 1;
                outcome.pages.insert(key.clone(), record.clone());
                continue;
            }

            match self.upsert(listing, props, known).await {
                Ok((page_id, created)) => {
                    if created {
                        debug!("Created page {} for {}", page_id, key);
                        outcome.report.created += 1;
                    } else {
                        debug!("Updated page {} for {}", page_id, key);
                        outcome.report.updated += 1;
                    }
                    outcome.pages.insert(
                        key.clone(),
                        PageRecord {
                            page_id,
                            fingerprint,
                        },
                    );
                }
                Err(err) => {
                    warn!("Notion upsert failed for {}: {}", key, err);
                    outcome.report.failed += 1;
                    if let Some(record) = known {
                        outcome.pages.insert(key.clone(), record.clone());
                    }
                }
            }
        }

        let current: HashSet<&str> = listings.iter().map(|l| l.identity_key.as_str()).collect();
        for (key, record) in &previous.pages {
            if current.contains(key.as_str()) {
                continue;
            }
            if !opts.archive_removed || opts.still_listed.contains(key) {
                outcome.pages.insert(key.clone(), record.clone());
                continue;
            }

            match self.api.archive_page(&record.page_id).await {
                Ok(()) => {
                    debug!("Archived page {} for {}", record.page_id, key);
                    outcome.report.archived += 1;
                }
                Err(err) if err.is_not_found() => {
                    debug!("Page {} for {} already gone", record.page_id, key);
                }
                Err(err) => {
                    warn!("Archiving page {} for {} failed: {}", record.page_id, key, err);
                    outcome.report.failed += 1;
                    outcome.pages.insert(key.clone(), record.clone());
                }
            }
        }

        Ok(outcome)
    }
}
