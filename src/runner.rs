//! One batch run: fetch, process, diff, sync, save.

use crate::config::SearchProfile;
use crate::models::RawListing;
use crate::notion::{NotionApi, NotionSync, SyncOptions, SyncReport};
use crate::pipeline;
use crate::scrapers::{FetchDiagnostic, ListingSource};
use crate::snapshot::{Snapshot, SnapshotDiff, SnapshotStore};
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// 0 keeps every listing
    pub max_items: usize,
    pub archive_removed: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_items: 150,
            archive_removed: false,
        }
    }
}

/// Where to sync to. Absent with `--no-notion`.
#[derive(Clone, Copy)]
pub struct NotionTarget<'a> {
    pub api: &'a dyn NotionApi,
    pub database_id: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub count_raw: usize,
    pub count_unidentified: usize,
    pub count_deduped: usize,
    pub count_quality_pass: usize,
    pub count_quality_fail: usize,
    pub fetch_errors: usize,
    pub diff: SnapshotDiff,
    pub sync: Option<SyncReport>,
}

/// Fetch every search page of every source. A failed page is recorded in the
/// diagnostics and skipped.
pub async fn collect(sources: &[Box<dyn ListingSource>]) -> (Vec<RawListing>, Vec<FetchDiagnostic>) {
    let mut raws = Vec::new();
    let mut diagnostics = Vec::new();

    for source in sources {
        for url in source.search_urls() {
            info!("🔎 Fetching {} search page {}", source.source(), url);
            match source.fetch_page(url).await {
                Ok(found) => {
                    info!("   found {} candidate(s)", found.len());
                    diagnostics.push(FetchDiagnostic::found(source.source(), url, found.len()));
                    raws.extend(found);
                }
                Err(err) => {
                    warn!("Fetching {} failed: {:#}", url, err);
                    diagnostics.push(FetchDiagnostic::failed(source.source(), url, &err));
                }
            }
        }
    }

    (raws, diagnostics)
}

/// Keys missing from this run that may still be listed upstream: cut by the
/// item cap, or last seen on a search page that failed this run. Page records
/// with no previous listing have no known search page, so they are kept
/// whenever any page failed.
fn still_listed(
    previous: &Snapshot,
    capped: &[String],
    diagnostics: &[FetchDiagnostic],
) -> HashSet<String> {
    let failed: Vec<&FetchDiagnostic> = diagnostics.iter().filter(|d| d.is_error()).collect();
    let mut keys: HashSet<String> = capped.iter().cloned().collect();
    if failed.is_empty() {
        return keys;
    }

    for listing in &previous.listings {
        let unreachable = if listing.search_url.is_empty() {
            failed.iter().any(|d| d.source == listing.source)
        } else {
            failed.iter().any(|d| d.url == listing.search_url)
        };
        if unreachable {
            keys.insert(listing.identity_key.clone());
        }
    }

    let listed: HashSet<&str> = previous
        .listings
        .iter()
        .map(|l| l.identity_key.as_str())
        .collect();
    keys.extend(
        previous
            .pages
            .keys()
            .filter(|key| !listed.contains(key.as_str()))
            .cloned(),
    );
    keys
}

pub async fn run(
    sources: &[Box<dyn ListingSource>],
    profile: &SearchProfile,
    store: &SnapshotStore,
    notion: Option<NotionTarget<'_>>,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let previous = store.load().await?;
    let (raws, diagnostics) = collect(sources).await;
    let fetch_errors = diagnostics.iter().filter(|d| d.is_error()).count();

    let processed = pipeline::process(&raws, &profile.requirements, opts.max_items);
    info!(
        "📊 {} raw, {} unidentified, {} unique, {} passed the quality gate",
        processed.count_raw,
        processed.count_unidentified,
        processed.count_deduped,
        processed.gate.passed
    );
    for (reason, count) in &processed.gate.reasons {
        info!("   rejected {}: {}", count, reason);
    }

    let diff = previous.diff(&processed.listings);
    info!(
        "Δ {} added, {} changed, {} unchanged, {} removed",
        diff.added.len(),
        diff.changed.len(),
        diff.unchanged.len(),
        diff.removed.len()
    );

    let (pages, sync) = match notion {
        Some(target) => {
            let still_listed = if opts.archive_removed {
                still_listed(&previous, &processed.capped, &diagnostics)
            } else {
                HashSet::new()
            };
            if opts.archive_removed && fetch_errors > 0 {
                warn!(
                    "{} search page(s) failed; not archiving listings last seen there",
                    fetch_errors
                );
            }
            let sync = NotionSync::new(target.api, target.database_id, &profile.requirements);
            let sync_opts = SyncOptions {
                archive_removed: opts.archive_removed,
                seen_on: Utc::now().date_naive(),
                still_listed,
            };
            let outcome = sync.run(&processed.listings, &previous, &sync_opts).await?;
            info!(
                "📝 Notion: {} created, {} updated, {} unchanged, {} archived, {} failed",
                outcome.report.created,
                outcome.report.updated,
                outcome.report.unchanged,
                outcome.report.archived,
                outcome.report.failed
            );
            (outcome.pages, Some(outcome.report))
        }
        None => {
            info!("Notion sync disabled");
            (previous.pages.clone(), None)
        }
    };

    let snapshot = Snapshot {
        fetched_at_utc: Some(Utc::now()),
        requirements: profile.requirements.clone(),
        diagnostics,
        count_raw: processed.count_raw,
        count_deduped: processed.count_deduped,
        count_quality_pass: processed.gate.passed,
        count_quality_fail: processed.gate.rejected,
        quality_reasons: processed.gate.reasons.clone(),
        listings: processed.listings,
        pages,
    };
    store.save(&snapshot).await?;
    info!("💾 Saved snapshot to {}", store.path().display());

    Ok(RunSummary {
        count_raw: processed.count_raw,
        count_unidentified: processed.count_unidentified,
        count_deduped: processed.count_deduped,
        count_quality_pass: processed.gate.passed,
        count_quality_fail: processed.gate.rejected,
        fetch_errors,
        diff,
        sync,
    })
}
