mod common;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bay_housing_sync::config::SearchProfile;
use bay_housing_sync::models::{RawListing, Source};
use bay_housing_sync::runner::{self, NotionTarget, RunOptions};
use bay_housing_sync::scrapers::ListingSource;
use bay_housing_sync::snapshot::SnapshotStore;
use common::{fetched_at, FakeNotion};
use std::collections::HashMap;
use tempfile::tempdir;

const SEARCH: &str = "https://www.redfin.com/city/14972/CA/Los-Gatos/apartments-for-rent";
const OAK: &str = "https://www.redfin.com/CA/Los-Gatos/120-Oak-Ridge-Rd-95030/home/1";
const VISTA: &str = "https://www.redfin.com/CA/Saratoga/55-Vista-Ln-95070/home/2";
const PINE: &str = "https://www.redfin.com/CA/Los-Gatos/9-Pine-Ct-95030/home/3";
const SARATOGA: &str = "https://www.redfin.com/city/17420/CA/Saratoga/apartments-for-rent";

/// Serves canned cards per search URL; unknown URLs fail like a blocked portal
struct CannedSource {
    search_urls: Vec<String>,
    cards: HashMap<String, Vec<(&'static str, &'static str)>>,
}

impl CannedSource {
    fn new(cards: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            search_urls: vec![SEARCH.to_string()],
            cards: HashMap::from([(SEARCH.to_string(), cards)]),
        }
    }
}

#[async_trait]
impl ListingSource for CannedSource {
    async fn fetch_page(&self, search_url: &str) -> Result<Vec<RawListing>> {
        let Some(cards) = self.cards.get(search_url) else {
            bail!("HTTP 403 for {search_url}");
        };
        Ok(cards
            .iter()
            .map(|(url, snippet)| RawListing {
                source: Source::Redfin,
                url: url.to_string(),
                search_url: search_url.to_string(),
                snippet: snippet.to_string(),
                fetched_at: fetched_at(),
            })
            .collect())
    }

    fn search_urls(&self) -> &[String] {
        &self.search_urls
    }

    fn source(&self) -> Source {
        Source::Redfin
    }
}

fn oak() -> (&'static str, &'static str) {
    (OAK, "$7,450/mo 3 beds 2.5 baths Single Family Dogs OK 2-car garage")
}

fn vista() -> (&'static str, &'static str) {
    (VISTA, "$8,200/mo 4 beds 3 baths townhome pet-friendly parking")
}

fn studio() -> (&'static str, &'static str) {
    (PINE, "$3,100/mo 1 bed 1 bath apartment")
}

fn sources(cards: Vec<(&'static str, &'static str)>) -> Vec<Box<dyn ListingSource>> {
    vec![Box::new(CannedSource::new(cards))]
}

/// Los Gatos page serves oak; the Saratoga page serves vista unless it is down
fn two_towns(saratoga_up: bool) -> Vec<Box<dyn ListingSource>> {
    let mut cards = HashMap::from([(SEARCH.to_string(), vec![oak()])]);
    if saratoga_up {
        cards.insert(SARATOGA.to_string(), vec![vista()]);
    }
    vec![Box::new(CannedSource {
        search_urls: vec![SEARCH.to_string(), SARATOGA.to_string()],
        cards,
    })]
}

#[tokio::test]
async fn run_without_notion_writes_a_snapshot() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let profile = SearchProfile::default();

    let summary = runner::run(
        &sources(vec![oak(), vista(), oak(), studio()]),
        &profile,
        &store,
        None,
        &RunOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.count_raw, 4);
    assert_eq!(summary.count_deduped, 3);
    assert_eq!(summary.count_quality_pass, 2);
    assert_eq!(summary.count_quality_fail, 1);
    assert_eq!(summary.diff.added.len(), 2);
    assert!(summary.sync.is_none());

    let snapshot = store.load().await.unwrap();
    assert_eq!(snapshot.listings.len(), 2);
    assert_eq!(snapshot.count_raw, 4);
    assert!(snapshot.quality_reasons.contains_key("too few beds"));
    assert!(snapshot.pages.is_empty());
    // ranked by match score
    assert!(snapshot.listings[0].match_score >= snapshot.listings[1].match_score);
}

#[tokio::test]
async fn rerun_with_same_upstream_is_a_noop() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let profile = SearchProfile::default();
    let notion = FakeNotion::new();
    let target = NotionTarget {
        api: &notion,
        database_id: "db-1",
    };
    let opts = RunOptions::default();

    let first = runner::run(&sources(vec![oak(), vista()]), &profile, &store, Some(target), &opts)
        .await
        .unwrap();
    assert_eq!(first.sync.unwrap().created, 2);

    notion.reset_writes();
    let second = runner::run(&sources(vec![oak(), vista()]), &profile, &store, Some(target), &opts)
        .await
        .unwrap();

    assert!(second.diff.is_noop());
    assert_eq!(second.sync.unwrap().unchanged, 2);
    assert_eq!(notion.writes(), 0);
    assert_eq!(store.load().await.unwrap().pages.len(), 2);
}

#[tokio::test]
async fn removed_listing_is_archived_when_requested() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let profile = SearchProfile::default();
    let notion = FakeNotion::new();
    let target = NotionTarget {
        api: &notion,
        database_id: "db-1",
    };
    let opts = RunOptions {
        archive_removed: true,
        ..RunOptions::default()
    };

    runner::run(&sources(vec![oak(), vista()]), &profile, &store, Some(target), &opts)
        .await
        .unwrap();
    let summary = runner::run(&sources(vec![oak()]), &profile, &store, Some(target), &opts)
        .await
        .unwrap();

    assert_eq!(summary.diff.removed.len(), 1);
    assert_eq!(summary.sync.unwrap().archived, 1);
    assert_eq!(notion.live_pages().len(), 1);
}

#[tokio::test]
async fn failed_fetch_is_recorded_and_skipped() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let mut source = CannedSource::new(vec![oak()]);
    source
        .search_urls
        .push(SARATOGA.to_string());
    let sources: Vec<Box<dyn ListingSource>> = vec![Box::new(source)];

    let summary = runner::run(&sources, &SearchProfile::default(), &store, None, &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.fetch_errors, 1);
    assert_eq!(summary.count_quality_pass, 1);

    let snapshot = store.load().await.unwrap();
    assert_eq!(snapshot.diagnostics.len(), 2);
    assert_eq!(snapshot.diagnostics[0].found, Some(1));
    assert!(snapshot.diagnostics[1]
        .error
        .as_deref()
        .unwrap()
        .contains("403"));
}

#[tokio::test]
async fn nothing_is_archived_when_every_fetch_fails() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let profile = SearchProfile::default();
    let notion = FakeNotion::new();
    let target = NotionTarget {
        api: &notion,
        database_id: "db-1",
    };
    let opts = RunOptions {
        archive_removed: true,
        ..RunOptions::default()
    };

    runner::run(&sources(vec![oak()]), &profile, &store, Some(target), &opts)
        .await
        .unwrap();

    let blocked: Vec<Box<dyn ListingSource>> = vec![Box::new(CannedSource {
        search_urls: vec![SEARCH.to_string()],
        cards: HashMap::new(),
    })];
    let summary = runner::run(&blocked, &profile, &store, Some(target), &opts)
        .await
        .unwrap();

    assert_eq!(summary.sync.unwrap().archived, 0);
    assert_eq!(notion.live_pages().len(), 1);
    assert_eq!(store.load().await.unwrap().pages.len(), 1);
}

#[tokio::test]
async fn listings_on_a_failed_search_page_are_not_archived() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let profile = SearchProfile::default();
    let notion = FakeNotion::new();
    let target = NotionTarget {
        api: &notion,
        database_id: "db-1",
    };
    let opts = RunOptions {
        archive_removed: true,
        ..RunOptions::default()
    };

    let first = runner::run(&two_towns(true), &profile, &store, Some(target), &opts)
        .await
        .unwrap();
    assert_eq!(first.sync.unwrap().created, 2);

    let outage = runner::run(&two_towns(false), &profile, &store, Some(target), &opts)
        .await
        .unwrap();
    assert_eq!(outage.fetch_errors, 1);
    assert_eq!(outage.diff.removed.len(), 1);
    assert_eq!(outage.sync.unwrap().archived, 0);
    assert_eq!(notion.live_pages().len(), 2);
    assert_eq!(store.load().await.unwrap().pages.len(), 2);

    // still down: the page record outlives the listing it came from
    let again = runner::run(&two_towns(false), &profile, &store, Some(target), &opts)
        .await
        .unwrap();
    assert_eq!(again.sync.unwrap().archived, 0);
    assert_eq!(notion.live_pages().len(), 2);

    let recovered = runner::run(&two_towns(true), &profile, &store, Some(target), &opts)
        .await
        .unwrap();
    let report = recovered.sync.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.unchanged, 2);
    assert_eq!(notion.live_pages().len(), 2);
}

#[tokio::test]
async fn listings_cut_by_max_items_are_not_archived() {
    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("latest.json"));
    let profile = SearchProfile::default();
    let notion = FakeNotion::new();
    let target = NotionTarget {
        api: &notion,
        database_id: "db-1",
    };
    let uncapped = RunOptions {
        max_items: 0,
        archive_removed: true,
    };
    let capped = RunOptions {
        max_items: 1,
        archive_removed: true,
    };

    let first = runner::run(&sources(vec![oak(), vista()]), &profile, &store, Some(target), &uncapped)
        .await
        .unwrap();
    assert_eq!(first.sync.unwrap().created, 2);

    let second = runner::run(&sources(vec![oak(), vista()]), &profile, &store, Some(target), &capped)
        .await
        .unwrap();
    assert_eq!(second.count_quality_pass, 2);
    assert_eq!(second.diff.removed.len(), 1);
    let report = second.sync.unwrap();
    assert_eq!(report.archived, 0);
    assert_eq!(report.unchanged, 1);
    assert_eq!(notion.live_pages().len(), 2);
    assert_eq!(store.load().await.unwrap().pages.len(), 2);

    let third = runner::run(&sources(vec![oak(), vista()]), &profile, &store, Some(target), &uncapped)
        .await
        .unwrap();
    assert_eq!(third.sync.unwrap().created, 0);
    assert_eq!(notion.live_pages().len(), 2);
}
