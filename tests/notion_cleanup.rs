mod common;

use bay_housing_sync::notion::properties::{self, multi_select_names, plain_text, url_value};
use bay_housing_sync::notion::{NotionCleanup, Properties};
use common::FakeNotion;
use serde_json::{json, Value};

const DB: &str = "db-1";

const LEGACY_COLUMNS: [(&str, &str); 7] = [
    ("URL", "url"),
    ("Listing ID", "rich_text"),
    ("Source", "select"),
    ("Primary URL", "url"),
    ("Source URLs", "rich_text"),
    ("Listing IDs", "rich_text"),
    ("Sources", "multi_select"),
];

fn page(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn legacy_page(n: usize) -> Properties {
    page(json!({
        "Name": { "title": [{ "plain_text": format!("{n} Oak Ridge Rd") }] },
        "URL": { "url": format!("http://www.Redfin.com/CA/Los-Gatos/home/{n}/?from=search") },
        "Listing ID": { "rich_text": [{ "plain_text": format!("rf-{n}") }] },
        "Source": { "select": { "name": "redfin" } },
        "Primary URL": { "url": null },
        "Source URLs": { "rich_text": [] },
        "Listing IDs": { "rich_text": [] },
        "Sources": { "multi_select": [] }
    }))
}

#[tokio::test]
async fn cleanup_merges_legacy_columns() {
    let notion = FakeNotion::with_pages(&LEGACY_COLUMNS, vec![legacy_page(1), legacy_page(2)]);

    let report = NotionCleanup::new(&notion, DB, false).run().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(report.renamed_columns.len(), 3);

    let schema = notion.schema();
    assert!(schema.contains_key("LEGACY URL"));
    assert!(!schema.contains_key("URL"));

    let pages = notion.pages();
    let first = &pages[0].properties;
    let canon = "https://www.redfin.com/CA/Los-Gatos/home/1";
    assert_eq!(url_value(first.get(properties::PRIMARY_URL)), canon);
    assert_eq!(plain_text(first.get(properties::SOURCE_URLS)), canon);
    assert_eq!(plain_text(first.get(properties::LISTING_IDS)), "rf-1");
    assert_eq!(plain_text(first.get(properties::CANONICAL_KEY)), format!("url:{canon}"));
    assert_eq!(multi_select_names(first.get(properties::SOURCES)), vec!["redfin"]);
}

#[tokio::test]
async fn second_cleanup_pass_changes_nothing() {
    let notion = FakeNotion::with_pages(&LEGACY_COLUMNS, vec![legacy_page(1), legacy_page(2)]);
    NotionCleanup::new(&notion, DB, false).run().await.unwrap();
    notion.reset_writes();

    let report = NotionCleanup::new(&notion, DB, false).run().await.unwrap();
    assert_eq!(report.updated, 0);
    assert!(report.renamed_columns.is_empty());
    assert_eq!(notion.writes(), 0);
}

#[tokio::test]
async fn cleanup_walks_every_result_page() {
    let pages = (1..=230).map(legacy_page).collect();
    let notion = FakeNotion::with_pages(&LEGACY_COLUMNS, pages);

    let report = NotionCleanup::new(&notion, DB, false).run().await.unwrap();
    assert_eq!(report.scanned, 230);
    assert_eq!(report.updated, 230);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let notion = FakeNotion::with_pages(&LEGACY_COLUMNS, vec![legacy_page(1)]);

    let report = NotionCleanup::new(&notion, DB, true).run().await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.renamed_columns.len(), 3);
    assert_eq!(notion.writes(), 0);
    assert!(notion.schema().contains_key("URL"));
}
