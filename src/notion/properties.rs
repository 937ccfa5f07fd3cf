//! Column names, the managed schema, and conversions between listings and
//! Notion property JSON.

use crate::config::Requirements;
use crate::models::{Listing, PropertyType, QualityFlag, Source};
use crate::notion::client::Properties;
use chrono::NaiveDate;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const CANONICAL_KEY: &str = "Canonical Key";
pub const SOURCES: &str = "Sources";
pub const PRIMARY_URL: &str = "Primary URL";
pub const SOURCE_URLS: &str = "Source URLs";
pub const LISTING_IDS: &str = "Listing IDs";
pub const ADDRESS: &str = "Address";
pub const CITY: &str = "City";
pub const PROPERTY_TYPE: &str = "Property Type";
pub const PREFERRED_TYPE: &str = "Home/Townhome Preferred";
pub const PRICE: &str = "Price";
pub const BEDS: &str = "Beds";
pub const BATHS: &str = "Baths";
pub const DOG_FRIENDLY: &str = "Dog Friendly";
pub const PARKING: &str = "Parking";
pub const MOVE_WINDOW: &str = "Move Window";
pub const STRETCH: &str = "Stretch";
pub const COMMUTE_SCORE: &str = "Commute Score";
pub const NATURE_SCORE: &str = "Nature Score";
pub const MATCH_SCORE: &str = "Match Score";
pub const DATA_QUALITY: &str = "Data Quality";
pub const QUALITY_NOTES: &str = "Quality Notes";
pub const POSTED: &str = "Posted";
pub const LAST_SEEN: &str = "Last Seen";

/// Single-value columns from before the consolidation into the plural ones
pub const LEGACY_URL: &str = "URL";
pub const LEGACY_LISTING_ID: &str = "Listing ID";
pub const LEGACY_SOURCE: &str = "Source";

/// Legacy column -> name it is renamed to once migrated
pub const LEGACY_RENAMES: [(&str, &str); 3] = [
    (LEGACY_URL, "LEGACY URL"),
    (LEGACY_LISTING_ID, "LEGACY Listing ID"),
    (LEGACY_SOURCE, "LEGACY Source"),
];

/// Notion allows 2000 characters per rich text object
pub const RICH_TEXT_LIMIT: usize = 1800;

const DEFAULT_TITLE_PROPERTY: &str = "Name";

fn options(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|n| json!({ "name": n })).collect())
}

fn select_schema(names: &[&str]) -> Value {
    json!({ "select": { "options": options(names) } })
}

fn number_schema(format: &str) -> Value {
    json!({ "number": { "format": format } })
}

/// Columns the sync owns. Added to the database when missing.
pub fn managed_schema() -> Properties {
    let sources: Vec<&str> = Source::ALL.iter().map(Source::as_str).collect();
    let types: Vec<&str> = PropertyType::ALL.iter().map(PropertyType::as_str).collect();
    let availability = ["yes", "maybe", "no"];

    let mut schema = Properties::new();
    schema.insert(CANONICAL_KEY.into(), json!({ "rich_text": {} }));
    schema.insert(SOURCES.into(), json!({ "multi_select": { "options": options(&sources) } }));
    schema.insert(PRIMARY_URL.into(), json!({ "url": {} }));
    schema.insert(SOURCE_URLS.into(), json!({ "rich_text": {} }));
    schema.insert(LISTING_IDS.into(), json!({ "rich_text": {} }));
    schema.insert(ADDRESS.into(), json!({ "rich_text": {} }));
    schema.insert(CITY.into(), json!({ "rich_text": {} }));
    schema.insert(PROPERTY_TYPE.into(), select_schema(&types));
    schema.insert(PREFERRED_TYPE.into(), select_schema(&["yes", "no"]));
    schema.insert(PRICE.into(), number_schema("dollar"));
    schema.insert(BEDS.into(), number_schema("number"));
    schema.insert(BATHS.into(), number_schema("number"));
    schema.insert(DOG_FRIENDLY.into(), select_schema(&availability));
    schema.insert(PARKING.into(), select_schema(&availability));
    schema.insert(MOVE_WINDOW.into(), json!({ "rich_text": {} }));
    schema.insert(STRETCH.into(), select_schema(&["no", "yes"]));
    schema.insert(COMMUTE_SCORE.into(), number_schema("number"));
    schema.insert(NATURE_SCORE.into(), number_schema("number"));
    schema.insert(MATCH_SCORE.into(), number_schema("number"));
    schema.insert(DATA_QUALITY.into(), select_schema(&["pass", "fail"]));
    schema.insert(QUALITY_NOTES.into(), json!({ "rich_text": {} }));
    schema.insert(POSTED.into(), json!({ "date": {} }));
    schema.insert(LAST_SEEN.into(), json!({ "date": {} }));
    schema
}

/// Managed columns the database does not have yet
pub fn missing_properties(existing: &Properties) -> Properties {
    managed_schema()
        .into_iter()
        .filter(|(name, _)| !existing.contains_key(name))
        .collect()
}

pub fn title_property_or_default(name: Option<&str>) -> String {
    name.unwrap_or(DEFAULT_TITLE_PROPERTY).to_string()
}

pub fn truncate_rich(content: &str) -> String {
    content.chars().take(RICH_TEXT_LIMIT).collect()
}

pub fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": truncate_rich(content) } }] })
}

fn title(content: &str) -> Value {
    json!({ "title": [{ "text": { "content": truncate_rich(content) } }] })
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn quality_notes(flags: &[QualityFlag]) -> String {
    if flags.is_empty() {
        return "ready".to_string();
    }
    flags
        .iter()
        .map(QualityFlag::describe)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Page properties for a listing that passed the quality gate
pub fn listing_properties(
    listing: &Listing,
    title_property: &str,
    reqs: &Requirements,
    seen_on: NaiveDate,
) -> Properties {
    let stretch = listing.price.is_some_and(|p| p > reqs.max_rent);
    let posted = match listing.posted_at {
        Some(date) => json!({ "date": { "start": date.to_string() } }),
        None => json!({ "date": null }),
    };

    let mut props = Properties::new();
    props.insert(title_property.to_string(), title(listing.title()));
    props.insert(CANONICAL_KEY.into(), rich_text(&listing.identity_key));
    props.insert(
        SOURCES.into(),
        json!({ "multi_select": [{ "name": listing.source.as_str() }] }),
    );
    props.insert(PRIMARY_URL.into(), json!({ "url": listing.url }));
    props.insert(ADDRESS.into(), rich_text(&listing.address));
    props.insert(CITY.into(), rich_text(&listing.city));
    props.insert(PROPERTY_TYPE.into(), select(listing.property_type.as_str()));
    props.insert(
        PREFERRED_TYPE.into(),
        select(yes_no(reqs.allows(listing.property_type))),
    );
    props.insert(PRICE.into(), json!({ "number": listing.price }));
    props.insert(BEDS.into(), json!({ "number": listing.beds }));
    props.insert(BATHS.into(), json!({ "number": listing.baths }));
    props.insert(DOG_FRIENDLY.into(), select(listing.dog_friendly.as_str()));
    props.insert(PARKING.into(), select(listing.parking.as_str()));
    props.insert(MOVE_WINDOW.into(), rich_text(&reqs.move_window));
    props.insert(STRETCH.into(), select(yes_no(stretch)));
    props.insert(COMMUTE_SCORE.into(), json!({ "number": listing.commute_score }));
    props.insert(NATURE_SCORE.into(), json!({ "number": listing.nature_score }));
    props.insert(MATCH_SCORE.into(), json!({ "number": listing.match_score }));
    props.insert(DATA_QUALITY.into(), select("pass"));
    props.insert(QUALITY_NOTES.into(), rich_text(&quality_notes(&listing.flags)));
    props.insert(POSTED.into(), posted);
    props.insert(
        LAST_SEEN.into(),
        json!({ "date": { "start": seen_on.to_string() } }),
    );
    props
}

/// Hash of the page content a sync writes, ignoring the Last Seen date.
/// Covers requirement-derived columns as well as the listing's own fields.
pub fn page_fingerprint(props: &Properties) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in props.iter().filter(|(name, _)| name.as_str() != LAST_SEEN) {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(value.to_string().as_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

/// Text of a rich_text or title property
pub fn plain_text(prop: Option<&Value>) -> String {
    let Some(prop) = prop else {
        return String::new();
    };
    let segments = prop
        .get("rich_text")
        .or_else(|| prop.get("title"))
        .and_then(Value::as_array);

    segments
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("plain_text")
                        .or_else(|| item.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub fn url_value(prop: Option<&Value>) -> String {
    prop.and_then(|p| p.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub fn select_name(prop: Option<&Value>) -> Option<String> {
    prop.and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn multi_select_names(prop: Option<&Value>) -> Vec<String> {
    prop.and_then(|p| p.get("multi_select"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
