use crate::config::Requirements;
use crate::models::{Availability, Listing, PropertyType, QualityFlag, RawListing};
use crate::pipeline::identity::{canonical_url, identity_key};
use crate::pipeline::score::{commute_score, match_score, nature_score};
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

const MAX_TEXT: usize = 220;

/// Everything but RFC 3986 unreserved characters is escaped, spaces as `%20`
const LISTING_ID: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s*([0-9][0-9,]*)").expect("valid regex"));
static BEDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:bd|beds?)").expect("valid regex"));
static BATHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(?:ba|baths?)").expect("valid regex"));
static DAYS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,3})\s+days?\s+ago\b").expect("valid regex"));
static POSTED_ON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:listed|posted)\s+(?:on\s+)?(\d{4}-\d{2}-\d{2})").expect("valid regex")
});
static POSTED_TODAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:listed|posted)\s+today\b").expect("valid regex"));
static NO_PETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bno\s+(?:pets|dogs)\b").expect("valid regex"));
static PETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pets?\s*ok|pet[- ]friendly|dogs?").expect("valid regex"));
static NO_PARKING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bno\s+(?:parking|garage)\b").expect("valid regex"));
static PARKING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)parking|garage").expect("valid regex"));
static ZILLOW_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/homedetails/([^/]+)/").expect("valid regex"));
static REALTOR_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/details/([^/?]+)").expect("valid regex"));
static REALTOR_ID_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_M[\d-]+$").expect("valid regex"));
static REDFIN_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/CA/[^/]+/([^/]+)/(?:home|unit)").expect("valid regex"));
static NAME_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:apartments|details)/([^/?]+)").expect("valid regex"));

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("no identity could be derived for {url}")]
    NoIdentity { url: String },
}

/// Result of normalizing a batch
#[derive(Debug, Default)]
pub struct Normalized {
    pub listings: Vec<Listing>,
    pub dropped: usize,
}

pub fn normalize_all(raws: &[RawListing], reqs: &Requirements) -> Normalized {
    let mut out = Normalized::default();
    for raw in raws {
        match normalize(raw, reqs) {
            Ok(listing) => out.listings.push(listing),
            Err(err) => {
                debug!("dropping raw listing: {}", err);
                out.dropped += 1;
            }
        }
    }
    out
}

/// Map a raw candidate onto the canonical listing shape
pub fn normalize(raw: &RawListing, reqs: &Requirements) -> Result<Listing, NormalizeError> {
    let snippet = raw.snippet.as_str();
    let url = canonical_url(&raw.url).unwrap_or_else(|| raw.url.trim().to_string());

    let property_name = truncate(&property_name_from_url(&url), MAX_TEXT);
    let address = truncate(&address_from_url(&url), MAX_TEXT);
    let city = infer_city(&format!("{address} {snippet} {}", raw.search_url), &reqs.areas);

    let identity_key = identity_key(&url, &address, &property_name, &city)
        .ok_or_else(|| NormalizeError::NoIdentity { url: raw.url.clone() })?;

    let price = parse_price(snippet);
    let (beds, baths) = parse_beds_baths(snippet);
    let posted_at = parse_posted(snippet, raw.fetched_at.date_naive());
    let dog_friendly = availability(snippet, &NO_PETS, &PETS);
    let parking = availability(snippet, &NO_PARKING, &PARKING);

    let mut flags = Vec::new();
    if price.is_some_and(|p| p > reqs.max_rent) {
        flags.push(QualityFlag::Stretch);
    }
    if dog_friendly != Availability::Yes {
        flags.push(QualityFlag::PetsUnconfirmed);
    }
    if parking != Availability::Yes {
        flags.push(QualityFlag::ParkingUnconfirmed);
    }
    if posted_at.is_none() {
        flags.push(QualityFlag::NoPostedDate);
    }

    let mut listing = Listing {
        identity_key,
        source: raw.source,
        listing_id: listing_id(&url),
        property_type: infer_property_type(snippet, &url, &property_name),
        nature_score: nature_score(&city, snippet),
        commute_score: commute_score(&city),
        url,
        search_url: raw.search_url.clone(),
        property_name,
        address,
        city,
        price,
        beds,
        baths,
        posted_at,
        dog_friendly,
        parking,
        match_score: 0.0,
        flags,
        fetched_at: raw.fetched_at,
    };
    listing.match_score = match_score(&listing, reqs);
    Ok(listing)
}

pub fn listing_id(url: &str) -> String {
    utf8_percent_encode(url, LISTING_ID).to_string()
}

pub fn parse_price(text: &str) -> Option<f64> {
    let caps = PRICE.captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

pub fn parse_beds_baths(text: &str) -> (Option<f64>, Option<f64>) {
    let lowered = text.to_lowercase();
    let grab = |re: &Regex| {
        re.captures(&lowered)
            .and_then(|caps| caps[1].parse::<f64>().ok())
    };
    (grab(&*BEDS), grab(&*BATHS))
}

fn parse_posted(text: &str, fetched_on: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = POSTED_ON.captures(text) {
        return NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok();
    }
    if let Some(caps) = DAYS_AGO.captures(text) {
        let days: u64 = caps[1].parse().ok()?;
        return fetched_on.checked_sub_days(Days::new(days));
    }
    if POSTED_TODAY.is_match(text) {
        return Some(fetched_on);
    }
    None
}

fn availability(text: &str, negative: &Regex, positive: &Regex) -> Availability {
    if negative.is_match(text) {
        Availability::No
    } else if positive.is_match(text) {
        Availability::Yes
    } else {
        Availability::Maybe
    }
}

pub fn infer_property_type(snippet: &str, url: &str, name: &str) -> PropertyType {
    let text = format!("{snippet} {url} {name}").to_lowercase();
    if text.contains("townhouse") || text.contains("townhome") {
        PropertyType::Townhouse
    } else if text.contains("single family")
        || text.contains("single-family")
        || text.contains("house for rent")
        || text.contains("/homedetails/")
    {
        PropertyType::House
    } else if text.contains("apartment") {
        PropertyType::Apartment
    } else if text.contains("condo") {
        PropertyType::Condo
    } else {
        PropertyType::Unknown
    }
}

/// Best-effort street address from the listing URL slug
pub fn address_from_url(url: &str) -> String {
    if let Some(caps) = ZILLOW_SLUG.captures(url) {
        return caps[1].replace('-', " ");
    }
    if let Some(caps) = REALTOR_SLUG.captures(url) {
        let slug = REALTOR_ID_SUFFIX.replace(&caps[1], "");
        return slug.replace(['_', '-'], " ");
    }
    if let Some(caps) = REDFIN_SLUG.captures(url) {
        return caps[1].replace('-', " ");
    }
    String::new()
}

fn property_name_from_url(url: &str) -> String {
    NAME_SLUG
        .captures(url)
        .map(|caps| caps[1].replace(['-', '_'], " "))
        .unwrap_or_default()
}

pub fn infer_city(text: &str, areas: &[String]) -> String {
    let lowered = text.to_lowercase().replace(['-', '_'], " ");
    if let Some(area) = areas.iter().find(|a| lowered.contains(&a.to_lowercase())) {
        return area.clone();
    }
    ["Redwood City", "San Jose", "Mountain View", "Sunnyvale"]
        .iter()
        .find(|town| lowered.contains(&town.to_lowercase()))
        .map(|town| town.to_string())
        .unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
