use crate::config::{HttpSettings, SourceConfig};
use crate::models::{RawListing, Source};
use crate::scrapers::traits::ListingSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

const MAX_CANDIDATES: usize = 100;
/// Bytes of markup read after an embedded link when there is no card around it
const SNIPPET_WINDOW: usize = 550;
const MAX_SNIPPET: usize = 900;
/// How far up from a link we look for the listing card
const CARD_DEPTH: usize = 4;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static ZILLOW_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://www\.zillow\.com/(?:homedetails|apartments)/[^"'\s<>\\]+"#)
        .expect("valid regex")
});
static REDFIN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://www\.redfin\.com/CA/[^"'\s<>\\]+"#).expect("valid regex")
});
static REALTOR_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:https://www\.realtor\.com)?/rentals/details/[^"'\s<>?\\]+"#)
        .expect("valid regex")
});

fn link_pattern(source: Source) -> &'static Regex {
    match source {
        Source::Zillow => &*ZILLOW_LINK,
        Source::Redfin => &*REDFIN_LINK,
        Source::Realtor => &*REALTOR_LINK,
    }
}

fn is_listing_link(source: Source, url: &str) -> bool {
    link_pattern(source)
        .find(url)
        .is_some_and(|m| m.start() == 0 && m.end() == url.len())
}

/// Scraper for a rental portal search page (Redfin, Realtor.com, Zillow)
pub struct PortalScraper {
    client: Client,
    source: Source,
    search_urls: Vec<String>,
}

impl PortalScraper {
    pub fn new(config: &SourceConfig, http: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout)
            .user_agent(http.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            source: config.source,
            search_urls: config.search_urls.clone(),
        })
    }
}

#[async_trait]
impl ListingSource for PortalScraper {
    async fn fetch_page(&self, search_url: &str) -> Result<Vec<RawListing>> {
        debug!("Fetching URL: {}", search_url);

        let response = self
            .client
            .get(search_url)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .with_context(|| format!("Failed to fetch {search_url}"))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", self.source, response.status());
            anyhow::bail!("{} returned status {}", self.source, response.status());
        }

        let fetched_at = Utc::now();
        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());

        let candidates = extract_candidates(self.source, &html, search_url, fetched_at);
        if candidates.is_empty() {
            warn!("No listing links found on {}", search_url);
        } else {
            info!("Found {} {} candidates on {}", candidates.len(), self.source, search_url);
        }
        Ok(candidates)
    }

    fn search_urls(&self) -> &[String] {
        &self.search_urls
    }

    fn source(&self) -> Source {
        self.source
    }
}

/// Pull listing links and their surrounding text out of a search page.
///
/// Anchors are read first so the snippet comes from the listing card; links that
/// only appear inside inline scripts fall back to a window of the raw markup.
pub fn extract_candidates(
    source: Source,
    html: &str,
    search_url: &str,
    fetched_at: DateTime<Utc>,
) -> Vec<RawListing> {
    let Ok(base) = Url::parse(search_url) else {
        warn!("Search URL {} is not absolute, skipping", search_url);
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let document = Html::parse_document(html);

    for anchor in document.select(&ANCHOR) {
        if candidates.len() >= MAX_CANDIDATES {
            break;
        }
        let Some(url) = anchor.value().attr("href").and_then(|href| resolve(&base, href)) else {
            continue;
        };
        if !is_listing_link(source, &url) || !seen.insert(url.clone()) {
            continue;
        }
        candidates.push(RawListing {
            source,
            url,
            search_url: search_url.to_string(),
            snippet: card_text(anchor),
            fetched_at,
        });
    }

    for m in link_pattern(source).find_iter(html) {
        if candidates.len() >= MAX_CANDIDATES {
            break;
        }
        let Some(url) = resolve(&base, m.as_str()) else {
            continue;
        };
        if !is_listing_link(source, &url) || !seen.insert(url.clone()) {
            continue;
        }
        let window = window_after(html, m.end(), SNIPPET_WINDOW);
        candidates.push(RawListing {
            source,
            url,
            search_url: search_url.to_string(),
            snippet: truncate(&plain_text(window), MAX_SNIPPET),
            fetched_at,
        });
    }

    candidates
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

fn card_text(anchor: ElementRef<'_>) -> String {
    let mut own = collapse(&anchor.text().collect::<Vec<_>>().join(" "));
    if let Some(label) = anchor.value().attr("aria-label") {
        own = format!("{} {}", collapse(label), own).trim().to_string();
    }

    let card = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(CARD_DEPTH)
        .map(|el| collapse(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|text| text.contains('$'));

    let text = match card {
        Some(card) if !own.is_empty() && !card.contains(&own) => format!("{own} {card}"),
        Some(card) => card,
        None => own,
    };
    truncate(&text, MAX_SNIPPET)
}

fn window_after(html: &str, start: usize, len: usize) -> &str {
    let mut end = (start + len).min(html.len());
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[start..end]
}

/// Visible text of a markup window, decoded by the same parser as the cards
fn plain_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    collapse(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
