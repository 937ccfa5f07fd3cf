use crate::models::{RawListing, Source};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all listing sources
/// New portals only need to say where to look and how to fetch one search page
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch one search page and extract the listing candidates on it
    async fn fetch_page(&self, search_url: &str) -> Result<Vec<RawListing>>;

    /// Search pages this source reads on every run
    fn search_urls(&self) -> &[String];

    fn source(&self) -> Source;
}
