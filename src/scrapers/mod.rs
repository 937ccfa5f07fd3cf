pub mod portal;
pub mod traits;
pub mod types;

pub use portal::PortalScraper;
pub use traits::ListingSource;
pub use types::FetchDiagnostic;

use crate::config::{HttpSettings, SearchProfile};
use anyhow::Result;
use tracing::info;

/// Build a scraper for every source in the profile that is not paused
pub fn build_sources(profile: &SearchProfile, http: &HttpSettings) -> Result<Vec<Box<dyn ListingSource>>> {
    for config in profile.sources.iter().filter(|s| s.paused) {
        match &config.notes {
            Some(notes) => info!("⏸  {} is paused ({}), skipping", config.source, notes),
            None => info!("⏸  {} is paused, skipping", config.source),
        }
    }

    let mut sources: Vec<Box<dyn ListingSource>> = Vec::new();
    for config in profile.active_sources() {
        sources.push(Box::new(PortalScraper::new(config, http)?));
    }
    Ok(sources)
}
