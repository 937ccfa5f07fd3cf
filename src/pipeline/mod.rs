//! Raw candidates to sync-ready listings: normalize, dedupe, gate, rank.

pub mod dedupe;
pub mod identity;
pub mod normalize;
pub mod quality;
pub mod score;

pub use dedupe::dedupe;
pub use identity::{canonical_url, identity_key, url_key};
pub use normalize::{normalize, normalize_all};
pub use quality::{assess, GateReport};

use crate::config::Requirements;
use crate::models::{Listing, RawListing};

/// Everything a run learns from its raw candidates
#[derive(Debug, Default)]
pub struct Processed {
    pub listings: Vec<Listing>,
    pub count_raw: usize,
    pub count_unidentified: usize,
    pub count_deduped: usize,
    pub gate: GateReport,
    /// Identity keys that passed the gate but fell outside `max_items`
    pub capped: Vec<String>,
}

pub fn process(raws: &[RawListing], reqs: &Requirements, max_items: usize) -> Processed {
    let normalized = normalize_all(raws, reqs);
    let unique = dedupe(normalized.listings);
    let count_deduped = unique.len();
    let (passed, gate) = quality::apply(unique, reqs);
    let (listings, cut) = score::rank(passed, max_items);

    Processed {
        listings,
        count_raw: raws.len(),
        count_unidentified: normalized.dropped,
        count_deduped,
        gate,
        capped: cut.into_iter().map(|l| l.identity_key).collect(),
    }
}
