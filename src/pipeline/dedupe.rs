use crate::models::Listing;
use std::collections::HashMap;

/// Collapse listings sharing an identity key. The most recently fetched record
/// wins; on equal fetch times the later one in input order wins. Keys keep the
/// position of their first appearance.
pub fn dedupe(listings: Vec<Listing>) -> Vec<Listing> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(listings.len());
    let mut unique: Vec<Listing> = Vec::with_capacity(listings.len());

    for listing in listings {
        match positions.get(&listing.identity_key) {
            Some(&idx) => {
                if listing.fetched_at >= unique[idx].fetched_at {
                    unique[idx] = listing;
                }
            }
            None => {
                positions.insert(listing.identity_key.clone(), unique.len());
                unique.push(listing);
            }
        }
    }

    unique
}
