use crate::config::Requirements;
use crate::models::{Availability, Listing};

const NATURE_KEYWORDS: &[&str] = &[
    "foothill",
    "hills",
    "ridge",
    "trail",
    "open space",
    "park",
    "mountain",
];
const NATURE_TOWNS: &[&str] = &[
    "woodside",
    "portola valley",
    "los altos hills",
    "saratoga",
    "los gatos",
];

pub fn nature_score(city: &str, snippet: &str) -> f64 {
    let text = format!("{city} {snippet}").to_lowercase();
    let mut score = 0.0;
    if NATURE_KEYWORDS.iter().any(|k| text.contains(k)) {
        score += 3.0;
    }
    if NATURE_TOWNS.iter().any(|k| text.contains(k)) {
        score += 2.0;
    }
    score
}

/// Rough commute to Mountain View / Sunnyvale, by town. A placeholder until real
/// drive times are wired in.
pub fn commute_score(city: &str) -> f64 {
    let city = city.to_lowercase();
    if in_any(&city, &["mountain view", "sunnyvale"]) {
        5.0
    } else if in_any(&city, &["los altos hills", "cupertino", "saratoga"]) {
        4.0
    } else if in_any(&city, &["los gatos", "woodside", "portola valley"]) {
        3.0
    } else {
        2.0
    }
}

fn in_any(city: &str, towns: &[&str]) -> bool {
    towns.iter().any(|t| city.contains(t))
}

pub fn match_score(listing: &Listing, reqs: &Requirements) -> f64 {
    let mut score = 0.0;

    if let Some(price) = listing.price {
        if price <= reqs.max_rent {
            score += 4.0;
        } else if price <= reqs.stretch_max {
            score += 2.0;
        }
    }
    match listing.beds {
        Some(beds) if beds >= 3.0 => score += 2.0,
        Some(beds) if beds >= 2.0 => score += 1.0,
        _ => {}
    }
    if listing.baths.is_some_and(|baths| baths >= 2.0) {
        score += 1.0;
    }
    if listing.dog_friendly == Availability::Yes {
        score += 2.0;
    }
    if listing.parking == Availability::Yes {
        score += 2.0;
    }

    score += listing.nature_score + listing.commute_score;
    (score * 100.0).round() / 100.0
}

/// Best matches first, capped at `max_items` (0 keeps everything). Returns the
/// kept listings and the ones cut by the cap.
pub fn rank(mut listings: Vec<Listing>, max_items: usize) -> (Vec<Listing>, Vec<Listing>) {
    listings.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    let cut = if max_items > 0 && listings.len() > max_items {
        listings.split_off(max_items)
    } else {
        Vec::new()
    };
    (listings, cut)
}
