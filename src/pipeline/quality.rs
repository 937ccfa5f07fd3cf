use crate::config::Requirements;
use crate::models::{Listing, PropertyType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Why a listing was kept out of the sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rejection {
    MissingIdentity,
    MissingAddress,
    MissingPrice,
    ImplausiblePrice,
    OverBudget,
    MissingBeds,
    TooFewBeds,
    MissingBaths,
    TooFewBaths,
    PropertyTypeNotAllowed(PropertyType),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingIdentity => f.write_str("missing canonical key"),
            Rejection::MissingAddress => f.write_str("missing address/name"),
            Rejection::MissingPrice => f.write_str("missing price"),
            Rejection::ImplausiblePrice => f.write_str("implausible price"),
            Rejection::OverBudget => f.write_str("price above stretch budget"),
            Rejection::MissingBeds => f.write_str("missing beds"),
            Rejection::TooFewBeds => f.write_str("too few beds"),
            Rejection::MissingBaths => f.write_str("missing baths"),
            Rejection::TooFewBaths => f.write_str("too few baths"),
            Rejection::PropertyTypeNotAllowed(t) => write!(f, "property type not allowed: {t}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    pub rejections: Vec<Rejection>,
}

impl Assessment {
    pub fn passed(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn notes(&self) -> String {
        if self.passed() {
            return "ready".to_string();
        }
        self.rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Completeness and plausibility checks. Pure: no I/O, no mutation.
pub fn assess(listing: &Listing, reqs: &Requirements) -> Assessment {
    let mut rejections = Vec::new();

    if listing.identity_key.trim().is_empty() {
        rejections.push(Rejection::MissingIdentity);
    }
    if listing.address.trim().is_empty() && listing.property_name.trim().is_empty() {
        rejections.push(Rejection::MissingAddress);
    }

    match listing.price {
        None => rejections.push(Rejection::MissingPrice),
        Some(price) if !price.is_finite() || price <= 0.0 || price > reqs.price_ceiling => {
            rejections.push(Rejection::ImplausiblePrice)
        }
        Some(price) if price > reqs.stretch_max => rejections.push(Rejection::OverBudget),
        Some(_) => {}
    }

    match listing.beds {
        None => rejections.push(Rejection::MissingBeds),
        Some(beds) if beds < reqs.min_beds => rejections.push(Rejection::TooFewBeds),
        Some(_) => {}
    }
    match listing.baths {
        None => rejections.push(Rejection::MissingBaths),
        Some(baths) if baths < reqs.min_baths => rejections.push(Rejection::TooFewBaths),
        Some(_) => {}
    }

    if !reqs.allows(listing.property_type) {
        rejections.push(Rejection::PropertyTypeNotAllowed(listing.property_type));
    }

    Assessment { rejections }
}

/// Tally of a gate pass, stored in the snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GateReport {
    pub passed: usize,
    pub rejected: usize,
    pub reasons: BTreeMap<String, usize>,
}

/// Keep the listings that pass; count the rest by reason.
pub fn apply(listings: Vec<Listing>, reqs: &Requirements) -> (Vec<Listing>, GateReport) {
    let mut report = GateReport::default();
    let mut kept = Vec::with_capacity(listings.len());

    for listing in listings {
        let assessment = assess(&listing, reqs);
        if assessment.passed() {
            report.passed += 1;
            kept.push(listing);
        } else {
            report.rejected += 1;
            for rejection in &assessment.rejections {
                *report.reasons.entry(rejection.to_string()).or_default() += 1;
            }
        }
    }

    (kept, report)
}
