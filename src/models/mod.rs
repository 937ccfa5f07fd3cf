use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Portal a listing was scraped from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Zillow,
    Redfin,
    Realtor,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Zillow, Source::Redfin, Source::Realtor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Zillow => "zillow",
            Source::Redfin => "redfin",
            Source::Realtor => "realtor",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    House,
    Townhouse,
    Apartment,
    Condo,
    Unknown,
}

impl PropertyType {
    pub const ALL: [PropertyType; 5] = [
        PropertyType::House,
        PropertyType::Townhouse,
        PropertyType::Apartment,
        PropertyType::Condo,
        PropertyType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Townhouse => "townhouse",
            PropertyType::Apartment => "apartment",
            PropertyType::Condo => "condo",
            PropertyType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an amenity (pets, parking) is advertised
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Yes,
    Maybe,
    No,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Yes => "yes",
            Availability::Maybe => "maybe",
            Availability::No => "no",
        }
    }
}

/// Soft quality markers carried by listings that passed the gate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Rent above the target but within the stretch budget
    Stretch,
    PetsUnconfirmed,
    ParkingUnconfirmed,
    NoPostedDate,
}

impl QualityFlag {
    pub fn describe(&self) -> &'static str {
        match self {
            QualityFlag::Stretch => "stretch budget",
            QualityFlag::PetsUnconfirmed => "pets unconfirmed",
            QualityFlag::ParkingUnconfirmed => "parking unconfirmed",
            QualityFlag::NoPostedDate => "no posted date",
        }
    }
}

/// Listing candidate as extracted from a portal search page, before normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub source: Source,
    pub url: String,
    pub search_url: String,
    /// Visible text surrounding the listing link
    pub snippet: String,
    pub fetched_at: DateTime<Utc>,
}

/// Canonical housing listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub identity_key: String,
    pub source: Source,
    pub url: String,
    /// Search page the listing was last found on
    #[serde(default)]
    pub search_url: String,
    pub listing_id: String,
    pub property_name: String,
    pub address: String,
    pub city: String,
    pub property_type: PropertyType,
    pub price: Option<f64>,
    pub beds: Option<f64>,
    pub baths: Option<f64>,
    pub posted_at: Option<NaiveDate>,
    pub dog_friendly: Availability,
    pub parking: Availability,
    pub nature_score: f64,
    pub commute_score: f64,
    pub match_score: f64,
    #[serde(default)]
    pub flags: Vec<QualityFlag>,
    pub fetched_at: DateTime<Utc>,
}

impl Listing {
    /// Title used for the Notion page
    pub fn title(&self) -> &str {
        if !self.address.is_empty() {
            &self.address
        } else if !self.property_name.is_empty() {
            &self.property_name
        } else {
            "Bay Area rental"
        }
    }

    /// Content hash over everything except `fetched_at` and `search_url`.
    pub fn fingerprint(&self) -> String {
        let flags: Vec<&str> = self.flags.iter().map(QualityFlag::describe).collect();
        let content = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{:?}\u{1f}{:?}\u{1f}{:?}\u{1f}{:?}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.identity_key,
            self.source,
            self.url,
            self.listing_id,
            self.property_name,
            self.address,
            self.city,
            self.property_type,
            self.price,
            self.beds,
            self.baths,
            self.posted_at,
            self.dog_friendly.as_str(),
            self.parking.as_str(),
            self.nature_score,
            self.commute_score,
            self.match_score,
            flags.join(","),
        );

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}
