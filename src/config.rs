use crate::models::{PropertyType, Source};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SNAPSHOT_PATH: &str = "data/bay_housing_latest.json";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Fatal configuration problems. Detected before anything is fetched or written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}; set it in the environment or in .env")]
    MissingCredential(&'static str),
    #[error("reading sources file {path}")]
    SourcesRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing sources file {path}")]
    SourcesParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid requirements: {0}")]
    Invalid(String),
}

/// What counts as an acceptable rental
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    pub move_window: String,
    pub max_rent: f64,
    /// Highest rent still considered (flagged as stretch)
    pub stretch_max: f64,
    pub min_beds: f64,
    pub min_baths: f64,
    pub allowed_property_types: Vec<PropertyType>,
    /// Preferred towns, used for city inference and scoring
    pub areas: Vec<String>,
    /// Anything above this is treated as a parse error, not a rent
    pub price_ceiling: f64,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            move_window: "Aug-Sep 2026".to_string(),
            max_rent: 8_000.0,
            stretch_max: 9_000.0,
            min_beds: 2.0,
            min_baths: 2.0,
            allowed_property_types: vec![PropertyType::House, PropertyType::Townhouse],
            areas: [
                "Woodside",
                "Portola Valley",
                "Los Altos Hills",
                "Saratoga",
                "Los Gatos",
                "Cupertino",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            price_ceiling: 50_000.0,
        }
    }
}

impl Requirements {
    pub fn allows(&self, property_type: PropertyType) -> bool {
        self.allowed_property_types.contains(&property_type)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rent <= 0.0 {
            return Err(ConfigError::Invalid("max_rent must be positive".into()));
        }
        if self.stretch_max < self.max_rent {
            return Err(ConfigError::Invalid(format!(
                "stretch_max ({}) is below max_rent ({})",
                self.stretch_max, self.max_rent
            )));
        }
        if self.price_ceiling < self.stretch_max {
            return Err(ConfigError::Invalid("price_ceiling is below stretch_max".into()));
        }
        if self.allowed_property_types.is_empty() {
            return Err(ConfigError::Invalid("no property types allowed".into()));
        }
        Ok(())
    }
}

/// One portal and the search pages to read from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source: Source,
    #[serde(default)]
    pub paused: bool,
    pub search_urls: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Requirements plus the source registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProfile {
    #[serde(default)]
    pub requirements: Requirements,
    pub sources: Vec<SourceConfig>,
}

impl Default for SearchProfile {
    fn default() -> Self {
        Self {
            requirements: Requirements::default(),
            sources: vec![
                SourceConfig {
                    source: Source::Zillow,
                    paused: true,
                    search_urls: vec![
                        "https://www.zillow.com/woodside-ca/rentals/".to_string(),
                        "https://www.zillow.com/portola-valley-ca/rentals/".to_string(),
                    ],
                    notes: Some("paused until the database side is stable".to_string()),
                },
                SourceConfig {
                    source: Source::Redfin,
                    paused: false,
                    search_urls: vec![
                        "https://www.redfin.com/city/14972/CA/Los-Gatos/apartments-for-rent"
                            .to_string(),
                        "https://www.redfin.com/city/17420/CA/Saratoga/apartments-for-rent"
                            .to_string(),
                    ],
                    notes: None,
                },
                SourceConfig {
                    source: Source::Realtor,
                    paused: false,
                    search_urls: vec![
                        "https://www.realtor.com/apartments/Los-Gatos_CA".to_string(),
                        "https://www.realtor.com/apartments/Saratoga_CA".to_string(),
                    ],
                    notes: None,
                },
            ],
        }
    }
}

impl SearchProfile {
    /// Built-in profile, or the JSON file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let profile = match path {
            None => Self::default(),
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::SourcesRead {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                serde_json::from_str(&data).map_err(|source| ConfigError::SourcesParse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };
        profile.requirements.validate()?;
        Ok(profile)
    }

    pub fn active_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| !s.paused)
    }
}

/// Portal client settings
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl HttpSettings {
    pub fn from_env() -> Self {
        Self {
            user_agent: std::env::var("BAY_HOUSING_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(
                std::env::var("BAY_HOUSING_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(25),
            ),
        }
    }
}

/// Notion credentials
#[derive(Clone)]
pub struct NotionSettings {
    pub token: String,
    pub database_id: String,
}

impl std::fmt::Debug for NotionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionSettings")
            .field("token", &"<redacted>")
            .field("database_id", &self.database_id)
            .finish()
    }
}

impl NotionSettings {
    pub fn resolve(token: Option<String>, database_id: Option<String>) -> Result<Self, ConfigError> {
        let token = non_empty(token).ok_or(ConfigError::MissingCredential("NOTION_API_TOKEN"))?;
        let database_id = non_empty(database_id)
            .ok_or(ConfigError::MissingCredential("NOTION_DATABASE_ID (or --notion-db-id)"))?;
        Ok(Self { token, database_id })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loads `.env` from the working directory or a parent, if there is one.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}
