use crate::models::Source;
use serde::{Deserialize, Serialize};

const MAX_ERROR_LEN: usize = 180;

/// Outcome of fetching one search page, kept in the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchDiagnostic {
    pub source: Source,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchDiagnostic {
    pub fn found(source: Source, url: &str, found: usize) -> Self {
        Self {
            source,
            url: url.to_string(),
            found: Some(found),
            error: None,
        }
    }

    pub fn failed(source: Source, url: &str, error: &anyhow::Error) -> Self {
        let message: String = format!("{error:#}").chars().take(MAX_ERROR_LEN).collect();
        Self {
            source,
            url: url.to_string(),
            found: None,
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
