//! The previous run's listings, kept as a JSON file next to the scripts.
//!
//! A snapshot is read once at the start of a run and never modified; the run
//! builds a fresh one and swaps it in with a temp-file rename when it finishes.

use crate::config::Requirements;
use crate::models::Listing;
use crate::scrapers::FetchDiagnostic;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Notion page written for a listing, and the listing content it was written with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub diagnostics: Vec<FetchDiagnostic>,
    #[serde(default)]
    pub count_raw: usize,
    #[serde(default)]
    pub count_deduped: usize,
    #[serde(default)]
    pub count_quality_pass: usize,
    #[serde(default)]
    pub count_quality_fail: usize,
    #[serde(default)]
    pub quality_reasons: BTreeMap<String, usize>,
    #[serde(default)]
    pub listings: Vec<Listing>,
    /// Identity key -> Notion page
    #[serde(default)]
    pub pages: BTreeMap<String, PageRecord>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty() && self.pages.is_empty()
    }

    /// Compare this snapshot with the current listing set by identity key.
    pub fn diff(&self, current: &[Listing]) -> SnapshotDiff {
        let previous: HashMap<&str, String> = self
            .listings
            .iter()
            .map(|l| (l.identity_key.as_str(), l.fingerprint()))
            .collect();

        let mut diff = SnapshotDiff::default();
        for listing in current {
            match previous.get(listing.identity_key.as_str()) {
                None => diff.added.push(listing.identity_key.clone()),
                Some(fp) if *fp == listing.fingerprint() => {
                    diff.unchanged.push(listing.identity_key.clone())
                }
                Some(_) => diff.changed.push(listing.identity_key.clone()),
            }
        }

        let present: HashSet<&str> =
            current.iter().map(|l| l.identity_key.as_str()).collect();
        diff.removed = self
            .listings
            .iter()
            .filter(|l| !present.contains(l.identity_key.as_str()))
            .map(|l| l.identity_key.clone())
            .collect();

        diff
    }
}

/// Identity keys grouped by how they moved between two runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last snapshot. A missing file is a first run, not an error.
    pub async fn load(&self) -> Result<Snapshot> {
        if !fs::try_exists(&self.path)
            .await
            .with_context(|| format!("checking snapshot {}", self.path.display()))?
        {
            info!("No snapshot at {}, starting fresh", self.path.display());
            return Ok(Snapshot::default());
        }

        let data = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&data)
            .with_context(|| format!("parsing snapshot {}", self.path.display()))?;
        debug!(
            "Loaded snapshot with {} listings and {} pages",
            snapshot.listings.len(),
            snapshot.pages.len()
        );
        Ok(snapshot)
    }

    /// Replace the snapshot file atomically (write temp file, then rename).
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot.json");
        let temp_path = parent.join(format!(".{file_name}.{}.tmp", std::process::id()));

        let json = serde_json::to_string_pretty(snapshot).context("serializing snapshot")?;
        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("opening temp snapshot {}", temp_path.display()))?;
        file.write_all(json.as_bytes())
            .await
            .with_context(|| format!("writing temp snapshot {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp snapshot {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "renaming temp snapshot {} -> {}",
                    temp_path.display(),
                    self.path.display()
                )
            });
        }
        Ok(())
    }
}
