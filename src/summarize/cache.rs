//! JSON file cache of generated summaries, keyed by item fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSummary {
    pub text: String,
    pub model: String,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SummaryCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CachedSummary>,
    dirty: bool,
}

impl SummaryCache {
    /// A cache that lives only for this run.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file, starting empty if it is missing or unreadable.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: PathBuf) -> Self {
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Summary cache is corrupt; starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, "Could not read summary cache; starting empty");
                BTreeMap::new()
            }
        };
        info!(entries = entries.len(), "Loaded summary cache");
        Self {
            path: Some(path),
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<&CachedSummary> {
        self.entries.get(fingerprint)
    }

    pub fn insert(&mut self, fingerprint: &str, text: &str, model: &str) {
        self.entries.insert(
            fingerprint.to_string(),
            CachedSummary {
                text: text.to_string(),
                model: model.to_string(),
                cached_at: Utc::now(),
            },
        );
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Write the cache back if anything changed.
    #[instrument(level = "info", skip_all)]
    pub async fn save(&mut self) -> Result<(), Box<dyn Error>> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(path, json).await?;
        self.dirty = false;
        info!(path = %path.display(), entries = self.entries.len(), "Saved summary cache");
        Ok(())
    }
}
