use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{TokenStore, TOKEN_KEY};

/// Storage file name in cache directory
const STORAGE_FILE: &str = "storage.json";

/// A persisted value and when it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub value: String,
    pub stored_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(value: String) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.stored_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Key-value file in the cache directory.
///
/// Only the `token` entry is managed here; other keys found in the file are
/// written back untouched.
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load the token entry with its timestamp
    pub fn load_entry(&self) -> Result<Option<StoredToken>> {
        let mut entries = self.read_entries()?;
        match entries.remove(TOKEN_KEY) {
            Some(value) => {
                let entry = serde_json::from_value(value)
                    .context("Failed to parse stored token entry")?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// When the current token was written, if one is stored
    pub fn stored_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.load_entry()?.map(|e| e.stored_at))
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        let path = self.storage_path();
        if !path.exists() {
            return Ok(Map::new());
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read token storage file")?;
        serde_json::from_str(&contents).context("Failed to parse token storage file")
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        let path = self.storage_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&path, contents).context("Failed to write token storage file")?;
        Ok(())
    }

    fn storage_path(&self) -> PathBuf {
        self.cache_dir.join(STORAGE_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.load_entry()?.map(|e| e.value))
    }

    /// Fails without writing when the existing file cannot be parsed.
    fn set(&self, token: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        let entry = serde_json::to_value(StoredToken::new(token.to_string()))?;
        entries.insert(TOKEN_KEY.to_string(), entry);
        self.write_entries(&entries)?;
        debug!(path = ?self.storage_path(), "Token saved");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.storage_path();
        if !path.exists() {
            return Ok(());
        }
        let mut entries = self.read_entries()?;
        if entries.remove(TOKEN_KEY).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            std::fs::remove_file(&path)?;
        } else {
            self.write_entries(&entries)?;
        }
        debug!(path = ?path, "Token removed");
        Ok(())
    }
}
