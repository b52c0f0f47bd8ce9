//! File-based subscription store. The whole state is one JSON document,
//! rewritten on every mutation and read once at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use shelfwatch_core::error::{Result, ShelfwatchError};
use shelfwatch_core::types::Subscription;

/// Whole-file JSON persistence for the subscription map.
pub struct SubscriptionStore {
    path: PathBuf,
}

impl SubscriptionStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.to_path_buf(),
        }
    }

    fn file(&self) -> PathBuf {
        self.path.join("subscriptions.json")
    }

    /// Overwrite the persisted document with a full snapshot.
    pub fn save(&self, subscriptions: &BTreeMap<i64, Subscription>) -> Result<()> {
        let file = self.file();
        let json = serde_json::to_string_pretty(subscriptions)?;
        std::fs::write(&file, &json)
            .map_err(|e| ShelfwatchError::Store(format!("Write error: {e}")))?;
        tracing::debug!(
            "Saved {} subscriptions to {}",
            subscriptions.len(),
            file.display()
        );
        Ok(())
    }

    /// Load the persisted document. A missing or corrupt file means
    /// "start empty", never a startup failure.
    pub fn load(&self) -> BTreeMap<i64, Subscription> {
        let file = self.file();
        if !file.exists() {
            tracing::info!("No existing subscriptions file, starting fresh");
            return BTreeMap::new();
        }
        match std::fs::read_to_string(&file) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse subscriptions.json: {e}");
                BTreeMap::new()
            }),
            Err(e) => {
                tracing::warn!("Failed to read subscriptions.json: {e}");
                BTreeMap::new()
            }
        }
    }
}
