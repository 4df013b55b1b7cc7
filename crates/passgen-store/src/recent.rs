//! Recently used key lists
//!
//! Tracks list names in use order so a shell can reopen the last one.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// File name inside the store directory
pub const RECENT_FILE: &str = "keylists.meta.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentLists {
    #[serde(default)]
    names: Vec<String>,
}

impl RecentLists {
    /// Load from `dir`. A missing or unreadable file yields an empty history.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(RECENT_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, dir: &Path) -> Result<(), StoreError> {
        let path = dir.join(RECENT_FILE);
        let json = serde_json::to_string(self)?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
    }

    /// Mark `name` as the most recently used.
    pub fn touch(&mut self, name: &str) {
        self.names.retain(|n| n != name);
        self.names.push(name.to_string());
    }

    pub fn forget(&mut self, name: &str) {
        self.names.retain(|n| n != name);
    }

    pub fn last(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    /// Oldest first
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
