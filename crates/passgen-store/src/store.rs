//! Directory of named key lists

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use passgen_core::{DocumentError, KeyListDocument, DEFAULT_ITERATION_COUNT};
use thiserror::Error;

use crate::legacy::parse_legacy;
use crate::recent::RecentLists;

/// Extension of current-format lists
pub const CURRENT_EXTENSION: &str = ".keys.json";

/// Extension of legacy text lists
pub const LEGACY_EXTENSION: &str = ".keys";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid key list name: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a loaded list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrigin {
    /// `NAME.keys.json`
    Current,
    /// `NAME.keys`, parsed from the legacy text format
    Legacy,
    /// No file yet; a fresh document
    Created,
}

#[derive(Debug)]
pub struct LoadedList {
    pub document: KeyListDocument,
    pub origin: ListOrigin,
}

pub struct KeyListStore {
    dir: PathBuf,
    default_iterations: u32,
}

impl KeyListStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            default_iterations: DEFAULT_ITERATION_COUNT,
        })
    }

    /// Iteration count given to lists created by [`KeyListStore::load`]
    pub fn with_default_iterations(mut self, iterations: u32) -> Result<Self, StoreError> {
        if iterations == 0 {
            return Err(StoreError::Document(DocumentError::Malformed(
                "iteration count must be at least 1".to_string(),
            )));
        }
        self.default_iterations = iterations;
        Ok(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}{}", name, CURRENT_EXTENSION)))
    }

    pub fn legacy_path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}{}", name, LEGACY_EXTENSION)))
    }

    /// Whether a list of either format exists under `name`
    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(name)?.is_file() || self.legacy_path_for(name)?.is_file())
    }

    /// Names of all lists in the directory, sorted
    pub fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let read_dir = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut names = BTreeSet::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let file_name = dir_entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let name = file_name
                .strip_suffix(CURRENT_EXTENSION)
                .or_else(|| file_name.strip_suffix(LEGACY_EXTENSION));
            if let Some(name) = name {
                if validate_name(name).is_ok() {
                    names.insert(name.to_string());
                }
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Load `name`, preferring the JSON file over the legacy one.
    ///
    /// A name with no file yields a fresh document; nothing is written
    /// until [`KeyListStore::save`].
    pub fn load(&self, name: &str) -> Result<LoadedList, StoreError> {
        let path = self.path_for(name)?;
        if path.is_file() {
            let json = read(&path)?;
            let document = KeyListDocument::from_json(&json)?;
            log::debug!("Loaded key list '{}' from {}", name, path.display());
            return Ok(LoadedList {
                document,
                origin: ListOrigin::Current,
            });
        }

        let legacy_path = self.legacy_path_for(name)?;
        if legacy_path.is_file() {
            let text = read(&legacy_path)?;
            let document = parse_legacy(&text)?;
            log::info!(
                "Loaded legacy key list '{}' from {}; it will be saved as {}",
                name,
                legacy_path.display(),
                path.display()
            );
            return Ok(LoadedList {
                document,
                origin: ListOrigin::Legacy,
            });
        }

        log::debug!("Key list '{}' does not exist yet", name);
        Ok(LoadedList {
            document: KeyListDocument::new(self.default_iterations)?,
            origin: ListOrigin::Created,
        })
    }

    /// Write `document` as `NAME.keys.json`, replacing any previous file.
    pub fn save(&self, name: &str, document: &KeyListDocument) -> Result<(), StoreError> {
        document.validate()?;
        let path = self.path_for(name)?;
        let json = document.to_json_pretty()?;

        let tmp_path = self.dir.join(format!(".{}{}.tmp", name, CURRENT_EXTENSION));
        std::fs::write(&tmp_path, json).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("Saved key list '{}' to {}", name, path.display());

        let mut recent = RecentLists::load(&self.dir);
        recent.touch(name);
        if let Err(e) = recent.save(&self.dir) {
            log::warn!("Failed to record recent key list: {}", e);
        }

        Ok(())
    }

    /// Most recently saved list name, if it still exists
    pub fn last_used(&self) -> Option<String> {
        let recent = RecentLists::load(&self.dir);
        recent
            .last()
            .filter(|name| self.exists(name).unwrap_or(false))
            .map(str::to_string)
    }
}

fn read(path: &Path) -> Result<String, StoreError> {
    std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use passgen_core::{Entry, OutputMode, SchemeVersion};
    use tempfile::TempDir;

    fn store() -> (TempDir, KeyListStore) {
        let dir = TempDir::new().unwrap();
        let store = KeyListStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = KeyListStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn test_load_missing_creates_fresh_document() {
        let (_dir, store) = store();
        let store = store.with_default_iterations(4000).unwrap();
        let loaded = store.load("Default").unwrap();
        assert_eq!(loaded.origin, ListOrigin::Created);
        assert_eq!(loaded.document.master().iteration_count(), 4000);
        assert_eq!(loaded.document.scheme_version(), SchemeVersion::CURRENT);
        assert!(!store.exists("Default").unwrap());
    }

    #[test]
    fn test_zero_default_iterations_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.with_default_iterations(0),
            Err(StoreError::Document(DocumentError::Malformed(_)))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = store();
        let mut doc = KeyListDocument::default();
        doc.push_entry(Entry::new("b.example")).unwrap();
        doc.push_entry(
            Entry::new("a.example")
                .with_output_mode(OutputMode::AlphanumericOnly)
                .with_max_length(10),
        )
        .unwrap();

        store.save("work", &doc).unwrap();
        assert!(store.exists("work").unwrap());

        let loaded = store.load("work").unwrap();
        assert_eq!(loaded.origin, ListOrigin::Current);
        assert_eq!(loaded.document, doc);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (dir, store) = store();
        store.save("work", &KeyListDocument::default()).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{:?}", names);
    }

    #[test]
    fn test_json_preferred_over_legacy() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("mixed.keys"), "legacy-label\n").unwrap();

        let mut doc = KeyListDocument::default();
        doc.push_entry(Entry::new("json-label")).unwrap();
        store.save("mixed", &doc).unwrap();

        let loaded = store.load("mixed").unwrap();
        assert_eq!(loaded.origin, ListOrigin::Current);
        assert_eq!(loaded.document.entries()[0].label, "json-label");
        // legacy file untouched
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mixed.keys")).unwrap(),
            "legacy-label\n"
        );
    }

    #[test]
    fn test_list_names() {
        let (dir, store) = store();
        store.save("work", &KeyListDocument::default()).unwrap();
        store.save("Default", &KeyListDocument::default()).unwrap();
        std::fs::write(dir.path().join("old.keys"), "label\n").unwrap();
        std::fs::write(dir.path().join("work.keys"), "label\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list_names().unwrap(), ["Default", "old", "work"]);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let (_dir, store) = store();
        for name in ["", ".", "..", "../escape", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(store.load(name), Err(StoreError::InvalidName(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_corrupt_json_is_document_error() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("broken.keys.json"), "{ nope").unwrap();
        assert!(matches!(
            store.load("broken"),
            Err(StoreError::Document(DocumentError::Malformed(_)))
        ));

        std::fs::write(
            dir.path().join("future.keys.json"),
            r#"{ "schemeVersion": 9, "master": {} }"#,
        )
        .unwrap();
        assert!(matches!(
            store.load("future"),
            Err(StoreError::Document(DocumentError::UnexpectedSchemeVersion(9)))
        ));
    }

    #[test]
    fn test_last_used_tracks_saves() {
        let (_dir, store) = store();
        assert_eq!(store.last_used(), None);

        store.save("home", &KeyListDocument::default()).unwrap();
        store.save("work", &KeyListDocument::default()).unwrap();
        assert_eq!(store.last_used().as_deref(), Some("work"));

        store.save("home", &KeyListDocument::default()).unwrap();
        assert_eq!(store.last_used().as_deref(), Some("home"));
    }
}
