//! Saved backup configurations.
//!
//! A [`ConfigStore`] is a JSON document of the form `{"configs": [...]}` at a
//! path chosen by the caller. Configurations are keyed by name; saving a
//! configuration whose name already exists replaces it in place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::filter::FilterRecord;
use crate::filter_set::FilterSet;

/// One named backup: where from, where to, which filters, and the overwrite flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
    #[serde(default)]
    pub overwrite: bool,
}

impl Configuration {
    /// A configuration with only its name filled in.
    pub fn blank(name: impl Into<String>) -> Self {
        Configuration {
            name: name.into(),
            source_dir: PathBuf::new(),
            target_dir: PathBuf::new(),
            filters: Vec::new(),
            overwrite: false,
        }
    }

    /// Compile the stored filter records.
    pub fn filter_set(&self) -> Result<FilterSet> {
        FilterSet::from_records(&self.filters)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    configs: Vec<Configuration>,
}

/// JSON file holding any number of named configurations.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Point at `path`. Nothing is read until a query is made; a missing file
    /// behaves as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreDocument> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreDocument::default());
            }
            Err(e) => {
                return Err(EngineError::ConfigIo {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|e| EngineError::ConfigParse {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write(&self, doc: &StoreDocument) -> Result<()> {
        let io_error = |e: std::io::Error| EngineError::ConfigIo {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        // Fails on paths that are not valid UTF-8.
        let json = serde_json::to_string_pretty(doc).map_err(|e| EngineError::ConfigParse {
            path: self.path.clone(),
            source: e,
        })?;
        fs::write(&self.path, json).map_err(io_error)
    }

    pub fn load_all(&self) -> Result<Vec<Configuration>> {
        Ok(self.read()?.configs)
    }

    pub fn load(&self, name: &str) -> Result<Option<Configuration>> {
        Ok(self.read()?.configs.into_iter().find(|c| c.name == name))
    }

    pub fn name_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.configs.iter().any(|c| c.name == name))
    }

    /// Insert or replace `config`, keyed by name.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the name is empty, or the filter's own
    /// configuration error if a record is invalid. Nothing is written then.
    pub fn save(&self, config: &Configuration) -> Result<()> {
        if config.name.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration {
                reason: "configuration name must not be empty".to_string(),
            });
        }
        config.filter_set()?;

        let mut doc = self.read()?;
        match doc.configs.iter_mut().find(|c| c.name == config.name) {
            Some(existing) => *existing = config.clone(),
            None => doc.configs.push(config.clone()),
        }
        self.write(&doc)?;

        debug!(name = %config.name, store = %self.path.display(), "saved configuration");
        Ok(())
    }

    pub fn save_new_blank(&self, name: &str) -> Result<()> {
        self.save(&Configuration::blank(name))
    }

    /// Remove the configuration called `name`. Returns whether one was removed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut doc = self.read()?;
        let before = doc.configs.len();
        doc.configs.retain(|c| c.name != name);
        if doc.configs.len() == before {
            return Ok(false);
        }
        self.write(&doc)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Application, Filter, ItemType};

    fn sample(name: &str) -> Configuration {
        let filter =
            Filter::keyword("no-cache", "cache", Application::Paths, ItemType::Directory, false);
        Configuration {
            name: name.to_string(),
            source_dir: PathBuf::from("/home/me/docs"),
            target_dir: PathBuf::from("/mnt/backup/docs"),
            filters: vec![FilterRecord::from(&filter)],
            overwrite: true,
        }
    }

    #[test]
    fn test_missing_store_is_empty() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("configs.json"));

        assert!(store.load_all().unwrap().is_empty());
        assert!(store.load("docs").unwrap().is_none());
        assert!(!store.name_exists("docs").unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("nested/configs.json"));

        store.save(&sample("docs")).unwrap();
        store.save(&sample("photos")).unwrap();

        let loaded = store.load("docs").unwrap().expect("docs saved");
        assert_eq!(loaded, sample("docs"));
        assert_eq!(loaded.filter_set().unwrap().len(), 1);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_save_replaces_same_name() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("configs.json"));

        store.save(&sample("docs")).unwrap();
        let mut changed = sample("docs");
        changed.overwrite = false;
        store.save(&changed).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].overwrite);
    }

    #[test]
    fn test_save_rejects_empty_name_and_bad_filters() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("configs.json"));

        assert!(matches!(
            store.save(&sample("  ")),
            Err(EngineError::InvalidConfiguration { .. })
        ));

        let mut bad = sample("bad");
        bad.filters[0].filter_type = "GLOB".to_string();
        assert!(store.save(&bad).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_blank_and_delete() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("configs.json"));

        store.save_new_blank("draft").unwrap();
        assert!(store.name_exists("draft").unwrap());
        assert_eq!(store.load("draft").unwrap().unwrap(), Configuration::blank("draft"));

        assert!(store.delete("draft").unwrap());
        assert!(!store.delete("draft").unwrap());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_document_shape() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("configs.json"));
        store.save(&sample("docs")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let filter = &raw["configs"][0]["filters"][0];
        assert_eq!(filter["filter_type"], "KEYWORD");
        assert_eq!(filter["application"], "PATHS");
        assert_eq!(filter["item_type"], "DIRECTORY");
        assert_eq!(filter["whitelist"], false);
        assert_eq!(raw["configs"][0]["overwrite"], true);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_not_saved() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ConfigStore::open(temp_dir.path().join("configs.json"));
        let mut config = sample("raw");
        config.source_dir = PathBuf::from(OsStr::from_bytes(b"/data/\xff"));

        assert!(matches!(store.save(&config), Err(EngineError::ConfigParse { .. })));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_malformed_store() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("configs.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::open(&path);
        assert!(matches!(store.load_all(), Err(EngineError::ConfigParse { .. })));
    }
}
