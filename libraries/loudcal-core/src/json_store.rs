//! JSON-file backed preference store
//!
//! The whole store lives in one file shaped as
//! `{ "<namespace>": { "<key>": <value>, ... }, ... }` and is rewritten with
//! temp-file + rename on every commit.

use crate::error::{CoreError, Result};
use crate::fs::write_file_atomic;
use crate::prefs::{KeyValueStore, Namespace};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

type Document = BTreeMap<String, Map<String, Value>>;

/// Preference store persisted as a single JSON document
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<Document>,
}

impl JsonFileStore {
    /// Open a store, starting empty when the file does not exist
    ///
    /// A file that exists but cannot be parsed is an error; it is never
    /// silently replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Document::new()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            debug!("Preference file {:?} not found, starting empty", path);
            Document::new()
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, document: &Document) -> Result<()> {
        let text = serde_json::to_string_pretty(document)?;
        write_file_atomic(&self.path, text.as_bytes()).map_err(|e| {
            warn!("Failed to persist preferences to {:?}: {}", self.path, e);
            e
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        let document = self
            .document
            .lock()
            .map_err(|_| CoreError::storage("preference lock poisoned"))?;
        Ok(document
            .get(namespace.as_str())
            .and_then(|section| section.get(key))
            .cloned())
    }

    fn set_many(&self, namespace: Namespace, entries: &[(&str, Value)]) -> Result<()> {
        let mut document = self
            .document
            .lock()
            .map_err(|_| CoreError::storage("preference lock poisoned"))?;
        let section = document.entry(namespace.as_str().to_string()).or_default();
        for (key, value) in entries {
            section.insert((*key).to_string(), value.clone());
        }
        self.persist(&document)
    }

    fn remove(&self, namespace: Namespace, key: &str) -> Result<()> {
        let mut document = self
            .document
            .lock()
            .map_err(|_| CoreError::storage("preference lock poisoned"))?;
        let removed = document
            .get_mut(namespace.as_str())
            .and_then(|section| section.remove(key))
            .is_some();
        if removed {
            self.persist(&document)?;
        }
        Ok(())
    }
}
