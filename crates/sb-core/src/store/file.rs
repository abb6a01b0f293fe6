//! JSON file store and its polling watcher
//!
//! The file holds one JSON object mapping keys to values. Writes go to a
//! sibling temp file which is then renamed over the original, so a reader in
//! another process sees either the old or the new contents, never a mix.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::{Map, Value};

use super::{ChangeEvent, KeyValueStore, StoreError};

/// Store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every key. A missing file is an empty store.
    pub fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StoreError::Unavailable(e)),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupted {
            key: self.path.display().to_string(),
            source,
        })
    }

    fn write_all(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(entries).map_err(StoreError::Encode)?;
        let tmp_path = self.temp_path();
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("Wrote {} key(s) to {}", entries.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StoreError::Corrupted { source, .. }) => {
                // Single writer: its snapshot replaces the unreadable file
                warn!("Replacing unreadable store {}: {}", self.path.display(), source);
                Map::new()
            }
            Err(e) => return Err(e),
        };

        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }
}

/// Turns modifications of a [`FileStore`] made by another process into
/// [`ChangeEvent`]s.
///
/// Each [`poll`](Self::poll) rereads the file and diffs it against the
/// previous snapshot, emitting one event per key whose value changed.
#[derive(Debug)]
pub struct StoreWatcher {
    store: FileStore,
    snapshot: Map<String, Value>,
}

impl StoreWatcher {
    /// Start watching from the file's current contents.
    ///
    /// An unreadable file counts as empty; the first successful poll then
    /// reports every key it finds.
    pub fn new(store: FileStore) -> Self {
        let snapshot = store.read_all().unwrap_or_else(|e| {
            warn!("Starting watch on unreadable store {}: {}", store.path().display(), e);
            Map::new()
        });
        Self { store, snapshot }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Reread the file and report changed keys.
    ///
    /// On error the previous snapshot is kept, so the change is reported by
    /// the first poll that reads the file successfully.
    pub fn poll(&mut self) -> Result<Vec<ChangeEvent>, StoreError> {
        let current = self.store.read_all()?;
        let mut events = Vec::new();

        for (key, new_value) in &current {
            let old_value = self.snapshot.get(key);
            if old_value != Some(new_value) {
                events.push(ChangeEvent::new(key.clone(), old_value.cloned(), Some(new_value.clone())));
            }
        }

        for (key, old_value) in &self.snapshot {
            if !current.contains_key(key) {
                events.push(ChangeEvent::new(key.clone(), Some(old_value.clone()), None));
            }
        }

        if !events.is_empty() {
            debug!("{} key(s) changed in {}", events.len(), self.store.path().display());
        }

        self.snapshot = current;
        Ok(events)
    }
}
