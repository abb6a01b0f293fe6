//! Keyed persistent stores
//!
//! A store maps string keys to JSON values. The group collection lives under
//! a single key; every write replaces the whole value. Writers announce
//! changes as [`ChangeEvent`]s carrying the before/after snapshot, either
//! directly ([`MemoryStore::subscribe`]) or through a [`StoreWatcher`] that
//! polls a [`FileStore`] written by another process.

mod file;
mod memory;

pub use file::{FileStore, StoreWatcher};
pub use memory::MemoryStore;

use serde_json::Value;

/// Error type for store access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
    #[error("Corrupted value under '{key}': {source}")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A keyed store of JSON values.
pub trait KeyValueStore {
    /// Read the value under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value under `key`.
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Notification that the value under a key changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
        }
    }

    /// Whether the before and after snapshots differ.
    pub fn is_change(&self) -> bool {
        self.old_value != self.new_value
    }
}
