//! In-process store with change subscriptions

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{ChangeEvent, KeyValueStore, StoreError};

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, Value>,
    subscribers: Vec<Sender<ChangeEvent>>,
}

/// Shared in-memory store.
///
/// Clones are handles to the same data, so a writer and a reactor in the same
/// process can each hold one. Every write that changes a value is announced to
/// all live subscribers.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive a [`ChangeEvent`] for every subsequent write that changes a value.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock().entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let old_value = inner.entries.insert(key.to_string(), value.clone());

        if old_value.as_ref() == Some(&value) {
            return Ok(());
        }

        let event = ChangeEvent::new(key, old_value, Some(value));
        // Drop subscribers whose receiver is gone
        inner.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        Ok(())
    }
}
