//! Process-wide keyed registries for pluggable collaborators.
//!
//! Registries are populated at startup and frozen in normal operation.
//! Tests may snapshot and restore them around re-registration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct Registry<T: ?Sized + Send + Sync> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized + Send + Sync> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register an implementation under a key, replacing any previous
    /// binding for the same key.
    pub fn register(&self, key: impl Into<String>, value: Arc<T>) {
        self.entries.write().unwrap().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    /// Registered keys, lexically sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Capture the current bindings for later restoration.
    pub fn snapshot(&self) -> HashMap<String, Arc<T>> {
        self.entries.read().unwrap().clone()
    }

    /// Restore bindings captured by [`Registry::snapshot`].
    pub fn restore(&self, snapshot: HashMap<String, Arc<T>>) {
        *self.entries.write().unwrap() = snapshot;
    }
}

impl<T: ?Sized + Send + Sync> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
