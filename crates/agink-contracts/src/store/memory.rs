use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::KeyValueStore;

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        match self.entries.lock() {
            Ok(mut map) => {
                map.insert(key.to_string(), value.to_string());
            }
            Err(_) => tracing::warn!(key, "memory store lock poisoned; write dropped"),
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.entries.lock() {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyValueStore, MemoryStore};

    #[test]
    fn clones_share_entries() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.set("key", "value");
        assert_eq!(handle.get("key").as_deref(), Some("value"));
        handle.remove("key");
        assert!(store.get("key").is_none());
        assert!(store.is_empty());
    }
}
