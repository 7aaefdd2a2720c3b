use chrono::Utc;
use uuid::Uuid;

use super::item::{HistoryItem, NewHistoryItem};
use crate::store::{KeyValueStore, HISTORY_KEY};

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bounded, newest-first list of completed interactions.
///
/// The list is only ever mutated by prepend-and-trim inside [`HistoryCache::append`]
/// and is rewritten to the store after every mutation.
#[derive(Debug, Clone)]
pub struct HistoryCache<S: KeyValueStore> {
    store: S,
    items: Vec<HistoryItem>,
    capacity: usize,
}

impl<S: KeyValueStore> HistoryCache<S> {
    pub fn load(store: S) -> Self {
        Self::load_with_capacity(store, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn load_with_capacity(store: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut items = read_history(&store);
        items.truncate(capacity);
        Self {
            store,
            items,
            capacity,
        }
    }

    /// Stamps `entry` with a fresh id and timestamp, prepends it and trims the
    /// oldest items beyond capacity.
    pub fn append(&mut self, entry: NewHistoryItem) -> &[HistoryItem] {
        let now = Utc::now().timestamp_millis();
        let timestamp = match self.items.first() {
            Some(newest) if newest.timestamp() >= now => newest.timestamp() + 1,
            _ => now,
        };
        let item = entry.stamp(Uuid::new_v4().to_string(), timestamp);
        tracing::debug!(id = item.id(), kind = item.kind(), "history append");

        self.items.insert(0, item);
        self.items.truncate(self.capacity);
        self.persist();
        &self.items
    }

    pub fn find(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// 1-based position in newest-first order.
    pub fn get(&self, position: usize) -> Option<&HistoryItem> {
        position
            .checked_sub(1)
            .and_then(|idx| self.items.get(idx))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.store.remove(HISTORY_KEY);
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&self) {
        match serde_json::to_string(&self.items) {
            Ok(encoded) => self.store.set(HISTORY_KEY, &encoded),
            Err(err) => tracing::warn!("history encode failed: {err}"),
        }
    }
}

fn read_history(store: &impl KeyValueStore) -> Vec<HistoryItem> {
    let Some(raw) = store.get(HISTORY_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<HistoryItem>>(&raw) {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!("stored history unreadable, starting empty: {err}");
            Vec::new()
        }
    }
}
