//! In-memory configuration store.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ConfigStore                                              │
//! │  ├── values: DashMap<CompositeKey, String>  (lookups)     │
//! │  ├── items:  RwLock<Vec<ConfigItem>>        (group view)  │
//! │  └── loaded_from_local: AtomicBool                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Full loads replace both views; push deltas mutate them key by key. The two
//! writers are not serialized against each other: a reload may overwrite a
//! delta applied moments earlier. The version fingerprint catches any drift.

mod fingerprint;


pub use fingerprint::FingerprintAlgorithm;

use confsync_types::{CompositeKey, ConfigItem};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// Concurrent key/value view of the configuration set.
#[derive(Debug, Default)]
pub struct ConfigStore {
    values: DashMap<CompositeKey, String>,
    items: RwLock<Vec<ConfigItem>>,
    loaded_from_local: AtomicBool,
    algorithm: FingerprintAlgorithm,
}

impl ConfigStore {
    pub fn new(algorithm: FingerprintAlgorithm) -> Self {
        Self { algorithm, ..Default::default() }
    }

    /// Case-insensitive lookup by composite key (`group:key` or `key`).
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(&CompositeKey::from(key)).map(|v| v.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&CompositeKey::from(key))
    }

    /// Items of the given group, in load order.
    pub fn get_group(&self, group: &str) -> Vec<ConfigItem> {
        self.items.read().iter().filter(|item| item.group_name() == Some(group)).cloned().collect()
    }

    /// Copy of every key/value pair, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.iter().map(|e| (e.key().to_string(), e.value().clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace the whole set with the result of a full load.
    ///
    /// When two items share a composite key the first one wins. Readers never
    /// observe an empty map in between unless the new set is itself empty.
    pub fn replace_all(&self, items: Vec<ConfigItem>) {
        let mut fresh: HashMap<CompositeKey, String> = HashMap::with_capacity(items.len());
        for item in &items {
            fresh.entry(item.composite_key()).or_insert_with(|| item.value.clone());
        }

        // Drop stale keys, and keys whose spelling changed so they get re-inserted as sent.
        self.values.retain(|key, _| {
            fresh.get_key_value(key).is_some_and(|(fresh_key, _)| fresh_key.as_str() == key.as_str())
        });
        for (key, value) in fresh {
            self.values.insert(key, value);
        }

        *self.items.write() = items;
    }

    /// Insert or overwrite one item; returns its composite key.
    pub fn upsert(&self, item: &ConfigItem) -> CompositeKey {
        let key = item.composite_key();
        self.values.insert(key.clone(), item.value.clone());

        let mut items = self.items.write();
        match items.iter_mut().find(|existing| existing.composite_key() == key) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        key
    }

    /// Remove one item by its composite key. Returns whether anything was removed.
    pub fn remove(&self, item: &ConfigItem) -> bool {
        let key = item.composite_key();
        let removed = self.values.remove(&key).is_some();
        self.items.write().retain(|existing| existing.composite_key() != key);
        removed
    }

    /// Order-independent digest over all current keys and values.
    pub fn fingerprint(&self) -> String {
        let mut keys = Vec::with_capacity(self.values.len());
        let mut values = Vec::with_capacity(self.values.len());
        for entry in &self.values {
            keys.push(entry.key().to_string());
            values.push(entry.value().clone());
        }
        fingerprint::compute(self.algorithm, keys, values)
    }

    pub fn is_loaded_from_local(&self) -> bool {
        self.loaded_from_local.load(Ordering::SeqCst)
    }

    pub(crate) fn set_loaded_from_local(&self, local: bool) {
        self.loaded_from_local.store(local, Ordering::SeqCst);
    }
}
