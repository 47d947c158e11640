use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Logical keys of the persisted local state.
///
/// Each key holds one JSON document and can be read or cleared on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKey {
    Reports,
    PendingSync,
    SubmissionQueue,
    SubmissionHistory,
    CachedMember,
    DeviceIdentity,
}

impl StorageKey {
    pub const ALL: [StorageKey; 6] = [
        StorageKey::Reports,
        StorageKey::PendingSync,
        StorageKey::SubmissionQueue,
        StorageKey::SubmissionHistory,
        StorageKey::CachedMember,
        StorageKey::DeviceIdentity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Reports => "catchlog.reports",
            StorageKey::PendingSync => "catchlog.pending_sync",
            StorageKey::SubmissionQueue => "catchlog.submission_queue",
            StorageKey::SubmissionHistory => "catchlog.submission_history",
            StorageKey::CachedMember => "catchlog.cached_member",
            StorageKey::DeviceIdentity => "catchlog.device_identity",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage port for device-local state.
///
/// Values are opaque strings (JSON documents). Implementations only need to
/// be durable per key; callers never rely on multi-key atomicity except for
/// [`KeyValueStore::remove_many`].
pub trait KeyValueStore: Send + Sync {
    /// Prepare the backing store. Safe to call more than once.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn get(&self, key: StorageKey) -> Result<Option<String>>;

    fn set(&self, key: StorageKey, value: String) -> Result<()>;

    fn remove(&self, key: StorageKey) -> Result<()>;

    /// Remove several keys as one operation from the caller's perspective.
    fn remove_many(&self, keys: &[StorageKey]) -> Result<()>;

    /// Drop every key this engine owns.
    fn clear(&self) -> Result<()> {
        self.remove_many(&StorageKey::ALL)
    }
}

/// Process-local store used by tests and by hosts that do not need durability.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: RwLock<HashMap<StorageKey, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::storage("In-memory store lock is poisoned")
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        let values = self.values.read().map_err(|_| Self::poisoned())?;
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: String) -> Result<()> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        values.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        values.remove(&key);
        Ok(())
    }

    fn remove_many(&self, keys: &[StorageKey]) -> Result<()> {
        let mut values = self.values.write().map_err(|_| Self::poisoned())?;
        for key in keys {
            values.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_are_unique() {
        let mut names = StorageKey::ALL
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), StorageKey::ALL.len());
    }

    #[test]
    fn clear_drops_every_key() {
        let store = InMemoryKeyValueStore::new();
        for key in StorageKey::ALL {
            store.set(key, "[]".to_string()).expect("set");
        }

        store.clear().expect("clear");

        for key in StorageKey::ALL {
            assert_eq!(store.get(key).expect("get"), None);
        }
    }
}
