use std::sync::Arc;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::Result;

use super::{KeyValueStore, StorageKey};

/// Read and decode one key for display.
///
/// Missing, unreadable and undecodable values all come back as `None`: the
/// local store is a cache of work in progress and a damaged entry must not
/// take the caller down with it. Never feed the result into a write; use
/// [`load_json`] for read-modify-write paths.
pub(crate) fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: StorageKey) -> Option<T> {
    match load_json(store, key) {
        Ok(value) => value,
        Err(err) => {
            warn!("[Storage] Failed to read {}: {}", key, err);
            None
        }
    }
}

/// Read and decode one key ahead of a write.
///
/// A failing read is returned as an error so it can never turn into an empty
/// document that overwrites the stored one. A document that no longer
/// decodes still reads as missing.
pub(crate) fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: StorageKey,
) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!("[Storage] Discarding unreadable value for {}: {}", key, err);
            Ok(None)
        }
    }
}

/// A stored list as loaded for a write. Records that no longer decode are
/// carried along untouched and written back after the readable ones.
pub(crate) struct StoredRecords<T> {
    pub records: Vec<T>,
    pub unreadable: Vec<serde_json::Value>,
}

impl<T: DeserializeOwned> StoredRecords<T> {
    fn decode(key: StorageKey, values: Vec<serde_json::Value>) -> Self {
        let mut records = Vec::with_capacity(values.len());
        let mut unreadable = Vec::new();
        for value in values {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!("[Storage] Skipping unreadable record in {}: {}", key, err);
                    unreadable.push(value);
                }
            }
        }
        Self {
            records,
            unreadable,
        }
    }
}

/// Lenient list read for display; see [`read_json`].
pub(crate) fn read_records<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: StorageKey,
) -> Vec<T> {
    read_json::<Vec<serde_json::Value>>(store, key)
        .map(|values| StoredRecords::decode(key, values).records)
        .unwrap_or_default()
}

/// Strict list read ahead of a write; see [`load_json`].
pub(crate) fn load_records<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: StorageKey,
) -> Result<StoredRecords<T>> {
    let values = load_json::<Vec<serde_json::Value>>(store, key)?.unwrap_or_default();
    Ok(StoredRecords::decode(key, values))
}

pub(crate) fn save_records<T: Serialize>(
    store: &dyn KeyValueStore,
    key: StorageKey,
    stored: &StoredRecords<T>,
) -> Result<()> {
    let mut values = stored
        .records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    values.extend(stored.unreadable.iter().cloned());
    write_json(store, key, &values)
}

pub(crate) fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: StorageKey,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw)
}

/// Owner of the whole persisted state, used for logout and debug resets.
#[derive(Clone)]
pub struct LocalState {
    store: Arc<dyn KeyValueStore>,
}

impl LocalState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn init(&self) -> Result<()> {
        self.store.init()
    }

    /// Clear a single key.
    pub fn clear_key(&self, key: StorageKey) -> Result<()> {
        self.store.remove(key)
    }

    /// Clear reports, pending index, government queue, history and identities.
    pub fn reset(&self) -> Result<()> {
        self.store.clear()?;
        info!("[Storage] Local state reset");
        Ok(())
    }
}
