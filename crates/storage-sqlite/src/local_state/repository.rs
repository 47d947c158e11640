use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

use catchlog_core::storage::{KeyValueStore, StorageKey};
use catchlog_core::Result;

use super::model::LocalStateDB;
use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::local_state;

/// [`KeyValueStore`] over the `local_state` table.
pub struct SqliteKeyValueStore {
    pool: Arc<DbPool>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Keys currently holding a value.
    pub fn stored_keys(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let keys = local_state::table
            .select(local_state::key)
            .order(local_state::key.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(keys)
    }

    fn delete_keys(conn: &mut SqliteConnection, keys: Vec<&str>) -> QueryResult<usize> {
        diesel::delete(local_state::table.filter(local_state::key.eq_any(keys))).execute(conn)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn init(&self) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        local_state::table
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let row = local_state::table
            .find(key.as_str())
            .select(LocalStateDB::as_select())
            .first::<LocalStateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(|r| r.value))
    }

    fn set(&self, key: StorageKey, value: String) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().to_rfc3339();
        let row = LocalStateDB {
            key: key.as_str().to_string(),
            value,
            updated_at: now,
        };
        diesel::insert_into(local_state::table)
            .values(&row)
            .on_conflict(local_state::key)
            .do_update()
            .set((
                local_state::value.eq(&row.value),
                local_state::updated_at.eq(&row.updated_at),
            ))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::delete(local_state::table.find(key.as_str()))
            .execute(&mut conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn remove_many(&self, keys: &[StorageKey]) -> Result<()> {
        let names = keys.iter().map(StorageKey::as_str).collect::<Vec<_>>();
        let requested = names.len();
        let mut conn = get_connection(&self.pool)?;
        let removed = conn
            .immediate_transaction(|conn| Self::delete_keys(conn, names))
            .map_err(StorageError::from)?;
        debug!("[Storage] Removed {} of {} keys", removed, requested);
        Ok(())
    }
}
