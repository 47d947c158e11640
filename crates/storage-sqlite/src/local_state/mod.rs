//! Key-value rows backing the engine's persisted state.

mod model;
mod repository;

pub use model::LocalStateDB;
pub use repository::SqliteKeyValueStore;
