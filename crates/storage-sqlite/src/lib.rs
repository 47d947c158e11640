//! SQLite implementation of the catchlog storage port.

pub mod db;
pub mod errors;
pub mod local_state;
pub mod schema;

pub use db::{create_pool, get_connection, init, run_migrations, DbPool};
pub use errors::StorageError;
pub use local_state::SqliteKeyValueStore;
