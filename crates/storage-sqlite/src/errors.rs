use thiserror::Error;

/// Failures of the SQLite layer. Converted into the engine's storage error
/// at the crate boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for catchlog_core::Error {
    fn from(err: StorageError) -> Self {
        catchlog_core::Error::Storage(err.to_string())
    }
}
