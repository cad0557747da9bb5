use eyrie_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// No constructor is registered for the configured backend kind.
    #[error("unknown index backend: {0}")]
    UnknownBackend(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
