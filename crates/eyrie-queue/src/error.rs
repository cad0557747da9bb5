use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Errors from SQLite, passed through verbatim.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;
