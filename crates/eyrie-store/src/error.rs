use std::path::PathBuf;

use eyrie_entry::EntryError;

use crate::traits::PersistError;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested file or entry does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A path is absolute or tries to leave the store root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The entry file exists but cannot be decoded or encoded.
    #[error(transparent)]
    Entry(#[from] EntryError),

    /// JSON (de)serialization failure for a data file.
    #[error("json error in {}: {reason}", path.display())]
    Json { path: PathBuf, reason: String },

    /// The persister refused to track the written files.
    #[error("persist failed: {0}")]
    Persist(#[source] PersistError),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` if the error means "no such file or entry".
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns `true` if the error is a malformed entry file.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            StoreError::Entry(EntryError::Malformed(_) | EntryError::FrontMatter(_))
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
