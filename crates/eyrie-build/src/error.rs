use eyrie_entry::EntryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The site generator exited non-zero. `output` is stdout and stderr combined.
    #[error("site generator failed: {command}\n{output}")]
    GeneratorFailed { command: String, output: String },

    /// No snapshot has been built or recovered yet.
    #[error("no snapshot is available")]
    NoSnapshot,

    /// The entry's permalink could not be computed.
    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Returns `true` when a rendered file is missing from the snapshot.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BuildError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
