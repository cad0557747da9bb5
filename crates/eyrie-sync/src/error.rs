use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A git subprocess exited non-zero. `output` is its stderr, verbatim.
    #[error("git command failed: {command}\n{output}")]
    CommandFailed { command: String, output: String },

    /// `git` could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
