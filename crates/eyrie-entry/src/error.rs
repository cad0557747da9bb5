use thiserror::Error;

/// Errors produced while parsing, encoding, or addressing entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    /// The text is not a front-matter block followed by a body.
    #[error("malformed entry: {0}")]
    Malformed(String),

    /// The front-matter block is not valid YAML for the entry schema.
    #[error("invalid front matter: {0}")]
    FrontMatter(String),

    /// A permalink could not be derived from the base URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Convenience alias used throughout the entry crate.
pub type EntryResult<T> = Result<T, EntryError>;
