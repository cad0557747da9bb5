use std::path::PathBuf;

/// Error type a [`Persister`] may return; boxed so the store does not depend
/// on the version-control crate.
pub type PersistError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Durability hook invoked after the store writes files.
///
/// Implementations must be thread-safe (`Send + Sync`). `files` are relative
/// to the store root. A persister records intent only; it must not modify
/// file contents.
pub trait Persister: Send + Sync {
    /// Track `files` as one logical change described by `message`.
    fn persist(&self, message: &str, files: &[PathBuf]) -> Result<(), PersistError>;
}
