//! Content store for Eyrie.
//!
//! The [`ContentStore`] owns a directory tree laid out for the site generator
//! and is the only component allowed to mutate it:
//!
//! ```text
//! <root>/
//!   content/<id>/index.md      regular entry
//!   content/<id>/_index.md     list (section or taxonomy) entry
//!   content/<id>/sidecar.json  external interactions (see eyrie-webmention)
//!   redirects                  "<from> <to>" per line
//!   gone                       one removed path per line
//! ```
//!
//! # Durability
//!
//! Every successful write hands the touched filenames to a [`Persister`].
//! In production that is the git-backed sync engine, which batches them into
//! the next commit; tests use the in-memory persisters from [`memory`].
//!
//! # Design Rules
//!
//! 1. Paths given to the store are relative to the root and may not escape it.
//! 2. Single files are written atomically (temp file + rename).
//! 3. Multi-file writes are all-or-error but not rolled back: files written
//!    before a failure stay on disk and are *not* handed to the persister.
//! 4. The store does no locking; concurrent writers to one entry must
//!    coordinate externally.

pub mod atomic;
pub mod aux_files;
pub mod error;
pub mod memory;
pub mod store;
pub mod traits;

pub use aux_files::{GONE_FILE, REDIRECTS_FILE};
pub use error::{StoreError, StoreResult};
pub use memory::{NoopPersister, RecordingPersister};
pub use store::{ContentStore, CONTENT_DIR, INDEX_FILE, LIST_INDEX_FILE};
pub use traits::{PersistError, Persister};
