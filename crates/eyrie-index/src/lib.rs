//! Entry index for Eyrie.
//!
//! An [`IndexBackend`] answers status and full-text queries with entry IDs;
//! the [`Indexer`] facade turns those into entries via the content store and
//! prunes IDs whose files are gone. Backends are chosen at start-up through
//! a [`BackendRegistry`].

pub mod error;
pub mod indexer;
pub mod memory;
pub mod options;
pub mod registry;
pub mod sqlite;
pub mod traits;

pub use error::{IndexError, IndexResult};
pub use indexer::Indexer;
pub use memory::MemoryIndex;
pub use options::{IndexRecord, QueryOptions, Selection};
pub use registry::{BackendConstructor, BackendRegistry, IndexConfig};
pub use sqlite::SqliteIndex;
pub use traits::IndexBackend;
