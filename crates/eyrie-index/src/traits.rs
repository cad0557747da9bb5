use eyrie_entry::{Entry, EntryId};

use crate::error::IndexResult;
use crate::options::QueryOptions;

/// Storage behind the [`Indexer`](crate::Indexer).
///
/// Queries return IDs only; the facade loads entries from the content store.
/// Results are ordered newest `published` first unless stated otherwise.
pub trait IndexBackend: Send + Sync {
    /// Insert or replace entries.
    fn add(&self, entries: &[Entry]) -> IndexResult<()>;

    /// Drop entries by ID; unknown IDs are ignored.
    fn remove(&self, ids: &[EntryId]) -> IndexResult<()>;

    fn get_all(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>>;

    fn drafts(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>>;

    fn unlisted(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>>;

    fn deleted(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>>;

    /// Entries matching `opts.query`, best match first. An empty query
    /// matches nothing.
    fn search(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>>;

    /// Number of entries `get_all` would return without paging.
    fn count(&self, opts: &QueryOptions) -> IndexResult<usize>;
}
