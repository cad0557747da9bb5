use std::sync::Arc;

use eyrie_entry::{Entry, EntryId};
use eyrie_store::ContentStore;
use tracing::{info, warn};

use crate::error::IndexResult;
use crate::options::QueryOptions;
use crate::traits::IndexBackend;

/// Query facade over an index backend and the content store.
///
/// Backends answer with IDs; entries are loaded from the store. An ID whose
/// file has disappeared is removed from the backend and left out of the
/// result. Every other error propagates.
#[derive(Clone)]
pub struct Indexer {
    store: Arc<ContentStore>,
    backend: Arc<dyn IndexBackend>,
}

impl Indexer {
    pub fn new(store: Arc<ContentStore>, backend: Arc<dyn IndexBackend>) -> Self {
        Self { store, backend }
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.backend
    }

    pub fn add(&self, entries: &[Entry]) -> IndexResult<()> {
        self.backend.add(entries)
    }

    pub fn remove(&self, ids: &[EntryId]) -> IndexResult<()> {
        self.backend.remove(ids)
    }

    /// Index every non-list entry in the store. Returns how many were added.
    pub fn reindex(&self) -> IndexResult<usize> {
        let entries = self.store.get_all(false)?;
        self.backend.add(&entries)?;
        info!(count = entries.len(), "reindexed content");
        Ok(entries.len())
    }

    pub fn get_all(&self, opts: &QueryOptions) -> IndexResult<Vec<Entry>> {
        let ids = self.backend.get_all(opts)?;
        self.resolve(ids)
    }

    pub fn get_drafts(&self, opts: &QueryOptions) -> IndexResult<Vec<Entry>> {
        let ids = self.backend.drafts(opts)?;
        self.resolve(ids)
    }

    pub fn get_unlisted(&self, opts: &QueryOptions) -> IndexResult<Vec<Entry>> {
        let ids = self.backend.unlisted(opts)?;
        self.resolve(ids)
    }

    pub fn get_deleted(&self, opts: &QueryOptions) -> IndexResult<Vec<Entry>> {
        let ids = self.backend.deleted(opts)?;
        self.resolve(ids)
    }

    pub fn search(&self, opts: &QueryOptions) -> IndexResult<Vec<Entry>> {
        let ids = self.backend.search(opts)?;
        self.resolve(ids)
    }

    pub fn count(&self, opts: &QueryOptions) -> IndexResult<usize> {
        self.backend.count(opts)
    }

    fn resolve(&self, ids: Vec<EntryId>) -> IndexResult<Vec<Entry>> {
        let mut entries = Vec::with_capacity(ids.len());
        let mut stale = Vec::new();
        for id in ids {
            match self.store.get(&id) {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_not_found() => stale.push(id),
                Err(e) => return Err(e.into()),
            }
        }
        if !stale.is_empty() {
            warn!(count = stale.len(), ids = ?stale, "pruning index entries with no file");
            self.backend.remove(&stale)?;
        }
        Ok(entries)
    }
}
