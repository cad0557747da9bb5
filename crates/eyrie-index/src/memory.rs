//! In-memory index backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use eyrie_entry::{Entry, EntryId};

use crate::error::IndexResult;
use crate::options::{IndexRecord, QueryOptions, Selection};
use crate::traits::IndexBackend;

/// Index held in a `BTreeMap`; also records every removal it is asked for.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: RwLock<BTreeMap<EntryId, IndexRecord>>,
    removed: Mutex<Vec<EntryId>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every ID passed to `remove`, oldest first.
    pub fn removed(&self) -> Vec<EntryId> {
        self.removed.lock().expect("index mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, selection: Selection, opts: &QueryOptions) -> Vec<IndexRecord> {
        let now = Utc::now();
        let records = self.records.read().expect("index lock poisoned");
        let mut hits: Vec<IndexRecord> = records
            .values()
            .filter(|r| r.admitted(selection, opts, now))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.published.cmp(&a.published).then_with(|| a.id.cmp(&b.id)));
        hits
    }

    fn ids(&self, selection: Selection, opts: &QueryOptions) -> Vec<EntryId> {
        opts.paginate(self.select(selection, opts))
            .into_iter()
            .map(|r| r.id)
            .collect()
    }
}

impl IndexBackend for MemoryIndex {
    fn add(&self, entries: &[Entry]) -> IndexResult<()> {
        let mut records = self.records.write().expect("index lock poisoned");
        for entry in entries {
            records.insert(entry.id.clone(), IndexRecord::from_entry(entry));
        }
        Ok(())
    }

    fn remove(&self, ids: &[EntryId]) -> IndexResult<()> {
        let mut records = self.records.write().expect("index lock poisoned");
        for id in ids {
            records.remove(id);
        }
        self.removed
            .lock()
            .expect("index mutex poisoned")
            .extend(ids.iter().cloned());
        Ok(())
    }

    fn get_all(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        Ok(self.ids(Selection::Listed, opts))
    }

    fn drafts(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        Ok(self.ids(Selection::Drafts, opts))
    }

    fn unlisted(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        Ok(self.ids(Selection::Unlisted, opts))
    }

    fn deleted(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        Ok(self.ids(Selection::Deleted, opts))
    }

    fn search(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        let terms: Vec<String> = opts
            .query
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let hits: Vec<IndexRecord> = self
            .select(Selection::Listed, opts)
            .into_iter()
            .filter(|r| {
                let haystack = format!("{} {}", r.title, r.content).to_lowercase();
                terms.iter().all(|t| haystack.contains(t.as_str()))
            })
            .collect();
        Ok(opts.paginate(hits).into_iter().map(|r| r.id).collect())
    }

    fn count(&self, opts: &QueryOptions) -> IndexResult<usize> {
        Ok(self.select(Selection::Listed, opts).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use eyrie_entry::FrontMatter;

    fn entry(id: &str, title: &str, secs: i64, draft: bool) -> Entry {
        Entry::new(id, format!("{title} body text")).with_front_matter(FrontMatter {
            title: title.into(),
            draft,
            published: Utc.timestamp_opt(secs, 0).single(),
            ..Default::default()
        })
    }

    fn ids(v: Vec<EntryId>) -> Vec<String> {
        v.into_iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn orders_newest_first_and_pages() {
        let index = MemoryIndex::new();
        index
            .add(&[
                entry("/a/", "Alpha", 100, false),
                entry("/b/", "Beta", 300, false),
                entry("/c/", "Gamma", 200, false),
                entry("/d/", "Draft", 400, true),
            ])
            .unwrap();

        let opts = QueryOptions::default();
        assert_eq!(ids(index.get_all(&opts).unwrap()), ["/b/", "/c/", "/a/"]);
        assert_eq!(ids(index.get_all(&opts.clone().page(1, 2)).unwrap()), ["/a/"]);
        assert_eq!(ids(index.drafts(&opts).unwrap()), ["/d/"]);
        assert_eq!(index.count(&opts).unwrap(), 3);
    }

    #[test]
    fn search_matches_all_terms() {
        let index = MemoryIndex::new();
        index
            .add(&[entry("/a/", "Rust notes", 1, false), entry("/b/", "Go notes", 2, false)])
            .unwrap();

        let found = index.search(&QueryOptions::default().query("RUST notes")).unwrap();
        assert_eq!(ids(found), ["/a/"]);
        assert!(index.search(&QueryOptions::default().query("  ")).unwrap().is_empty());
    }

    #[test]
    fn remove_is_recorded() {
        let index = MemoryIndex::new();
        index.add(&[entry("/a/", "A", 1, false)]).unwrap();
        index.remove(&[EntryId::new("/a/"), EntryId::new("/zzz/")]).unwrap();
        assert!(index.is_empty());
        assert_eq!(ids(index.removed()), ["/a/", "/zzz/"]);
    }
}
