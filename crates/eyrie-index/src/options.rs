use chrono::{DateTime, Utc};
use eyrie_entry::{Entry, EntryId};

/// Paging and filtering for index queries.
///
/// The `drafts`, `deleted` and `unlisted` flags widen a query to include
/// entries in that state; by default they are left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Zero-based page number.
    pub page: usize,
    /// Page size; zero means no limit.
    pub limit: usize,
    pub drafts: bool,
    pub deleted: bool,
    pub unlisted: bool,
    /// When non-empty, only entries with one of these visibilities match.
    pub visibility: Vec<String>,
    /// Free-text query for `search`.
    pub query: Option<String>,
}

impl QueryOptions {
    pub fn page(mut self, page: usize, limit: usize) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub(crate) fn offset(&self) -> usize {
        self.page.saturating_mul(self.limit)
    }

    /// Apply paging to an already filtered, ordered list.
    pub(crate) fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset());
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit).collect()
        }
    }
}

/// Which status a query selects on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Published entries, widened by the option flags.
    Listed,
    Drafts,
    Unlisted,
    Deleted,
}

/// What an index keeps per entry.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRecord {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub draft: bool,
    pub visibility: String,
    pub expiry: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
}

impl IndexRecord {
    pub fn from_entry(entry: &Entry) -> Self {
        let fm = &entry.front_matter;
        Self {
            id: entry.id.clone(),
            title: fm.title.clone(),
            content: entry.content.clone(),
            draft: fm.draft,
            visibility: fm.visibility().to_string(),
            expiry: fm.expiry,
            published: fm.published,
        }
    }

    pub fn is_deleted(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|e| e <= now)
    }

    pub fn is_unlisted(&self) -> bool {
        self.visibility == "unlisted"
    }

    /// Returns `true` if the record belongs in `selection` under `opts`.
    pub fn admitted(&self, selection: Selection, opts: &QueryOptions, now: DateTime<Utc>) -> bool {
        let deleted = self.is_deleted(now);
        if !opts.visibility.is_empty() && !opts.visibility.iter().any(|v| *v == self.visibility) {
            return false;
        }
        match selection {
            Selection::Deleted => deleted,
            Selection::Drafts => self.draft && (!deleted || opts.deleted),
            Selection::Unlisted => {
                self.is_unlisted() && (!self.draft || opts.drafts) && (!deleted || opts.deleted)
            }
            Selection::Listed => {
                (!self.draft || opts.drafts)
                    && (!deleted || opts.deleted)
                    && (!self.is_unlisted() || opts.unlisted || !opts.visibility.is_empty())
            }
        }
    }
}
