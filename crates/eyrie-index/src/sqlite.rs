//! SQLite index backend with FTS5 full-text search.
//!
//! Status columns live in `entries`; titles and bodies are mirrored into the
//! `entries_fts` virtual table (porter tokenizer) and ranked with `bm25`.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use eyrie_entry::{Entry, EntryId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;

use crate::error::IndexResult;
use crate::options::{IndexRecord, QueryOptions, Selection};
use crate::traits::IndexBackend;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entries (
    id          TEXT PRIMARY KEY,
    draft       INTEGER NOT NULL,
    visibility  TEXT NOT NULL,
    expiry      INTEGER,
    published   INTEGER
);
CREATE INDEX IF NOT EXISTS entries_published ON entries (published);
CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
    id UNINDEXED,
    title,
    content,
    tokenize='porter'
);
";

pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex").finish_non_exhaustive()
    }
}

impl SqliteIndex {
    /// Open (or create) an index database file.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
        Self::init(conn)
    }

    /// Index that lives only as long as this value.
    pub fn open_in_memory() -> IndexResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> IndexResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn select(&self, selection: Selection, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        let mut values = Vec::new();
        let filter = where_clause(selection, opts, Utc::now(), &mut values);
        push_paging(opts, &mut values);

        let sql = format!(
            "SELECT e.id FROM entries e WHERE {filter}
             ORDER BY e.published IS NULL, e.published DESC, e.id
             LIMIT ? OFFSET ?"
        );
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .map(|r| r.map(EntryId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl IndexBackend for SqliteIndex {
    fn add(&self, entries: &[Entry]) -> IndexResult<()> {
        let mut conn = self.conn.lock().expect("index mutex poisoned");
        let tx = conn.transaction()?;
        for entry in entries {
            let r = IndexRecord::from_entry(entry);
            tx.execute("DELETE FROM entries_fts WHERE id = ?1", params![r.id.as_str()])?;
            tx.execute(
                "INSERT OR REPLACE INTO entries (id, draft, visibility, expiry, published)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    r.id.as_str(),
                    r.draft,
                    r.visibility,
                    r.expiry.map(|t| t.timestamp()),
                    r.published.map(|t| t.timestamp()),
                ],
            )?;
            tx.execute(
                "INSERT INTO entries_fts (id, title, content) VALUES (?1, ?2, ?3)",
                params![r.id.as_str(), r.title, r.content],
            )?;
        }
        tx.commit()?;
        debug!(count = entries.len(), "indexed entries");
        Ok(())
    }

    fn remove(&self, ids: &[EntryId]) -> IndexResult<()> {
        let mut conn = self.conn.lock().expect("index mutex poisoned");
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute("DELETE FROM entries WHERE id = ?1", params![id.as_str()])?;
            tx.execute("DELETE FROM entries_fts WHERE id = ?1", params![id.as_str()])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_all(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        self.select(Selection::Listed, opts)
    }

    fn drafts(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        self.select(Selection::Drafts, opts)
    }

    fn unlisted(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        self.select(Selection::Unlisted, opts)
    }

    fn deleted(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        self.select(Selection::Deleted, opts)
    }

    fn search(&self, opts: &QueryOptions) -> IndexResult<Vec<EntryId>> {
        let query = fts_query(opts.query.as_deref().unwrap_or_default());
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut values = vec![Value::Text(query)];
        let filter = where_clause(Selection::Listed, opts, Utc::now(), &mut values);
        push_paging(opts, &mut values);

        let sql = format!(
            "SELECT e.id FROM entries_fts JOIN entries e ON e.id = entries_fts.id
             WHERE entries_fts MATCH ? AND {filter}
             ORDER BY bm25(entries_fts), e.id
             LIMIT ? OFFSET ?"
        );
        let conn = self.conn.lock().expect("index mutex poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .map(|r| r.map(EntryId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn count(&self, opts: &QueryOptions) -> IndexResult<usize> {
        let mut values = Vec::new();
        let filter = where_clause(Selection::Listed, opts, Utc::now(), &mut values);
        let conn = self.conn.lock().expect("index mutex poisoned");
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM entries e WHERE {filter}"),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

/// SQL condition over alias `e` matching [`IndexRecord::admitted`].
fn where_clause(
    selection: Selection,
    opts: &QueryOptions,
    now: DateTime<Utc>,
    values: &mut Vec<Value>,
) -> String {
    let now = now.timestamp();
    let mut conds: Vec<String> = Vec::new();

    if !opts.visibility.is_empty() {
        let marks = vec!["?"; opts.visibility.len()].join(", ");
        conds.push(format!("e.visibility IN ({marks})"));
        values.extend(opts.visibility.iter().cloned().map(Value::Text));
    }

    let not_deleted = |conds: &mut Vec<String>, values: &mut Vec<Value>| {
        conds.push("(e.expiry IS NULL OR e.expiry > ?)".into());
        values.push(Value::Integer(now));
    };

    match selection {
        Selection::Deleted => {
            conds.push("(e.expiry IS NOT NULL AND e.expiry <= ?)".into());
            values.push(Value::Integer(now));
        }
        Selection::Drafts => {
            conds.push("e.draft = 1".into());
            if !opts.deleted {
                not_deleted(&mut conds, values);
            }
        }
        Selection::Unlisted => {
            conds.push("e.visibility = 'unlisted'".into());
            if !opts.drafts {
                conds.push("e.draft = 0".into());
            }
            if !opts.deleted {
                not_deleted(&mut conds, values);
            }
        }
        Selection::Listed => {
            if !opts.drafts {
                conds.push("e.draft = 0".into());
            }
            if !opts.deleted {
                not_deleted(&mut conds, values);
            }
            if !opts.unlisted && opts.visibility.is_empty() {
                conds.push("e.visibility <> 'unlisted'".into());
            }
        }
    }

    if conds.is_empty() {
        "1".into()
    } else {
        conds.join(" AND ")
    }
}

fn push_paging(opts: &QueryOptions, values: &mut Vec<Value>) {
    let limit = if opts.limit == 0 { -1 } else { opts.limit as i64 };
    values.push(Value::Integer(limit));
    values.push(Value::Integer(opts.offset() as i64));
}

/// Quote every term so user input cannot inject FTS5 syntax; terms are ANDed.
fn fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use eyrie_entry::FrontMatter;

    fn entry(id: &str, title: &str, body: &str, secs: i64) -> Entry {
        Entry::new(id, body).with_front_matter(FrontMatter {
            title: title.into(),
            published: Utc.timestamp_opt(secs, 0).single(),
            ..Default::default()
        })
    }

    fn ids(v: Vec<EntryId>) -> Vec<String> {
        v.into_iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn statuses_and_ordering() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let mut draft = entry("/draft/", "Draft", "wip", 50);
        draft.front_matter.draft = true;
        let mut unlisted = entry("/hidden/", "Hidden", "shh", 60);
        unlisted.front_matter.set("visibility", "unlisted");
        let mut gone = entry("/gone/", "Gone", "bye", 70);
        gone.front_matter.expiry = Some(Utc::now() - Duration::days(1));

        index
            .add(&[
                entry("/old/", "Old", "first post", 10),
                entry("/new/", "New", "second post", 20),
                draft,
                unlisted,
                gone,
            ])
            .unwrap();

        let opts = QueryOptions::default();
        assert_eq!(ids(index.get_all(&opts).unwrap()), ["/new/", "/old/"]);
        assert_eq!(ids(index.drafts(&opts).unwrap()), ["/draft/"]);
        assert_eq!(ids(index.unlisted(&opts).unwrap()), ["/hidden/"]);
        assert_eq!(ids(index.deleted(&opts).unwrap()), ["/gone/"]);
        assert_eq!(index.count(&opts).unwrap(), 2);
        assert_eq!(ids(index.get_all(&opts.clone().page(1, 1)).unwrap()), ["/old/"]);

        let everything = QueryOptions {
            drafts: true,
            deleted: true,
            unlisted: true,
            ..Default::default()
        };
        assert_eq!(index.count(&everything).unwrap(), 5);
    }

    #[test]
    fn full_text_search() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index
            .add(&[
                entry("/a/", "Walking in the hills", "We walked for hours.", 1),
                entry("/b/", "Cooking", "Bread \"recipes\" and more", 2),
            ])
            .unwrap();

        // Porter stemming: "walks" finds "walked"/"walking".
        assert_eq!(
            ids(index.search(&QueryOptions::default().query("walks")).unwrap()),
            ["/a/"]
        );
        assert_eq!(
            ids(index.search(&QueryOptions::default().query("\"recipes\" bread")).unwrap()),
            ["/b/"]
        );
        assert!(index.search(&QueryOptions::default().query("bread zebra")).unwrap().is_empty());
    }

    #[test]
    fn re_adding_replaces_and_remove_deletes() {
        let index = SqliteIndex::open_in_memory().unwrap();
        index.add(&[entry("/a/", "One", "apples", 1)]).unwrap();
        index.add(&[entry("/a/", "One", "oranges", 1)]).unwrap();

        let q = |s: &str| index.search(&QueryOptions::default().query(s)).unwrap();
        assert!(q("apples").is_empty());
        assert_eq!(ids(q("oranges")), ["/a/"]);

        index.remove(&[EntryId::new("/a/")]).unwrap();
        assert!(q("oranges").is_empty());
        assert_eq!(index.count(&QueryOptions::default()).unwrap(), 0);
    }

    #[test]
    fn persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        SqliteIndex::open(&path)
            .unwrap()
            .add(&[entry("/a/", "Kept", "on disk", 1)])
            .unwrap();

        let reopened = SqliteIndex::open(&path).unwrap();
        assert_eq!(ids(reopened.get_all(&QueryOptions::default()).unwrap()), ["/a/"]);
    }
}
