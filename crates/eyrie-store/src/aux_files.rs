//! Site-wide redirect and removal lists.
//!
//! Both are plain text at the store root. `redirects` holds one
//! `<from> <to>` pair per line; `gone` holds one path per line. Blank lines
//! and lines starting with `#` are ignored.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::error::StoreResult;
use crate::store::ContentStore;

/// Filename of the redirect list.
pub const REDIRECTS_FILE: &str = "redirects";
/// Filename of the removed-paths list.
pub const GONE_FILE: &str = "gone";

impl ContentStore {
    /// Parse the redirect list. A missing file is an empty map.
    pub fn redirects(&self) -> StoreResult<BTreeMap<String, String>> {
        let text = self.read_text_or_empty(REDIRECTS_FILE)?;
        let mut map = BTreeMap::new();
        for (lineno, line) in meaningful_lines(&text) {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(from), Some(to), None) => {
                    map.insert(from.to_string(), to.to_string());
                }
                _ => warn!(line = lineno, content = line, "skipping malformed redirect"),
            }
        }
        Ok(map)
    }

    /// Append one redirect and persist the file.
    pub fn append_redirect(&self, from: &str, to: &str) -> StoreResult<()> {
        let mut text = self.read_text_or_empty(REDIRECTS_FILE)?;
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!("{from} {to}\n"));
        self.write_file(
            REDIRECTS_FILE,
            text.as_bytes(),
            &format!("redirect {from} to {to}"),
        )
    }

    /// Parse the removed-paths list. A missing file is an empty set.
    pub fn gone(&self) -> StoreResult<BTreeSet<String>> {
        let text = self.read_text_or_empty(GONE_FILE)?;
        Ok(meaningful_lines(&text)
            .map(|(_, line)| line.to_string())
            .collect())
    }

    fn read_text_or_empty(&self, name: &str) -> StoreResult<String> {
        match self.read_file(name) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.is_not_found() => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

fn meaningful_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}
