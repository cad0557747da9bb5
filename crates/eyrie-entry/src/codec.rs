//! Text codec for entries.
//!
//! On-disk format:
//! ```text
//! ---\n
//! <front matter as YAML>
//! ---\n
//! \n
//! <markdown body>\n
//! ```
//! Line endings are normalized to `\n` in both directions, and the body is
//! stored without leading blank lines or trailing whitespace.

use crate::entry::Entry;
use crate::error::{EntryError, EntryResult};
use crate::frontmatter::FrontMatter;
use crate::id::EntryId;

const SEPARATOR: &str = "---";

/// Parse the textual form of an entry.
///
/// The text must open with a `---` line and contain a closing `---` line;
/// the first closing line ends the front matter, so later `---` lines belong
/// to the body.
pub fn decode(id: impl Into<EntryId>, text: &str) -> EntryResult<Entry> {
    let text = normalize_newlines(text);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let rest = text
        .strip_prefix(SEPARATOR)
        .and_then(|r| r.strip_prefix('\n'))
        .ok_or_else(|| EntryError::Malformed("missing opening front-matter separator".into()))?;

    let (yaml, body) = split_at_separator(rest)
        .ok_or_else(|| EntryError::Malformed("missing closing front-matter separator".into()))?;

    let front_matter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| EntryError::FrontMatter(e.to_string()))?
    };

    Ok(Entry {
        id: id.into(),
        front_matter,
        content: normalize_body(body).to_string(),
    })
}

/// Serialize an entry to its textual form.
///
/// Front matter is emitted with recognized keys first in a fixed order,
/// followed by extension keys in sorted order, so equal entries always
/// produce identical bytes.
pub fn encode(entry: &Entry) -> EntryResult<String> {
    let mut yaml = serde_yaml::to_string(&entry.front_matter)
        .map_err(|e| EntryError::FrontMatter(e.to_string()))?;
    if yaml.trim() == "{}" {
        yaml.clear();
    }

    let body = normalize_newlines(&entry.content);
    Ok(format!(
        "{SEPARATOR}\n{yaml}{SEPARATOR}\n\n{}\n",
        normalize_body(&body)
    ))
}

/// Find the first line that is exactly the separator and split around it.
fn split_at_separator(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches('\n') == SEPARATOR {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn normalize_body(body: &str) -> &str {
    body.trim_start_matches('\n').trim_end()
}
