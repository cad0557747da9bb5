use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonicalize an entry path.
///
/// The result always begins and ends with `/`, contains no empty, `.` or
/// `..` segments, and is a fixed point: `clean_id(&clean_id(x)) == clean_id(x)`.
///
/// ```
/// use eyrie_entry::clean_id;
///
/// assert_eq!(clean_id("posts/hello"), "/posts/hello/");
/// assert_eq!(clean_id("/a//b/../c/"), "/a/c/");
/// assert_eq!(clean_id(""), "/");
/// ```
pub fn clean_id(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}/", segments.join("/"))
}

/// Canonical identifier of an entry.
///
/// Construction always goes through [`clean_id`], so two `EntryId`s compare
/// equal exactly when they address the same directory in the content tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    /// Build an ID from any path-like string, cleaning it.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(clean_id(raw.as_ref()))
    }

    /// The root entry (`/`), i.e. the home page.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the root entry.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments between the slashes (`/a/b/` yields `["a", "b"]`).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The ID as a path relative to the content root (`a/b`), empty for root.
    pub fn relative_path(&self) -> &str {
        self.0.trim_matches('/')
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntryId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for EntryId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl AsRef<str> for EntryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adds_leading_and_trailing_slash() {
        assert_eq!(clean_id("posts/hello"), "/posts/hello/");
        assert_eq!(clean_id("/posts/hello"), "/posts/hello/");
        assert_eq!(clean_id("posts/hello/"), "/posts/hello/");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(clean_id("/a/./b/"), "/a/b/");
        assert_eq!(clean_id("/a/b/../c"), "/a/c/");
        assert_eq!(clean_id("/../../a"), "/a/");
        assert_eq!(clean_id("a//b///c"), "/a/b/c/");
    }

    #[test]
    fn empty_and_root_become_slash() {
        assert_eq!(clean_id(""), "/");
        assert_eq!(clean_id("/"), "/");
        assert_eq!(clean_id("//"), "/");
        assert_eq!(clean_id(".."), "/");
    }

    #[test]
    fn entry_id_accessors() {
        let id = EntryId::new("posts/2024/hello");
        assert_eq!(id.as_str(), "/posts/2024/hello/");
        assert_eq!(id.relative_path(), "posts/2024/hello");
        assert_eq!(id.segments().collect::<Vec<_>>(), vec!["posts", "2024", "hello"]);
        assert!(!id.is_root());
        assert!(EntryId::root().is_root());
        assert_eq!(EntryId::root().relative_path(), "");
    }

    #[test]
    fn serde_cleans_on_the_way_in() {
        let id: EntryId = serde_json::from_str("\"posts/x\"").unwrap();
        assert_eq!(id.as_str(), "/posts/x/");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"/posts/x/\"");
    }

    proptest! {
        #[test]
        fn clean_is_idempotent(raw in "[a-z./]{0,24}") {
            let once = clean_id(&raw);
            prop_assert_eq!(clean_id(&once), once.clone());
        }

        #[test]
        fn clean_is_slash_delimited(raw in "[a-z0-9./-]{0,24}") {
            let cleaned = clean_id(&raw);
            prop_assert!(cleaned.starts_with('/'));
            prop_assert!(cleaned.ends_with('/'));
            prop_assert!(!cleaned.contains("//"));
        }
    }
}
