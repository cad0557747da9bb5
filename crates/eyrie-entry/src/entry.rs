use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EntryError, EntryResult};
use crate::frontmatter::FrontMatter;
use crate::id::EntryId;
use crate::value::Value;

/// One content item: a post, a page, or a section/taxonomy index.
///
/// Neither the permalink nor the list flag is stored; both are recomputed
/// from the ID, the front matter, and site-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub front_matter: FrontMatter,
    pub content: String,
}

impl Entry {
    /// Create an entry with the given ID and body and empty front matter.
    pub fn new(id: impl Into<EntryId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            front_matter: FrontMatter::default(),
            content: content.into(),
        }
    }

    /// Builder-style front matter replacement.
    pub fn with_front_matter(mut self, front_matter: FrontMatter) -> Self {
        self.front_matter = front_matter;
        self
    }

    /// Absolute URL of the entry on the published site.
    ///
    /// A string `url` key in the front matter overrides the path derived
    /// from the ID, mirroring the site generator's behaviour.
    pub fn permalink(&self, base_url: &Url) -> EntryResult<Url> {
        let path = match self.front_matter.get("url").and_then(Value::as_str) {
            Some(custom) => crate::id::clean_id(custom),
            None => self.id.as_str().to_string(),
        };

        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| EntryError::InvalidUrl(format!("{base_url} + {path}: {e}")))
    }

    /// Returns `true` if this entry is a list page under `layout`.
    pub fn is_list(&self, layout: &SiteLayout) -> bool {
        layout.is_list(&self.id)
    }
}

/// Site-wide rules that decide which IDs are list (section/taxonomy) pages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLayout {
    /// Taxonomy names, e.g. `tags`. Both `/tags/` and `/tags/<term>/` are lists.
    #[serde(default)]
    pub taxonomies: Vec<String>,
    /// Section names, e.g. `posts`. Only `/posts/` itself is a list.
    #[serde(default)]
    pub sections: Vec<String>,
}

impl SiteLayout {
    pub fn new(taxonomies: Vec<String>, sections: Vec<String>) -> Self {
        Self { taxonomies, sections }
    }

    /// The home page is always a list; so are taxonomy pages, taxonomy terms
    /// and section roots.
    pub fn is_list(&self, id: &EntryId) -> bool {
        let segments: Vec<&str> = id.segments().collect();
        match segments.as_slice() {
            [] => true,
            [first] => {
                self.taxonomies.iter().any(|t| t == first)
                    || self.sections.iter().any(|s| s == first)
            }
            [first, _term] => self.taxonomies.iter().any(|t| t == first),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SiteLayout {
        SiteLayout::new(vec!["tags".into()], vec!["posts".into()])
    }

    #[test]
    fn permalink_from_id() {
        let base = Url::parse("https://example.com").unwrap();
        let entry = Entry::new("posts/hello", "x");
        assert_eq!(
            entry.permalink(&base).unwrap().as_str(),
            "https://example.com/posts/hello/"
        );
    }

    #[test]
    fn permalink_keeps_base_path_prefix() {
        let base = Url::parse("https://example.com/blog").unwrap();
        let entry = Entry::new("/posts/hello/", "x");
        assert_eq!(
            entry.permalink(&base).unwrap().as_str(),
            "https://example.com/blog/posts/hello/"
        );
    }

    #[test]
    fn permalink_honours_url_override() {
        let base = Url::parse("https://example.com/").unwrap();
        let mut entry = Entry::new("/posts/hello/", "x");
        entry.front_matter.set("url", "/about");
        assert_eq!(
            entry.permalink(&base).unwrap().as_str(),
            "https://example.com/about/"
        );
    }

    #[test]
    fn permalink_is_pure() {
        let base = Url::parse("https://example.com/").unwrap();
        let entry = Entry::new("/a/b/", "x");
        assert_eq!(entry.permalink(&base).unwrap(), entry.permalink(&base).unwrap());
    }

    #[test]
    fn list_detection() {
        let layout = layout();
        assert!(layout.is_list(&EntryId::root()));
        assert!(layout.is_list(&EntryId::new("/tags/")));
        assert!(layout.is_list(&EntryId::new("/tags/rust/")));
        assert!(layout.is_list(&EntryId::new("/posts/")));
        assert!(!layout.is_list(&EntryId::new("/posts/hello/")));
        assert!(!layout.is_list(&EntryId::new("/tags/rust/extra/")));
        assert!(!layout.is_list(&EntryId::new("/about/")));
        assert!(Entry::new("/tags/x/", "").is_list(&layout));
    }
}
