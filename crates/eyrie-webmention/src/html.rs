//! Just enough HTML scanning for webmentions: links inside an entry's
//! `e-content` element, and `rel="webmention"` endpoint declarations.
//!
//! This is tag-level regex matching, not a parser; it handles rendered
//! generator output, not arbitrary markup.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

fn content_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*["'][^"']*\be-content\b[^"']*["'][^>]*>"#)
            .expect("e-content regex must compile")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(/?)([a-z][a-z0-9]*)\b[^>]*?(/?)>").expect("tag regex must compile")
    })
}

fn element_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(a|link)\b([^>]*)>").expect("element regex must compile")
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\b([a-z-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("attribute regex must compile")
    })
}

/// The inner HTML of the first `e-content` element, if any.
pub fn content_region(html: &str) -> Option<&str> {
    let open = content_open_re().captures(html)?;
    let whole = open.get(0)?;
    let name = open.get(1)?.as_str().to_ascii_lowercase();
    let start = whole.end();

    let mut depth = 1usize;
    for tag in tag_re().captures_iter(&html[start..]) {
        if !tag[2].eq_ignore_ascii_case(&name) || !tag[3].is_empty() {
            continue;
        }
        if tag[1].is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                let end = start + tag.get(0).map_or(0, |m| m.start());
                return Some(&html[start..end]);
            }
        }
    }
    // Unclosed: take the rest of the document.
    Some(&html[start..])
}

/// Absolute http(s) links inside the entry's content region, first
/// occurrence order, without duplicates.
pub fn content_links(html: &str) -> Vec<Url> {
    let Some(region) = content_region(html) else {
        return Vec::new();
    };

    let mut links: Vec<Url> = Vec::new();
    for element in element_re().captures_iter(region) {
        if !element[1].eq_ignore_ascii_case("a") {
            continue;
        }
        let Some(href) = attribute(&element[2], "href") else {
            continue;
        };
        let Ok(mut url) = Url::parse(&href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

/// `href` of the first `<link>` or `<a>` whose `rel` includes `webmention`.
pub fn find_endpoint(html: &str) -> Option<String> {
    element_re().captures_iter(html).find_map(|element| {
        let attrs = &element[2];
        let rel = attribute(attrs, "rel")?;
        if !rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("webmention")) {
            return None;
        }
        attribute(attrs, "href")
    })
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    attr_re().captures_iter(attrs).find_map(|c| {
        if !c[1].eq_ignore_ascii_case(name) {
            return None;
        }
        let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?;
        Some(unescape(value.as_str()))
    })
}

fn unescape(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
