use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use eyrie_entry::EntryId;
use serde::{Deserialize, Serialize};

/// What kind of response a mention is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionType {
    Reply,
    Like,
    Repost,
    Bookmark,
    Rsvp,
    #[default]
    Mention,
}

impl MentionType {
    /// Map a microformats `wm-property` (e.g. `like-of`) to a type.
    pub fn from_property(property: &str) -> Self {
        match property {
            "in-reply-to" => Self::Reply,
            "like-of" => Self::Like,
            "repost-of" => Self::Repost,
            "bookmark-of" => Self::Bookmark,
            "rsvp" => Self::Rsvp,
            _ => Self::Mention,
        }
    }

    /// Likes, reposts, bookmarks and RSVPs are interactions; everything else
    /// is listed with the replies.
    pub fn is_interaction(self) -> bool {
        matches!(self, Self::Like | Self::Repost | Self::Bookmark | Self::Rsvp)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub photo: String,
}

/// One external interaction with an entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(rename = "type", default)]
    pub kind: MentionType,
    /// URL of the responding post.
    #[serde(default)]
    pub url: String,
    /// URL the webmention was sent from, when it differs from `url`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    /// Identifier assigned by the receiving service.
    #[serde(rename = "wm-id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Local entry the interaction targets, set on receipt.
    #[serde(rename = "entry-id", default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<EntryId>,
    /// Fields this version does not interpret, kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Mention {
    pub fn new(kind: MentionType, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            ..Default::default()
        }
    }

    /// Returns `true` if either identifying URL equals one of `keys`.
    pub(crate) fn matches_any(&self, keys: &[&str]) -> bool {
        keys.iter()
            .filter(|k| !k.is_empty())
            .any(|k| self.url == *k || self.source == *k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(MentionType::from_property("like-of").is_interaction());
        assert!(MentionType::from_property("rsvp").is_interaction());
        assert!(!MentionType::from_property("in-reply-to").is_interaction());
        assert_eq!(MentionType::from_property("mention-of"), MentionType::Mention);
        assert!(!MentionType::Mention.is_interaction());
    }

    #[test]
    fn keeps_unknown_fields() {
        let json = r#"{"type":"like","url":"https://a.example/1","author":{"name":"A"},"wm-id":"9","swarm":{"venue":"x"}}"#;
        let m: Mention = serde_json::from_str(json).unwrap();
        assert_eq!(m.kind, MentionType::Like);
        assert_eq!(m.id.as_deref(), Some("9"));
        assert!(m.extra.contains_key("swarm"));

        let back: serde_json::Value = serde_json::to_value(&m).unwrap();
        assert_eq!(back["swarm"]["venue"], "x");
        assert!(back.get("entry-id").is_none());
    }

    #[test]
    fn entry_id_is_a_field_not_extra() {
        let json = r#"{"type":"reply","url":"https://a.example/1","entry-id":"posts/hello"}"#;
        let m: Mention = serde_json::from_str(json).unwrap();
        assert_eq!(m.entry_id, Some(EntryId::new("/posts/hello/")));
        assert!(m.extra.is_empty());
    }

    #[test]
    fn matching_ignores_empty_keys() {
        let mut m = Mention::new(MentionType::Reply, "https://a.example/1");
        m.source = "https://bridge.example/a".into();
        assert!(m.matches_any(&["https://bridge.example/a"]));
        assert!(m.matches_any(&["", "https://a.example/1"]));
        assert!(!m.matches_any(&[""]));
    }
}
