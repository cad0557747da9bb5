//! Inbound notifications from a webmention receiving service.
//!
//! The service POSTs `{source, secret, deleted, target, post}` where `post`
//! is the responding page as JF2.

use chrono::{DateTime, Utc};
use eyrie_entry::EntryId;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::engine::WebmentionEngine;
use crate::error::{WebmentionError, WebmentionResult};
use crate::mention::{Author, Mention, MentionType};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InboundPayload {
    pub source: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub deleted: bool,
    pub target: String,
    #[serde(default)]
    pub post: Jf2Post,
}

/// The subset of a JF2 post that ends up in a sidecar.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Jf2Post {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub content: Option<Jf2Content>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(rename = "wm-received", default)]
    pub received: Option<String>,
    #[serde(rename = "wm-id", default)]
    pub id: Option<serde_json::Value>,
    #[serde(rename = "wm-property", default)]
    pub property: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Jf2Content {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
}

impl Jf2Post {
    /// Convert to a sidecar record. `source` fills in a missing URL.
    pub fn into_mention(self, source: &str) -> Mention {
        let content = self
            .content
            .map(|c| if c.text.trim().is_empty() { c.html } else { c.text })
            .unwrap_or_default();
        let published = self
            .published
            .as_deref()
            .and_then(parse_time)
            .or_else(|| self.received.as_deref().and_then(parse_time));
        let id = self.id.and_then(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let url = if self.url.is_empty() {
            source.to_string()
        } else {
            self.url
        };
        Mention {
            kind: MentionType::from_property(&self.property),
            source: if url == source { String::new() } else { source.to_string() },
            url,
            author: self.author,
            content,
            published,
            id,
            ..Default::default()
        }
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl WebmentionEngine {
    /// Verify and apply one inbound notification.
    ///
    /// The target must be an existing entry on this site. Deleted mentions
    /// are removed from the sidecar; others are upserted. The notifier is
    /// skipped for deletions and for sources on this site's own host.
    pub fn receive(&self, payload: InboundPayload) -> WebmentionResult<()> {
        if self.config.secret.is_empty() || payload.secret != self.config.secret {
            return Err(WebmentionError::InvalidSecret);
        }

        let id = self.target_id(&payload.target)?;
        // Fails with NotFound when the target entry does not exist.
        self.sidecars.content_store().get(&id)?;

        if payload.deleted {
            self.sidecars.delete_webmention(&id, &payload.source)?;
            info!(entry = %id, source = %payload.source, "webmention deleted");
            return Ok(());
        }

        let mut mention = payload.post.into_mention(&payload.source);
        mention.entry_id = Some(id.clone());
        self.sidecars
            .add_or_update_webmention(&id, mention.clone(), &payload.source)?;
        info!(entry = %id, source = %payload.source, kind = ?mention.kind, "webmention stored");

        if self.is_own_host(&payload.source) {
            debug!(source = %payload.source, "self-mention; not notifying");
        } else {
            self.notifier.notify(&id, &mention);
        }
        Ok(())
    }

    fn target_id(&self, target: &str) -> WebmentionResult<EntryId> {
        let url = Url::parse(target)
            .map_err(|e| WebmentionError::InvalidUrl(format!("{target}: {e}")))?;
        let base = self.base_url();
        if url.host_str() != base.host_str() {
            return Err(WebmentionError::UnknownTarget(target.to_string()));
        }
        let base_path = base.path().trim_end_matches('/');
        // The prefix must end on a segment boundary: `/blog` owns `/blog/x`, not `/blogpost/x`.
        let path = url
            .path()
            .strip_prefix(base_path)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| WebmentionError::UnknownTarget(target.to_string()))?;
        Ok(EntryId::new(path))
    }

    fn is_own_host(&self, source: &str) -> bool {
        Url::parse(source)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|h| Some(h.as_str()) == self.base_url().host_str())
    }
}
