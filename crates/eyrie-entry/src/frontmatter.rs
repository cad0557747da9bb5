use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Structured metadata block at the head of every entry.
///
/// Recognized fields are typed; everything else lands in [`extra`](Self::extra)
/// and is written back unchanged. Field names on disk follow the site
/// generator's conventions (`date`, `lastmod`, `expiryDate`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub draft: bool,

    /// Publication time.
    #[serde(
        default,
        rename = "date",
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub published: Option<DateTime<Utc>>,

    /// Last modification time.
    #[serde(
        default,
        rename = "lastmod",
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,

    /// After this instant the entry is considered deleted.
    #[serde(
        default,
        rename = "expiryDate",
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<DateTime<Utc>>,

    /// Unrecognized keys, sorted by key when encoded.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FrontMatter {
    /// Returns `true` once the expiry date has passed.
    pub fn is_deleted(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// The `visibility` extension key, defaulting to `public`.
    pub fn visibility(&self) -> &str {
        self.extra
            .get("visibility")
            .and_then(Value::as_str)
            .unwrap_or("public")
    }

    /// Returns `true` when the generator is told never to render this entry
    /// (`build: {render: never}`, also accepted under `_build`).
    pub fn is_never_rendered(&self) -> bool {
        ["build", "_build"].iter().any(|key| {
            self.extra
                .get(*key)
                .and_then(|b| b.get("render"))
                .and_then(Value::as_str)
                .is_some_and(|render| render == "never")
        })
    }

    /// Look up an extension value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Insert or replace an extension value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }
}

/// Lenient timestamp handling: RFC 3339 is written, but bare dates and naive
/// date-times (read as UTC) are accepted, as generators and humans produce them.
mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp: {s}"))),
        }
    }

    fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Some(naive.and_utc());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
