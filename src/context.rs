//! Notification contexts as stored in the context document

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::clock::{format_date, DATE_FORMAT};

const CSV_KEY: &str = "csv";
const TOKEN_KEY: &str = "token";
const TODAY_KEY: &str = "today";

/// One notification subscription.
///
/// Contexts have no identifier; their position in the document is the only
/// identity they carry. Fields this crate does not know about are kept in
/// `extra` and written back untouched.
///
/// Reading an entry never fails. A `csv`, `token` or `today` holding
/// something other than a string reads as empty and stays in `extra` as it
/// was, so a malformed entry fails on its own once it is processed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    /// Location of the day-of-month calendar (`csv`)
    pub csv_url: String,

    /// Bearer credential for the notification endpoint
    pub token: String,

    /// `YYYY-MM-DD` of the last day this context was processed, UTC+8 (`today`)
    pub last_run_date: Option<String>,

    pub extra: Map<String, Value>,
}

impl Context {
    pub fn new(csv_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            csv_url: csv_url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_last_run_date(mut self, date: impl Into<String>) -> Self {
        self.last_run_date = Some(date.into());
        self
    }

    /// Build a context from one entry of the document
    pub fn from_value(value: Value) -> Self {
        let mut extra = match value {
            Value::Object(fields) => fields,
            other => {
                warn!(entry = %other, "Context entry is not an object");
                Map::new()
            }
        };

        Self {
            csv_url: take_string(&mut extra, CSV_KEY).unwrap_or_default(),
            token: take_string(&mut extra, TOKEN_KEY).unwrap_or_default(),
            last_run_date: take_string(&mut extra, TODAY_KEY),
            extra,
        }
    }

    /// Whether this context was already processed on `today`
    pub fn ran_on(&self, today: NaiveDate) -> bool {
        self.last_run_date.as_deref() == Some(format_date(today).as_str())
    }

    /// The stored marker as a date, when it is one
    pub fn last_run_day(&self) -> Option<NaiveDate> {
        let date = self.last_run_date.as_deref()?;
        NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
    }

    /// Consume the run for `today`.
    ///
    /// Applied before any network access and never rolled back, so a failed
    /// fetch or send still uses up the day.
    pub fn mark_run(&self, today: NaiveDate) -> Self {
        let mut next = self.clone();
        next.extra.remove(TODAY_KEY);
        next.last_run_date = Some(format_date(today));
        next
    }

    /// Whether the typed field for `key` is written instead of a raw value
    fn writes_field(&self, key: &str) -> bool {
        match key {
            CSV_KEY => !self.csv_url.is_empty() || !self.extra.contains_key(CSV_KEY),
            TOKEN_KEY => !self.token.is_empty() || !self.extra.contains_key(TOKEN_KEY),
            TODAY_KEY => self.last_run_date.is_some(),
            _ => false,
        }
    }
}

/// Remove `key` from `fields` if it holds a string; other values stay put
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        other => {
            fields.insert(key.to_string(), other);
            None
        }
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if self.writes_field(CSV_KEY) {
            map.serialize_entry(CSV_KEY, &self.csv_url)?;
        }
        if self.writes_field(TOKEN_KEY) {
            map.serialize_entry(TOKEN_KEY, &self.token)?;
        }
        if let Some(date) = &self.last_run_date {
            map.serialize_entry(TODAY_KEY, date)?;
        }
        for (key, value) in &self.extra {
            if !self.writes_field(key) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Context::from_value)
    }
}

/// Ordered contexts, in document order
pub type ContextList = Vec<Context>;

/// Parse the context document. Accepts JSON5.
///
/// Only a document that is not an array fails; entries are read leniently.
pub fn parse_document(content: &str) -> Result<ContextList, json5::Error> {
    json5::from_str(content)
}

/// Render the context document with two-space indentation
pub fn render_document(contexts: &[Context]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(contexts)
}
