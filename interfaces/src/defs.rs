use std::fmt;

use serde::Serialize;

/// External identifier of an item, as the upstream API hands it out.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum NaturalKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Int(value) => write!(f, "{}", value),
            NaturalKey::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for NaturalKey {
    fn from(value: i64) -> Self {
        NaturalKey::Int(value)
    }
}

impl From<String> for NaturalKey {
    fn from(value: String) -> Self {
        NaturalKey::Text(value)
    }
}

impl From<&str> for NaturalKey {
    fn from(value: &str) -> Self {
        NaturalKey::Text(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Text,
}

impl KeyKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            KeyKind::Integer => "INTEGER",
            KeyKind::Text => "TEXT",
        }
    }
}

/// Shape of the seen-item table a source records its keys in.
/// Two sources may share one table when they observe the same upstream ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeenTable {
    pub name: &'static str,
    pub key_column: &'static str,
    pub key_kind: KeyKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl MessageField {
    pub fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: true,
        }
    }
}

/// Fixed-shape chat message describing one new item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSpec {
    /// Leading line, carries the item link.
    pub text: String,
    pub fallback: String,
    pub username: String,
    pub icon_emoji: String,
    pub author_name: String,
    pub author_link: Option<String>,
    pub author_icon: Option<String>,
    pub title: Option<String>,
    pub title_link: String,
    pub body: Option<String>,
    pub footer: String,
    pub footer_icon: String,
    /// Item creation time, Unix seconds.
    pub ts: i64,
    pub fields: Vec<MessageField>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub inserted: usize,
    pub notified: usize,
}

// Items are thin adapters over each API's decoded payload. They are
// discarded once the pipeline has notified (or skipped) them; only the
// natural key and title outlive the run.

pub trait Item: Send + Sync {
    fn natural_key(&self) -> NaturalKey;
    fn title(&self) -> String;
    fn to_message(&self) -> MessageSpec;
}
