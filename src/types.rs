use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// --- Schema ---

/// Recognized game fields, in display order. Anything else is dropped by `sanitize`.
pub const GAME_FIELDS: [&str; 11] = [
    "title",
    "platform",
    "release_date",
    "genre",
    "developer",
    "publisher",
    "region",
    "path",
    "collection",
    "status",
    "artpath",
];

/// Field used to match an incoming task against a stored game.
pub const IDENTITY_FIELD: &str = "path";

pub const TITLE_FIELD: &str = "title";

/// Label of the candidate built from the task's own fields.
pub const BASE_SOURCE: &str = "base";

// --- Field values ---

/// An opaque scalar. Compared by equality only, never coerced between variants.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Null and the empty string carry no opinion and never overwrite data.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Rendered form used as an identity key; `None` for empty values.
    pub fn as_key(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            // Bitwise, so NaN equals itself.
            (FieldValue::Float(a), FieldValue::Float(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("None"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A partial field set keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Look up a field, treating an absent key as `Null`.
pub fn field<'a>(fields: &'a Fields, name: &str) -> &'a FieldValue {
    static NULL: FieldValue = FieldValue::Null;
    fields.get(name).unwrap_or(&NULL)
}

// --- Achievements ---

/// One achievement as reported by a provider, unique per (game, api_name).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Achievement {
    pub api_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_gray: Option<String>,
    #[serde(default)]
    pub achieved: bool,
    /// Unix seconds; 0 when locked or unknown.
    #[serde(default)]
    pub unlock_time: i64,
}

// --- Import pipeline ---

/// One externally observed record waiting to be reconciled.
///
/// Nested values (lists, maps) read from a task file are dropped; only
/// scalars can be game fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(from = "RawTask")]
pub struct ImportTask {
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<Achievement>>,
}

impl ImportTask {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            achievements: None,
        }
    }

    pub fn identity(&self) -> Option<String> {
        field(&self.fields, IDENTITY_FIELD).as_key()
    }

    pub fn title(&self) -> Option<&str> {
        field(&self.fields, TITLE_FIELD)
            .as_text()
            .filter(|t| !t.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawField {
    Scalar(FieldValue),
    Nested(serde::de::IgnoredAny),
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(flatten)]
    fields: BTreeMap<String, RawField>,
    #[serde(default)]
    achievements: Option<Vec<Achievement>>,
}

impl From<RawTask> for ImportTask {
    fn from(raw: RawTask) -> Self {
        let fields = raw
            .fields
            .into_iter()
            .filter_map(|(name, value)| match value {
                RawField::Scalar(value) => Some((name, value)),
                RawField::Nested(_) => None,
            })
            .collect();
        Self {
            fields,
            achievements: raw.achievements,
        }
    }
}

/// A proposed field set for a task, labelled with the source that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportCandidate {
    pub fields: Fields,
    pub achievements: Option<Vec<Achievement>>,
    pub source: String,
}

impl ImportCandidate {
    pub fn new(fields: Fields, source: &str) -> Self {
        Self {
            fields,
            achievements: None,
            source: source.to_string(),
        }
    }

    /// The zero-th candidate: the task's own fields, unchanged.
    pub fn base(task: &ImportTask) -> Self {
        Self {
            fields: task.fields.clone(),
            achievements: task.achievements.clone(),
            source: BASE_SOURCE.to_string(),
        }
    }

    pub fn is_base(&self) -> bool {
        self.source == BASE_SOURCE
    }
}

// --- Stored records ---

/// A game stored in the library.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Game {
    pub id: u64,
    pub added: String,
    pub updated: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Game {
    pub fn title(&self) -> &str {
        field(&self.fields, TITLE_FIELD).as_text().unwrap_or("")
    }

    pub fn identity(&self) -> Option<String> {
        field(&self.fields, IDENTITY_FIELD).as_key()
    }

    /// Schema fields of this game, with absent ones as `Null`.
    pub fn schema_fields(&self) -> Fields {
        GAME_FIELDS
            .iter()
            .map(|name| (name.to_string(), field(&self.fields, name).clone()))
            .collect()
    }
}
