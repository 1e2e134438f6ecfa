use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Which projection table to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    /// Core card fields only
    Minimal,
    /// Core fields plus descriptive and flag fields
    #[default]
    Extended,
}

impl fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionMode::Minimal => f.write_str("minimal"),
            ProjectionMode::Extended => f.write_str("extended"),
        }
    }
}

/// A flattened output record, with keys in table order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProjectedCard(Map<String, Value>);

impl ProjectedCard {
    pub(crate) fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Output keys in serialization order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Why a card was left out of the output.
///
/// Skips are counted and logged; they never abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A required field is absent
    MissingField(&'static str),
    /// A required field is present with the wrong JSON type
    WrongKind(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(field) => write!(f, "missing required field `{field}`"),
            SkipReason::WrongKind(field) => write!(f, "required field `{field}` has the wrong type"),
        }
    }
}
