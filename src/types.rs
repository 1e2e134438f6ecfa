use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::rc::Rc;

/// One printing of a card, kept as the raw JSON object from the source.
///
/// Every field is either present with a value or absent. An explicit `null`
/// is reported as absent by [`RawCard::field`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCard(pub Map<String, Value>);

impl RawCard {
    pub fn new(fields: Map<String, Value>) -> Self {
        RawCard(fields)
    }

    /// Look up a value by following `path` through nested objects.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }
}

impl From<Value> for RawCard {
    /// Non-object values yield an empty card.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RawCard(map),
            _ => RawCard::default(),
        }
    }
}

/// Set-level attributes shared by every card of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetContext {
    /// Key of the entry inside the `data` object
    pub key: String,

    /// Set code; falls back to `key` when the source omits it
    pub code: String,

    /// Display name, if the source provides one
    pub name: Option<String>,

    /// Digital-only products are excluded from the output
    pub online_only: bool,
}

impl SetContext {
    pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
        SetContext {
            key: key.into(),
            code: code.into(),
            name: None,
            online_only: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_online_only(mut self, online_only: bool) -> Self {
        self.online_only = online_only;
        self
    }
}

/// One set (edition) of the catalog with its cards in source order
#[derive(Debug, Clone, PartialEq)]
pub struct RawCatalogEntry {
    pub set: SetContext,
    pub cards: Vec<RawCard>,
}

/// Body of a `data` entry as found in the source document.
///
/// Fields not listed here (booster configuration, tokens, sealed products)
/// are skipped by the deserializer. Listed fields are kept untyped so that a
/// value of the wrong type counts as absent instead of failing the decode.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSetBody {
    pub code: Option<Value>,
    pub name: Option<Value>,
    pub is_online_only: Option<Value>,
    pub cards: Option<Value>,
}

impl RawSetBody {
    pub(crate) fn into_entry(self, key: String) -> RawCatalogEntry {
        let code = match self.code {
            Some(Value::String(code)) => code,
            _ => key.clone(),
        };
        let name = match self.name {
            Some(Value::String(name)) => Some(name),
            _ => None,
        };
        // Non-object cards become empty records and are skipped at projection
        let cards = match self.cards {
            Some(Value::Array(cards)) => cards.into_iter().map(RawCard::from).collect(),
            _ => Vec::new(),
        };

        RawCatalogEntry {
            set: SetContext {
                key,
                code,
                name,
                online_only: matches!(self.is_online_only, Some(Value::Bool(true))),
            },
            cards,
        }
    }
}

/// A card paired with the set it belongs to, for entry-centric iteration
#[derive(Debug, Clone)]
pub struct TaggedCard {
    pub set: Rc<SetContext>,
    pub card: RawCard,
}
