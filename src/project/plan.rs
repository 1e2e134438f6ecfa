//! Versioned field-projection tables
//!
//! Each output field is described by one [`FieldRule`]: where its value comes
//! from, which JSON type is accepted, and what happens when the value is
//! absent. The minimal table is shared by both modes; extended mode appends
//! the descriptive fields after it.

use crate::project::types::ProjectionMode;
use serde_json::{Number, Value};

/// Bumped whenever an output field is added, renamed or re-defaulted
pub const PROJECTION_VERSION: u32 = 1;

/// Where a field's value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Path into the raw card object
    Card(&'static [&'static str]),
    /// Owning set's code, lower-cased
    SetCode,
    /// Owning set's display name
    SetName,
}

/// Accepted JSON type of a source value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    Number,
    Flag,
    List,
    Object,
}

impl Kind {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::Text => value.is_string(),
            Kind::Number => value.is_number(),
            Kind::Flag => value.is_boolean(),
            Kind::List => value.is_array(),
            Kind::Object => value.is_object(),
        }
    }

    /// Canonical form of an accepted value
    pub fn normalize(self, value: Value) -> Value {
        match (self, value) {
            (Kind::Number, Value::Number(n)) => Value::Number(integral(n)),
            (_, value) => value,
        }
    }
}

/// Write `1.0` as `1` so output does not depend on how the source spelled it
fn integral(n: Number) -> Number {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Number::from(f as i64)
        }
        _ => n,
    }
}

/// What to emit when the source value is absent or of the wrong type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The card is skipped
    Required,
    /// `""`
    EmptyText,
    /// `0`
    Zero,
    /// `false`
    False,
    /// `[]`
    EmptyList,
    /// The key is left out
    Omit,
}

impl Fallback {
    /// Default value, or `None` when nothing is emitted
    pub fn value(self) -> Option<Value> {
        match self {
            Fallback::EmptyText => Some(Value::String(String::new())),
            Fallback::Zero => Some(Value::from(0)),
            Fallback::False => Some(Value::Bool(false)),
            Fallback::EmptyList => Some(Value::Array(Vec::new())),
            Fallback::Required | Fallback::Omit => None,
        }
    }
}

/// Projection rule for one output field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub output: &'static str,
    pub source: Source,
    pub kind: Kind,
    pub fallback: Fallback,
}

const fn rule(output: &'static str, source: Source, kind: Kind, fallback: Fallback) -> FieldRule {
    FieldRule {
        output,
        source,
        kind,
        fallback,
    }
}

const fn card(path: &'static [&'static str]) -> Source {
    Source::Card(path)
}

/// Fields present in every output record
pub const MINIMAL_FIELDS: &[FieldRule] = &[
    rule("id", card(&["uuid"]), Kind::Text, Fallback::Required),
    rule("name", card(&["name"]), Kind::Text, Fallback::Required),
    rule("mana_cost", card(&["manaCost"]), Kind::Text, Fallback::EmptyText),
    rule("cmc", card(&["manaValue"]), Kind::Number, Fallback::Zero),
    rule("type_line", card(&["type"]), Kind::Text, Fallback::EmptyText),
    rule("supertypes", card(&["supertypes"]), Kind::List, Fallback::EmptyList),
    rule("types", card(&["types"]), Kind::List, Fallback::EmptyList),
    rule("subtypes", card(&["subtypes"]), Kind::List, Fallback::EmptyList),
    rule("set", Source::SetCode, Kind::Text, Fallback::EmptyText),
    rule("set_name", Source::SetName, Kind::Text, Fallback::EmptyText),
    rule("collector_number", card(&["number"]), Kind::Text, Fallback::EmptyText),
    rule("rarity", card(&["rarity"]), Kind::Text, Fallback::EmptyText),
    rule("artist", card(&["artist"]), Kind::Text, Fallback::EmptyText),
    rule("scryfallId", card(&["identifiers", "scryfallId"]), Kind::Text, Fallback::EmptyText),
    rule("finishes", card(&["finishes"]), Kind::List, Fallback::EmptyList),
];

/// Descriptive fields appended in extended mode.
///
/// Flags always appear; everything else is omitted when absent.
pub const EXTENDED_FIELDS: &[FieldRule] = &[
    rule("oracle_text", card(&["text"]), Kind::Text, Fallback::Omit),
    rule("flavor_text", card(&["flavorText"]), Kind::Text, Fallback::Omit),
    rule("power", card(&["power"]), Kind::Text, Fallback::Omit),
    rule("toughness", card(&["toughness"]), Kind::Text, Fallback::Omit),
    rule("loyalty", card(&["loyalty"]), Kind::Text, Fallback::Omit),
    rule("defense", card(&["defense"]), Kind::Text, Fallback::Omit),
    rule("layout", card(&["layout"]), Kind::Text, Fallback::Omit),
    rule("side", card(&["side"]), Kind::Text, Fallback::Omit),
    rule("face_name", card(&["faceName"]), Kind::Text, Fallback::Omit),
    rule("other_face_ids", card(&["otherFaceIds"]), Kind::List, Fallback::Omit),
    rule("colors", card(&["colors"]), Kind::List, Fallback::Omit),
    rule("color_identity", card(&["colorIdentity"]), Kind::List, Fallback::Omit),
    rule("keywords", card(&["keywords"]), Kind::List, Fallback::Omit),
    rule("border_color", card(&["borderColor"]), Kind::Text, Fallback::Omit),
    rule("frame_version", card(&["frameVersion"]), Kind::Text, Fallback::Omit),
    rule("language", card(&["language"]), Kind::Text, Fallback::Omit),
    rule("legalities", card(&["legalities"]), Kind::Object, Fallback::Omit),
    rule("leadership_skills", card(&["leadershipSkills"]), Kind::Object, Fallback::Omit),
    rule("is_promo", card(&["isPromo"]), Kind::Flag, Fallback::False),
    rule("is_reprint", card(&["isReprint"]), Kind::Flag, Fallback::False),
    rule("is_reserved", card(&["isReserved"]), Kind::Flag, Fallback::False),
    rule("is_full_art", card(&["isFullArt"]), Kind::Flag, Fallback::False),
];

/// The ordered rule set for one projection mode
#[derive(Debug, Clone)]
pub struct ProjectionPlan {
    pub version: u32,
    pub mode: ProjectionMode,
    rules: Vec<FieldRule>,
}

impl ProjectionPlan {
    pub fn for_mode(mode: ProjectionMode) -> Self {
        let mut rules = MINIMAL_FIELDS.to_vec();
        if mode == ProjectionMode::Extended {
            rules.extend_from_slice(EXTENDED_FIELDS);
        }
        ProjectionPlan {
            version: PROJECTION_VERSION,
            mode,
            rules,
        }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Look up the rule producing `output`
    pub fn get_rule(&self, output: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.output == output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_output_names_unique() {
        let plan = ProjectionPlan::for_mode(ProjectionMode::Extended);
        let mut seen = HashSet::new();
        for rule in plan.rules() {
            assert!(seen.insert(rule.output), "duplicate output field {}", rule.output);
        }
    }

    #[test]
    fn test_minimal_is_prefix_of_extended() {
        let minimal = ProjectionPlan::for_mode(ProjectionMode::Minimal);
        let extended = ProjectionPlan::for_mode(ProjectionMode::Extended);

        assert_eq!(minimal.rules().len(), MINIMAL_FIELDS.len());
        assert_eq!(&extended.rules()[..minimal.rules().len()], minimal.rules());
        assert!(extended.get_rule("flavor_text").is_some());
        assert!(minimal.get_rule("flavor_text").is_none());
    }

    #[test]
    fn test_only_identity_fields_are_required() {
        let plan = ProjectionPlan::for_mode(ProjectionMode::Extended);
        let required: Vec<&str> = plan
            .rules()
            .iter()
            .filter(|r| r.fallback == Fallback::Required)
            .map(|r| r.output)
            .collect();

        assert_eq!(required, vec!["id", "name"]);
    }

    #[test]
    fn test_minimal_fields_never_omitted() {
        for rule in MINIMAL_FIELDS {
            assert_ne!(rule.fallback, Fallback::Omit, "{} must always be emitted", rule.output);
        }
    }

    #[test]
    fn test_number_normalization() {
        assert_eq!(Kind::Number.normalize(json!(1.0)), json!(1));
        assert_eq!(Kind::Number.normalize(json!(2.5)), json!(2.5));
        assert_eq!(Kind::Number.normalize(json!(0)), json!(0));
        assert_eq!(Kind::Number.normalize(json!(1000000.0)), json!(1000000));
    }

    #[test]
    fn test_kind_accepts() {
        assert!(Kind::Text.accepts(&json!("")));
        assert!(!Kind::Text.accepts(&json!(5)));
        assert!(Kind::Flag.accepts(&json!(false)));
        assert!(Kind::List.accepts(&json!([])));
        assert!(!Kind::Object.accepts(&json!([])));
    }
}
