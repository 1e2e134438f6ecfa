use crate::project::plan::{Fallback, FieldRule, ProjectionPlan, Source};
use crate::project::types::{ProjectedCard, ProjectionMode, SkipReason};
use crate::types::{RawCard, SetContext};
use serde_json::Value;

/// Maps raw cards to output records following a [`ProjectionPlan`].
///
/// Projection is pure: no I/O, no logging, no shared state.
#[derive(Debug, Clone)]
pub struct Projector {
    plan: ProjectionPlan,
}

impl Projector {
    pub fn new(mode: ProjectionMode) -> Self {
        Projector {
            plan: ProjectionPlan::for_mode(mode),
        }
    }

    pub fn plan(&self) -> &ProjectionPlan {
        &self.plan
    }

    /// Digital-only sets contribute nothing to the output
    pub fn includes(&self, set: &SetContext) -> bool {
        !set.online_only
    }

    /// Project one card in the context of its set
    pub fn project(&self, card: &RawCard, set: &SetContext) -> Result<ProjectedCard, SkipReason> {
        let mut projected = ProjectedCard::default();

        for rule in self.plan.rules() {
            match resolve(rule, card, set)? {
                Some(value) => projected.insert(rule.output, value),
                None => {
                    if let Some(default) = rule.fallback.value() {
                        projected.insert(rule.output, default);
                    }
                }
            }
        }

        Ok(projected)
    }
}

/// Source value of a rule after type checking and normalization.
///
/// `Ok(None)` means absent; the caller applies the fallback.
fn resolve(rule: &FieldRule, card: &RawCard, set: &SetContext) -> Result<Option<Value>, SkipReason> {
    let raw = match rule.source {
        Source::Card(path) => card.field(path).cloned(),
        Source::SetCode => Some(Value::String(set.code.to_lowercase())),
        Source::SetName => set.name.clone().map(Value::String),
    };

    match raw {
        Some(value) if rule.kind.accepts(&value) => Ok(Some(rule.kind.normalize(value))),
        Some(_) if rule.fallback == Fallback::Required => Err(SkipReason::WrongKind(rule.output)),
        None if rule.fallback == Fallback::Required => Err(SkipReason::MissingField(rule.output)),
        _ => Ok(None),
    }
}
