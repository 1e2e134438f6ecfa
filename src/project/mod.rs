//! Record projection - map raw cards to flat output records
//!
//! A single versioned table drives the mapping. Minimal and extended output
//! are two modes of that table rather than separate code paths, and every
//! default is applied in one explicit normalization step per field.

pub mod plan;
pub mod projector;
pub mod types;

pub use plan::{Fallback, FieldRule, Kind, ProjectionPlan, Source, PROJECTION_VERSION};
pub use projector::Projector;
pub use types::{ProjectedCard, ProjectionMode, SkipReason};
