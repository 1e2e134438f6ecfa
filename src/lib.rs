//! # Bakery - card catalog flattening pipeline
//!
//! Turns the nested, archive-packed card catalog into one flat JSON array
//! that client applications can load directly.
//!
//! ## Stages
//!
//! - **source**: fetch or open the compressed archive, staging non-seekable inputs
//! - **archive**: select the catalog entry inside the ZIP container
//! - **decode**: stream the entry one set at a time without building the document
//! - **project**: map each card through the versioned field table
//! - **writer**: encode projected cards as a JSON array, one element at a time
//! - **pipeline**: run the stages, own temporary files, report counts
//!
//! ## Quick Start
//!
//! ```rust
//! use bakery::project::{ProjectionMode, Projector};
//! use bakery::types::{RawCard, SetContext};
//! use serde_json::json;
//!
//! let projector = Projector::new(ProjectionMode::Minimal);
//! let set = SetContext::new("SET1", "SET1").with_name("Set One");
//! let card = RawCard::from(json!({"uuid": "a1", "name": "Bolt", "manaValue": 1}));
//!
//! let projected = projector.project(&card, &set).unwrap();
//! assert_eq!(projected.get("set"), Some(&json!("set1")));
//! assert_eq!(projected.get("mana_cost"), Some(&json!("")));
//! ```
//!
//! A full run is driven by [`Pipeline`]:
//!
//! ```no_run
//! use bakery::{bake, BakeConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let report = bake(BakeConfig::default())?;
//! println!("{} cards, {} skipped", report.written, report.skipped);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod project;
pub mod source;
pub mod types;
pub mod writer;

// Re-export commonly used types for convenience
pub use config::BakeConfig;
pub use error::BakeError;
pub use pipeline::{BakeReport, Pipeline, PipelineError, Stage};
pub use project::{ProjectedCard, ProjectionMode, Projector, SkipReason};
pub use source::ByteSource;
pub use writer::CatalogWriter;

/// Main entry point: run one bake with the given configuration
pub fn bake(config: BakeConfig) -> Result<BakeReport, PipelineError> {
    Pipeline::new(config).run()
}
