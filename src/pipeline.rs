//! Pipeline orchestration
//!
//! Drives one bake run through its stages:
//!
//! ```text
//! Idle -> Fetching -> Extracting -> Transforming -> Finalizing -> Succeeded
//!    \________\____________\______________\______________\-----> Failed
//! ```
//!
//! The output is written to a temporary file next to the final path and
//! renamed into place only after the array has been closed and synced, so the
//! output path either holds a complete catalog or is left as it was. The
//! staging file and the temporary output are guards that delete themselves
//! on every early return.

use crate::archive::CatalogArchive;
use crate::config::BakeConfig;
use crate::decode::{decode_entries, CardStream, DecodeMode};
use crate::error::BakeError;
use crate::project::{ProjectionMode, Projector};
use crate::source::{ByteSource, OpenedSource};
use crate::writer::CatalogWriter;
use std::fmt;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Extracting,
    Transforming,
    Finalizing,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed)
    }

    fn successor(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::Fetching),
            Stage::Fetching => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Transforming),
            Stage::Transforming => Some(Stage::Finalizing),
            Stage::Finalizing => Some(Stage::Succeeded),
            Stage::Succeeded | Stage::Failed => None,
        }
    }

    /// Transitions only move forward; any live stage may fail
    pub fn can_advance_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Stage::Failed || self.successor() == Some(next)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetch",
            Stage::Extracting => "extract",
            Stage::Transforming => "transform",
            Stage::Finalizing => "finalize",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A fatal error together with the stage it occurred in
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: BakeError,
}

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct BakeReport {
    /// Records written to the output
    pub written: u64,
    /// Records dropped for missing or invalid required fields
    pub skipped: u64,
    /// Catalog entries read
    pub sets: u64,
    /// Catalog entries excluded as digital-only
    pub online_only_sets: u64,
    /// Name of the archive entry that was read
    pub entry: String,
    pub decode_mode: DecodeMode,
    pub projection: ProjectionMode,
    pub output: PathBuf,
    /// Where the staged archive was kept, if requested
    pub staging_kept: Option<PathBuf>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Tally {
    written: u64,
    skipped: u64,
    sets: u64,
    online_only_sets: u64,
}

/// One bake run
pub struct Pipeline {
    config: BakeConfig,
    projector: Projector,
    stage: Stage,
}

impl Pipeline {
    pub fn new(config: BakeConfig) -> Self {
        let projector = Projector::new(config.projection);
        Pipeline {
            config,
            projector,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Run against the configured source location
    pub fn run(&mut self) -> Result<BakeReport, PipelineError> {
        let source = ByteSource::parse(&self.config.source);
        self.run_source(source)
    }

    /// Run against an explicit byte source
    pub fn run_source(&mut self, source: ByteSource) -> Result<BakeReport, PipelineError> {
        if self.stage != Stage::Idle {
            return Err(PipelineError {
                stage: self.stage,
                source: BakeError::Config("pipeline has already run".to_string()),
            });
        }

        match self.execute(source) {
            Ok(report) => {
                self.advance(Stage::Succeeded);
                info!(
                    "Wrote {} cards to {} ({} skipped, {} digital-only sets excluded) in {:.1?}",
                    report.written,
                    report.output.display(),
                    report.skipped,
                    report.online_only_sets,
                    report.elapsed
                );
                Ok(report)
            }
            Err(source) => {
                let stage = self.stage;
                self.advance(Stage::Failed);
                Err(PipelineError { stage, source })
            }
        }
    }

    fn execute(&mut self, source: ByteSource) -> Result<BakeReport, BakeError> {
        let started = Instant::now();
        let entry_pattern = self.config.entry_regex()?;
        info!(
            "Baking {} with {} projection v{}",
            source.location(),
            self.config.projection,
            self.projector.plan().version
        );

        self.advance(Stage::Fetching);
        let OpenedSource { input, staged } = source.open(&self.config.staging_dir())?;

        self.advance(Stage::Extracting);
        let mut archive = CatalogArchive::open(input, &entry_pattern)?;
        let entry = archive.entry_info().clone();
        let decode_mode = DecodeMode::for_entry(entry.size, self.config.buffer_limit);
        info!("Extracting {} ({} bytes uncompressed)", entry.name, entry.size);

        self.advance(Stage::Transforming);
        let temp_output = tempfile::Builder::new()
            .prefix(".bakery-")
            .suffix(".partial")
            .tempfile_in(self.config.output_dir())
            .map_err(BakeError::SinkWrite)?;
        let mut writer = CatalogWriter::new(BufWriter::new(temp_output))?;
        let mut tally = Tally::default();

        let projector = &self.projector;
        let included = decode_entries(archive.entry_reader()?, decode_mode)?.filter(|entry| {
            let Ok(entry) = entry else {
                return true;
            };
            tally.sets += 1;
            if projector.includes(&entry.set) {
                debug!("Projecting set {} ({} cards)", entry.set.code, entry.cards.len());
                true
            } else {
                debug!("Excluding digital-only set {}", entry.set.code);
                tally.online_only_sets += 1;
                false
            }
        });
        let projected = CardStream::new(included).filter_map(|tagged| {
            let tagged = match tagged {
                Ok(tagged) => tagged,
                Err(e) => return Some(Err(e)),
            };
            match projector.project(&tagged.card, &tagged.set) {
                Ok(card) => Some(Ok(card)),
                Err(reason) => {
                    warn!("Skipping card in set {}: {}", tagged.set.code, reason);
                    tally.skipped += 1;
                    None
                }
            }
        });
        tally.written = writer.write_all(projected)?;

        self.advance(Stage::Finalizing);
        let temp_output = writer
            .finish()?
            .into_inner()
            .map_err(|e| BakeError::SinkWrite(e.into_error()))?;
        temp_output.as_file().sync_all().map_err(BakeError::SinkWrite)?;
        temp_output
            .persist(&self.config.output)
            .map_err(|e| BakeError::SinkWrite(e.error))?;

        // The archive holds the staged file open
        drop(archive);
        let staging_kept = match staged {
            Some(staged) => staged.release(self.config.keep_staging).unwrap_or_else(|e| {
                warn!("Failed to release staged archive: {}", e);
                None
            }),
            None => None,
        };

        Ok(BakeReport {
            written: tally.written,
            skipped: tally.skipped,
            sets: tally.sets,
            online_only_sets: tally.online_only_sets,
            entry: entry.name,
            decode_mode,
            projection: self.config.projection,
            output: self.config.output.clone(),
            staging_kept,
            elapsed: started.elapsed(),
        })
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "invalid stage transition {} -> {}",
            self.stage,
            next
        );
        debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
    }
}
