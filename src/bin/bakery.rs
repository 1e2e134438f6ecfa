//! bakery: Flatten the card catalog archive into a single JSON array
//!
//! Usage:
//!   # Download the published catalog and write mana-scribe-index.json
//!   bakery
//!
//!   # Bake a local archive with the minimal field table
//!   bakery --source AllPrintings.json.zip --projection minimal -o cards.json
//!
//!   # Keep the downloaded archive around for debugging
//!   bakery --staging-dir ./tmp --keep-staging --log-level debug

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use bakery::config::{DEFAULT_BUFFER_LIMIT, DEFAULT_ENTRY_PATTERN, DEFAULT_OUTPUT, DEFAULT_SOURCE};
use bakery::{BakeConfig, Pipeline, ProjectionMode};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Projection {
    /// Core card fields only
    Minimal,
    /// Core fields plus text, stats, faces, legalities and flags
    Extended,
}

impl From<Projection> for ProjectionMode {
    fn from(projection: Projection) -> Self {
        match projection {
            Projection::Minimal => ProjectionMode::Minimal,
            Projection::Extended => ProjectionMode::Extended,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bakery")]
#[command(about = "Flatten the card catalog archive into a single JSON array", long_about = None)]
struct Args {
    /// Archive URL or local path
    #[arg(long, short = 's', default_value = DEFAULT_SOURCE)]
    source: String,

    /// Output file
    #[arg(long, short = 'o', default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Directory for the staged download (defaults to the OS temp dir)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Keep the staged download after a successful run
    #[arg(long)]
    keep_staging: bool,

    /// Field table to apply to each card
    #[arg(long, value_enum, default_value_t = Projection::Extended)]
    projection: Projection,

    /// Regex selecting the catalog entry inside the archive
    #[arg(long, default_value = DEFAULT_ENTRY_PATTERN)]
    entry_pattern: String,

    /// Parse entries up to this many bytes in one go (0 = always stream)
    #[arg(long, default_value_t = DEFAULT_BUFFER_LIMIT)]
    buffer_limit: u64,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn initialize_tracing(log_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    // Logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    initialize_tracing(args.log_level);

    let config = BakeConfig {
        source: args.source,
        output: args.output,
        staging_dir: args.staging_dir,
        keep_staging: args.keep_staging,
        projection: args.projection.into(),
        entry_pattern: args.entry_pattern,
        buffer_limit: args.buffer_limit,
    };

    let mut pipeline = Pipeline::new(config);
    match pipeline.run() {
        Ok(report) => {
            println!(
                "Created {} with {} printings ({} skipped)",
                report.output.display(),
                report.written,
                report.skipped
            );
            if let Some(path) = report.staging_kept {
                println!("Staged archive kept at {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Bake failed: {}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}
