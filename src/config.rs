use crate::error::{BakeError, Result};
use crate::project::ProjectionMode;
use regex::Regex;
use std::path::PathBuf;

/// Where the upstream catalog is published
pub const DEFAULT_SOURCE: &str = "https://mtgjson.com/api/v5/AllPrintings.json.zip";

/// File name the downstream application expects
pub const DEFAULT_OUTPUT: &str = "mana-scribe-index.json";

/// Archive entries whose name matches this pattern hold the catalog
pub const DEFAULT_ENTRY_PATTERN: &str = r"(?i)\.json$";

/// Entries up to this uncompressed size are parsed in one go
pub const DEFAULT_BUFFER_LIMIT: u64 = 8 * 1024 * 1024;

/// Configuration for one bake run
#[derive(Debug, Clone)]
pub struct BakeConfig {
    /// URL or local path of the source archive
    pub source: String,

    /// Final location of the projected catalog
    pub output: PathBuf,

    /// Directory for the staged archive (OS temp dir when unset)
    pub staging_dir: Option<PathBuf>,

    /// Keep the staged archive after a successful run
    pub keep_staging: bool,

    /// Which projection table to apply
    pub projection: ProjectionMode,

    /// Regex selecting the catalog entry inside the archive
    pub entry_pattern: String,

    /// Entries at most this large skip the streaming decoder (0 = always stream)
    pub buffer_limit: u64,
}

impl Default for BakeConfig {
    fn default() -> Self {
        BakeConfig {
            source: DEFAULT_SOURCE.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            staging_dir: None,
            keep_staging: false,
            projection: ProjectionMode::default(),
            entry_pattern: DEFAULT_ENTRY_PATTERN.to_string(),
            buffer_limit: DEFAULT_BUFFER_LIMIT,
        }
    }
}

impl BakeConfig {
    /// Compile the entry pattern
    pub fn entry_regex(&self) -> Result<Regex> {
        Regex::new(&self.entry_pattern)
            .map_err(|e| BakeError::Config(format!("invalid entry pattern {:?}: {e}", self.entry_pattern)))
    }

    /// Directory the staged archive is created in
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Directory the temporary output is created in, so the final rename
    /// never crosses a filesystem boundary
    pub fn output_dir(&self) -> PathBuf {
        match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entry_pattern() {
        let config = BakeConfig::default();
        let regex = config.entry_regex().unwrap();

        assert!(regex.is_match("AllPrintings.json"));
        assert!(regex.is_match("nested/CATALOG.JSON"));
        assert!(!regex.is_match("AllPrintings.json.sha256"));
    }

    #[test]
    fn test_invalid_entry_pattern() {
        let config = BakeConfig {
            entry_pattern: "(".to_string(),
            ..BakeConfig::default()
        };

        assert!(matches!(config.entry_regex(), Err(BakeError::Config(_))));
    }

    #[test]
    fn test_output_dir() {
        let bare = BakeConfig::default();
        assert_eq!(bare.output_dir(), PathBuf::from("."));

        let nested = BakeConfig {
            output: PathBuf::from("out/index.json"),
            ..BakeConfig::default()
        };
        assert_eq!(nested.output_dir(), PathBuf::from("out"));
    }
}
