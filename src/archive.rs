//! Locates the catalog entry inside the ZIP container
//!
//! Exactly one entry is read. When several entries match the entry pattern,
//! the first one in central-directory order wins and the rest are logged.

use crate::error::{BakeError, Result};
use regex::Regex;
use std::io::{Read, Seek};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Metadata about the selected archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
}

/// An opened archive with its catalog entry already selected
pub struct CatalogArchive<R: Read + Seek> {
    archive: ZipArchive<R>,
    entry: EntryInfo,
}

impl<R: Read + Seek> CatalogArchive<R> {
    /// Parse the container directory and select the catalog entry
    pub fn open(input: R, pattern: &Regex) -> Result<Self> {
        let mut archive = ZipArchive::new(input)?;
        let entry = select_entry(&mut archive, pattern)?;
        debug!(
            "Selected entry {:?} ({} bytes, {} compressed)",
            entry.name, entry.size, entry.compressed_size
        );
        Ok(CatalogArchive { archive, entry })
    }

    pub fn entry_info(&self) -> &EntryInfo {
        &self.entry
    }

    /// Decompressed content of the selected entry as a sequential stream
    pub fn entry_reader(&mut self) -> Result<impl Read + '_> {
        Ok(self.archive.by_index(self.entry.index)?)
    }
}

fn select_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, pattern: &Regex) -> Result<EntryInfo> {
    let mut selected: Option<EntryInfo> = None;

    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        if file.is_dir() || !pattern.is_match(file.name()) {
            continue;
        }

        match &selected {
            Some(first) => {
                warn!("Ignoring extra catalog entry {:?}; using {:?}", file.name(), first.name);
            }
            None => {
                selected = Some(EntryInfo {
                    index,
                    name: file.name().to_string(),
                    size: file.size(),
                    compressed_size: file.compressed_size(),
                });
            }
        }
    }

    selected.ok_or_else(|| BakeError::ArchiveEntryNotFound {
        pattern: pattern.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn fixture_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn json_pattern() -> Regex {
        Regex::new(r"(?i)\.json$").unwrap()
    }

    #[test]
    fn test_selects_json_entry() {
        let bytes = fixture_zip(&[
            ("README.txt", b"hello"),
            ("catalog.json", br#"{"data":{}}"#),
        ]);

        let mut archive = CatalogArchive::open(Cursor::new(bytes), &json_pattern()).unwrap();
        assert_eq!(archive.entry_info().name, "catalog.json");
        assert_eq!(archive.entry_info().size, 11);

        let mut content = String::new();
        archive.entry_reader().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, r#"{"data":{}}"#);
    }

    #[test]
    fn test_first_match_wins() {
        let bytes = fixture_zip(&[("b.json", b"[1]"), ("a.json", b"[2]")]);

        let archive = CatalogArchive::open(Cursor::new(bytes), &json_pattern()).unwrap();
        assert_eq!(archive.entry_info().name, "b.json");
        assert_eq!(archive.entry_info().index, 0);
    }

    #[test]
    fn test_no_matching_entry() {
        let bytes = fixture_zip(&[("notes.txt", b"nothing here")]);

        let err = CatalogArchive::open(Cursor::new(bytes), &json_pattern()).err().unwrap();
        assert!(matches!(err, BakeError::ArchiveEntryNotFound { .. }));
    }

    #[test]
    fn test_truncated_container_is_corrupt() {
        let mut bytes = fixture_zip(&[("catalog.json", br#"{"data":{}}"#)]);
        bytes.truncate(bytes.len() / 2);

        let err = CatalogArchive::open(Cursor::new(bytes), &json_pattern()).err().unwrap();
        assert!(matches!(err, BakeError::ArchiveCorrupt(_)));
    }

    #[test]
    fn test_not_a_zip() {
        let err = CatalogArchive::open(Cursor::new(b"{\"data\":{}}".to_vec()), &json_pattern())
            .err()
            .unwrap();
        assert!(matches!(err, BakeError::ArchiveCorrupt(_)));
    }
}
