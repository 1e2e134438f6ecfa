//! Incremental decoding of the catalog document
//!
//! The streaming decoder walks the decompressed entry with a structural
//! scanner and yields one set at a time. Small entries can instead be parsed
//! in one go with simd-json; both paths yield the same ordered sequence.

pub mod buffered;
pub mod catalog;
pub mod scanner;

pub use buffered::decode_buffered;
pub use catalog::{CardStream, CatalogDecoder};
pub use scanner::JsonScanner;

use crate::error::{BakeError, Result};
use crate::types::RawCatalogEntry;
use std::io::{BufReader, Read};
use tracing::debug;

/// Read-ahead window of the streaming decoder
const READ_BUFFER: usize = 64 * 1024;

/// Lazy sequence of catalog entries
pub type Entries<'a> = Box<dyn Iterator<Item = Result<RawCatalogEntry>> + 'a>;

/// How an entry is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Streaming,
    Buffered,
}

impl DecodeMode {
    /// Buffer entries whose uncompressed size is within `limit` (0 disables buffering)
    pub fn for_entry(size: u64, limit: u64) -> Self {
        if limit > 0 && size <= limit {
            DecodeMode::Buffered
        } else {
            DecodeMode::Streaming
        }
    }
}

/// Decode a decompressed entry stream into a lazy sequence of entries
pub fn decode_entries<'a, R: Read + 'a>(mut reader: R, mode: DecodeMode) -> Result<Entries<'a>> {
    debug!("Decoding catalog entry ({:?})", mode);
    match mode {
        DecodeMode::Streaming => Ok(Box::new(CatalogDecoder::new(BufReader::with_capacity(
            READ_BUFFER,
            reader,
        )))),
        DecodeMode::Buffered => {
            let mut content = Vec::new();
            reader
                .read_to_end(&mut content)
                .map_err(|e| BakeError::ArchiveCorrupt(format!("failed to read archive entry: {e}")))?;
            let entries = decode_buffered(content)?;
            Ok(Box::new(entries.into_iter().map(Ok)))
        }
    }
}
