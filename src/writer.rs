use crate::error::{BakeError, Result};
use crate::project::ProjectedCard;
use std::io::Write;

/// Writes projected cards to a sink as one JSON array, one element at a time.
///
/// The opening bracket is written on construction and the closing bracket
/// only by [`CatalogWriter::finish`]. A writer dropped before `finish` leaves
/// the array unterminated, so a partial file never parses as a complete
/// catalog.
pub struct CatalogWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> CatalogWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(b"[").map_err(BakeError::SinkWrite)?;
        Ok(CatalogWriter { writer, written: 0 })
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write_card(&mut self, card: &ProjectedCard) -> Result<()> {
        if self.written > 0 {
            self.writer.write_all(b",").map_err(BakeError::SinkWrite)?;
        }
        serde_json::to_writer(&mut self.writer, card).map_err(|e| BakeError::SinkWrite(e.into()))?;
        self.written += 1;
        Ok(())
    }

    /// Drain a lazy sequence into the sink.
    ///
    /// Stops at the first upstream error, leaving the array open.
    pub fn write_all<I>(&mut self, cards: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<ProjectedCard>>,
    {
        let before = self.written;
        for card in cards {
            self.write_card(&card?)?;
        }
        Ok(self.written - before)
    }

    /// Close the array and flush
    pub fn finish(mut self) -> Result<W> {
        self.writer.write_all(b"]").map_err(BakeError::SinkWrite)?;
        self.writer.flush().map_err(BakeError::SinkWrite)?;
        Ok(self.writer)
    }
}
