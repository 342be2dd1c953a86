//! Streaming row source over a decoded report
//!
//! Yields raw rows one at a time from any reader. The sequence ends at the end of
//! input or at the trailer row (first cell `total`, any case), whichever comes
//! first; the trailer itself is consumed and never surfaced.
//!
//! Cells are decoded as UTF-8. Invalid byte sequences become U+FFFD instead of
//! failing the row.

use crate::constants::is_trailer_cell;
use crate::{Error, Result};
use csv::{ByteRecord, Reader, ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::trace;

/// Lazy, single-pass, non-restartable sequence of report rows
pub struct StreamingRowSource<Rd: Read> {
    reader: Reader<Rd>,
    peeked: Option<StringRecord>,
    title_lines_left: usize,
    finished: bool,
    trailer_seen: bool,
    rows_yielded: usize,
}

impl<Rd: Read> StreamingRowSource<Rd> {
    /// Wrap `reader`, skipping `title_lines` leading rows before the first yield
    pub fn new(reader: Rd, title_lines: usize, buffer_size: usize) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .buffer_capacity(buffer_size.max(1))
            .from_reader(reader);

        Self {
            reader,
            peeked: None,
            title_lines_left: title_lines,
            finished: false,
            trailer_seen: false,
            rows_yielded: 0,
        }
    }

    /// Whether another row is available
    pub fn has_next(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(self.peeked.is_some())
    }

    /// Next row; fails with [`Error::SequenceExhausted`] past the end
    pub fn next_row(&mut self) -> Result<StringRecord> {
        self.fill()?;
        match self.peeked.take() {
            Some(record) => {
                self.rows_yielded += 1;
                Ok(record)
            }
            None => Err(Error::SequenceExhausted),
        }
    }

    /// Number of rows handed out so far
    pub fn rows_yielded(&self) -> usize {
        self.rows_yielded
    }

    /// Whether the sequence ended on a trailer row
    pub fn trailer_seen(&self) -> bool {
        self.trailer_seen
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> Rd {
        self.reader.into_inner()
    }

    fn fill(&mut self) -> Result<()> {
        if self.peeked.is_some() || self.finished {
            return Ok(());
        }

        let mut raw = ByteRecord::new();
        loop {
            let has_record = match self.reader.read_byte_record(&mut raw) {
                Ok(has_record) => has_record,
                Err(e) => {
                    self.finished = true;
                    return Err(Error::csv_parsing(
                        format!("Failed to read report row {}", self.rows_yielded + 1),
                        Some(e),
                    ));
                }
            };

            if !has_record {
                self.finished = true;
                return Ok(());
            }

            if self.title_lines_left > 0 {
                self.title_lines_left -= 1;
                trace!(
                    "Skipping report title line: {:?}",
                    raw.get(0).map(String::from_utf8_lossy)
                );
                continue;
            }

            break;
        }

        let record = StringRecord::from_byte_record_lossy(raw);

        if record.get(0).is_some_and(is_trailer_cell) {
            trace!("Trailer row reached after {} rows", self.rows_yielded);
            self.finished = true;
            self.trailer_seen = true;
            return Ok(());
        }

        self.peeked = Some(record);
        Ok(())
    }
}

impl<Rd: Read> Iterator for StreamingRowSource<Rd> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_row()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
